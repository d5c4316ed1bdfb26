//! Per-field type and rule checks used by the guards.

use crate::config::{FieldType, ValidationRule};
use crate::error::ValidationError;
use regex::Regex;
use serde_json::Value;

/// Check one non-null value against its declared type and rule. Issues are appended to `errors`.
pub fn check_field(path: &str, v: &Value, field_type: FieldType, rule: &ValidationRule, errors: &mut ValidationError) {
    let before = errors.issues.len();
    check_type(path, v, field_type, errors);
    if errors.issues.len() > before {
        return;
    }

    if let Some(format) = &rule.format {
        if let Some(s) = v.as_str() {
            if let Err(message) = check_format(s, format) {
                errors.push(path, message);
            }
        }
    }
    match v {
        Value::String(s) => check_string(path, s, rule, errors),
        Value::Array(items) => {
            if let Some(min) = rule.min_items {
                if items.len() < min as usize {
                    errors.push(path, format!("must contain at least {} item(s)", min));
                }
            }
            for (i, item) in items.iter().enumerate() {
                if let Some(s) = item.as_str() {
                    check_string(&format!("{}.{}", path, i), s, rule, errors);
                }
            }
        }
        Value::Number(n) => {
            if let Some(n) = n.as_f64() {
                if let Some(min) = rule.minimum {
                    if n < min {
                        errors.push(path, format!("must be at least {}", min));
                    }
                }
                if let Some(max) = rule.maximum {
                    if n > max {
                        errors.push(path, format!("must be at most {}", max));
                    }
                }
            }
        }
        _ => {}
    }
    if let Some(allowed) = &rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            errors.push(
                path,
                format!("must be one of: {:?}", allowed.iter().take(5).collect::<Vec<_>>()),
            );
        }
    }
}

fn check_type(path: &str, v: &Value, field_type: FieldType, errors: &mut ValidationError) {
    let ok = match field_type {
        FieldType::String => v.is_string(),
        FieldType::Integer | FieldType::Timestamp => v.is_i64() || v.is_u64(),
        FieldType::Number => v.is_number(),
        FieldType::Boolean => v.is_boolean(),
        FieldType::Json => v.is_object(),
        FieldType::StringArray => v
            .as_array()
            .is_some_and(|items| items.iter().all(Value::is_string)),
    };
    if !ok {
        errors.push(path, format!("must be {}", field_type.describe()));
    }
}

fn check_string(path: &str, s: &str, rule: &ValidationRule, errors: &mut ValidationError) {
    let len = s.chars().count();
    if let Some(min) = rule.min_length {
        if len < min as usize {
            errors.push(path, format!("must be at least {} character(s)", min));
        }
    }
    if let Some(max) = rule.max_length {
        if len > max as usize {
            errors.push(path, format!("must be at most {} characters", max));
        }
    }
    if let Some(pattern) = &rule.pattern {
        match Regex::new(pattern) {
            Ok(re) if !re.is_match(s) => errors.push(path, "does not match required pattern"),
            Ok(_) => {}
            Err(_) => errors.push(path, "has an invalid pattern"),
        }
    }
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn check_format(s: &str, format: &str) -> Result<(), &'static str> {
    match format.to_lowercase().as_str() {
        "email" if !s.contains('@') || s.len() < 3 => Err("must be a valid email"),
        "uuid" if uuid::Uuid::parse_str(s).is_err() => Err("must be a valid UUID"),
        "url" if !(s.starts_with("http://") || s.starts_with("https://")) => Err("must be a valid URL"),
        _ => Ok(()),
    }
}

/// Coerce a query-string value to the field's type; unparsable input stays a string so the guard reports it.
pub fn coerce_query_value(field_type: FieldType, s: &str) -> Value {
    match field_type {
        FieldType::Integer | FieldType::Timestamp => s
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(s.to_string())),
        FieldType::Number => s
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(s.to_string())),
        FieldType::Boolean if s.eq_ignore_ascii_case("true") => Value::Bool(true),
        FieldType::Boolean if s.eq_ignore_ascii_case("false") => Value::Bool(false),
        _ => Value::String(s.to_string()),
    }
}
