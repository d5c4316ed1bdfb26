//! Case conversion from API field names (camelCase) to storage columns (snake_case).

/// e.g. "organizationRoleId" -> "organization_role_id"
pub fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_camel_to_snake() {
        assert_eq!(to_snake_case("organizationRoleId"), "organization_role_id");
        assert_eq!(to_snake_case("createdAt"), "created_at");
        assert_eq!(to_snake_case("id"), "id");
    }
}
