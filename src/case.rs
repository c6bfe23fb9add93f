//! Identifier case conversion: API field names are camelCase, storage columns snake_case.

/// Convert a single identifier from camelCase to snake_case.
/// e.g. "maxGroupSize" -> "max_group_size", "createdAt" -> "created_at"
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

/// URL slug from a display name: lowercase ASCII alphanumerics joined by single hyphens.
/// e.g. "The Forest Hiker" -> "the-forest-hiker"
pub fn slugify(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_dash = false;
    for c in s.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_case_columns() {
        assert_eq!(to_snake_case("maxGroupSize"), "max_group_size");
        assert_eq!(to_snake_case("id"), "id");
        assert_eq!(to_snake_case("passwordResetExpires"), "password_reset_expires");
    }

    #[test]
    fn slugs_collapse_separators() {
        assert_eq!(slugify("The Forest Hiker"), "the-forest-hiker");
        assert_eq!(slugify("  Sea  & Sun!! "), "sea-sun");
        assert_eq!(slugify(""), "");
    }
}
