//! # Validation Utilities
//!
//! Input validation helpers. Errors are the user-facing message.

/// Validate that a string is not empty after trimming.
pub fn validate_not_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{} cannot be empty", field_name))
    } else {
        Ok(())
    }
}

/// Validate that the trimmed value has between `min` and `max` characters (inclusive).
///
/// Length is counted in characters, not bytes.
pub fn validate_length(value: &str, min: usize, max: usize, field_name: &str) -> Result<(), String> {
    let len = value.trim().chars().count();
    if len < min || len > max {
        Err(format!("{} must be between {} and {} characters", field_name, min, max))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank() {
        assert_eq!(
            validate_not_empty("   ", "Project name"),
            Err("Project name cannot be empty".to_string())
        );
        assert!(validate_not_empty("Reforest", "Project name").is_ok());
    }

    #[test]
    fn length_bounds_are_inclusive() {
        assert!(validate_length("abc", 3, 50, "Project name").is_ok());
        assert!(validate_length(&"a".repeat(50), 3, 50, "Project name").is_ok());
        assert!(validate_length("ab", 3, 50, "Project name").is_err());
        assert!(validate_length(&"a".repeat(51), 3, 50, "Project name").is_err());
    }

    #[test]
    fn length_counts_characters_after_trim() {
        // three multi-byte characters padded with spaces
        assert!(validate_length("  äöü  ", 3, 3, "Project name").is_ok());
    }
}
