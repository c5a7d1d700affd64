//! Derived password policy
//!
//! Recomputed on every keystroke and shown as live feedback; submission is
//! blocked client-side until every requirement holds. The server-side
//! sign-up call remains the authoritative enforcement point.

/// Minimum password length required by the policy
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Per-requirement password check results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordChecks {
    pub min_length: bool,
    pub has_uppercase: bool,
    pub has_lowercase: bool,
    pub has_number: bool,
    pub passwords_match: bool,
}

impl PasswordChecks {
    /// Evaluate the policy against a password and its confirmation field
    pub fn evaluate(password: &str, confirm: &str) -> Self {
        let mut has_uppercase = false;
        let mut has_lowercase = false;
        let mut has_number = false;

        for c in password.chars() {
            if c.is_ascii_uppercase() {
                has_uppercase = true;
            } else if c.is_ascii_lowercase() {
                has_lowercase = true;
            } else if c.is_ascii_digit() {
                has_number = true;
            }
        }

        Self {
            min_length: password.chars().count() >= MIN_PASSWORD_LENGTH,
            has_uppercase,
            has_lowercase,
            has_number,
            // The confirm field must be non-empty: two empty fields never match.
            passwords_match: !confirm.is_empty() && password == confirm,
        }
    }

    /// Conjunction of all five requirements
    pub fn all_requirements_met(&self) -> bool {
        self.min_length
            && self.has_uppercase
            && self.has_lowercase
            && self.has_number
            && self.passwords_match
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compliant_password() {
        let checks = PasswordChecks::evaluate("Abcdefg1", "Abcdefg1");
        assert!(checks.min_length);
        assert!(checks.has_uppercase);
        assert!(checks.has_lowercase);
        assert!(checks.has_number);
        assert!(checks.passwords_match);
        assert!(checks.all_requirements_met());
    }

    #[test]
    fn test_too_short() {
        let checks = PasswordChecks::evaluate("Abc1", "Abc1");
        assert!(!checks.min_length);
        assert!(!checks.all_requirements_met());
    }

    #[test]
    fn test_missing_character_classes() {
        assert!(!PasswordChecks::evaluate("abcdefg1", "abcdefg1").has_uppercase);
        assert!(!PasswordChecks::evaluate("ABCDEFG1", "ABCDEFG1").has_lowercase);
        assert!(!PasswordChecks::evaluate("Abcdefgh", "Abcdefgh").has_number);
    }

    #[test]
    fn test_empty_confirm_never_matches() {
        let checks = PasswordChecks::evaluate("", "");
        assert!(!checks.passwords_match);

        let checks = PasswordChecks::evaluate("Abcdefg1", "");
        assert!(!checks.passwords_match);
    }

    #[test]
    fn test_mismatched_confirm() {
        let checks = PasswordChecks::evaluate("Abcdefg1", "Abcdefg2");
        assert!(!checks.passwords_match);
        assert!(!checks.all_requirements_met());
    }
}
