// Registration input checks. Violations are collected into one list so the
// caller can show every problem at once instead of the first.

use crate::error::{StoreError, StoreResult};

/// The plain registration fields as the request layer hands them over.
#[derive(Debug, Clone)]
pub struct Registration<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub password_confirm: &'a str,
}

/// Validate a registration. `required_domain` restricts signups to one
/// email domain (e.g. "pitt.edu"); pass None to accept any domain.
pub fn validate_registration(
    registration: &Registration,
    required_domain: Option<&str>,
) -> StoreResult<()> {
    let mut errors = Vec::new();

    if registration.username.trim().is_empty() {
        errors.push("Username is required.".to_string());
    } else if registration.username.contains('/') {
        errors.push("Username must not contain '/'.".to_string());
    }

    if registration.password.is_empty() {
        errors.push("Password is required.".to_string());
    } else if registration.password != registration.password_confirm {
        errors.push("Passwords do not match.".to_string());
    }

    match email_domain(registration.email) {
        None => errors.push(format!("Invalid email address: {}", registration.email)),
        Some(domain) => {
            if let Some(required) = required_domain {
                if !domain.eq_ignore_ascii_case(required) {
                    errors.push(format!("Email must be a {} address.", required));
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(StoreError::Validation(errors))
    }
}

/// The domain of a well-formed address, or None. "Well-formed" here is the
/// app's bar, not RFC 5322: one '@', non-empty on both sides, no spaces.
fn email_domain(email: &str) -> Option<&str> {
    let (local, domain) = email.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }
    if email.contains(char::is_whitespace) || !domain.contains('.') {
        return None;
    }
    Some(domain)
}
