use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{AppError, AppResult};

pub const PASSWORD_MIN_CHARS: usize = 8;
pub const PASSWORD_MAX_CHARS: usize = 128;
pub const NAME_MAX_CHARS: usize = 100;
pub const EMAIL_MAX_CHARS: usize = 254;
pub const TITLE_MAX_CHARS: usize = 200;
pub const DESCRIPTION_MAX_CHARS: usize = 1000;

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}$").unwrap();
}

fn invalid(msg: impl Into<String>) -> AppError {
    AppError::Validation(msg.into())
}

/// Expects an already trimmed, lower-cased address.
pub fn validate_email(email: &str) -> AppResult<()> {
    if email.is_empty() {
        return Err(invalid("email is required"));
    }
    if email.chars().count() > EMAIL_MAX_CHARS || !EMAIL_RE.is_match(email) {
        return Err(invalid("email format is invalid"));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> AppResult<()> {
    let len = password.chars().count();
    if len < PASSWORD_MIN_CHARS {
        return Err(invalid(format!(
            "password must be at least {PASSWORD_MIN_CHARS} characters"
        )));
    }
    if len > PASSWORD_MAX_CHARS {
        return Err(invalid(format!(
            "password must not exceed {PASSWORD_MAX_CHARS} characters"
        )));
    }
    Ok(())
}

pub fn validate_name(name: &str) -> AppResult<()> {
    let len = name.trim().chars().count();
    if len == 0 {
        return Err(invalid("name is required"));
    }
    if len > NAME_MAX_CHARS {
        return Err(invalid(format!("name must not exceed {NAME_MAX_CHARS} characters")));
    }
    Ok(())
}

pub fn validate_title(title: &str) -> AppResult<()> {
    let len = title.trim().chars().count();
    if len == 0 {
        return Err(invalid("title is required"));
    }
    if len > TITLE_MAX_CHARS {
        return Err(invalid(format!("title must not exceed {TITLE_MAX_CHARS} characters")));
    }
    Ok(())
}

pub fn validate_description(description: &str) -> AppResult<()> {
    if description.chars().count() > DESCRIPTION_MAX_CHARS {
        return Err(invalid(format!(
            "description must not exceed {DESCRIPTION_MAX_CHARS} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails() {
        assert!(validate_email("a@x.com").is_ok());
        assert!(validate_email("first.last+tag@sub.example.org").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("invalid-email").is_err());
        assert!(validate_email("a@b").is_err());
        assert!(validate_email("a b@x.com").is_err());
        let long = format!("{}@x.com", "a".repeat(250));
        assert!(validate_email(&long).is_err());
    }

    #[test]
    fn passwords() {
        assert!(validate_password("Secret123").is_ok());
        assert!(validate_password("1234567").is_err());
        assert!(validate_password(&"p".repeat(128)).is_ok());
        assert!(validate_password(&"p".repeat(129)).is_err());
    }

    #[test]
    fn title_bounds() {
        assert!(validate_title("").is_err());
        assert!(validate_title("   ").is_err());
        assert!(validate_title("x").is_ok());
        assert!(validate_title(&"t".repeat(200)).is_ok());
        assert!(validate_title(&"t".repeat(201)).is_err());
        // counted in characters, not bytes
        assert!(validate_title(&"é".repeat(200)).is_ok());
    }

    #[test]
    fn description_bounds() {
        assert!(validate_description("").is_ok());
        assert!(validate_description(&"d".repeat(1000)).is_ok());
        assert!(validate_description(&"d".repeat(1001)).is_err());
    }

    #[test]
    fn names() {
        assert!(validate_name("A").is_ok());
        assert!(validate_name(" ").is_err());
        assert!(validate_name(&"n".repeat(101)).is_err());
    }

    #[test]
    fn errors_are_validation_kind() {
        assert!(matches!(validate_title(""), Err(AppError::Validation(_))));
    }
}
