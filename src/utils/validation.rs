use chrono::NaiveDate;
use validator::{validate_email, validate_length};

pub const NAME_MAX_CHARS: u64 = 50;
pub const EMAIL_MAX_CHARS: u64 = 100;
pub const PASSWORD_MIN_CHARS: u64 = 8;
pub const SEX_OPTIONS: [&str; 3] = ["M", "F", "Altro"];

pub const DUPLICATE_EMAIL: &str = "This email is already registered";
pub const INVALID_CREDENTIALS: &str = "Invalid email or password";

// Each check records at most one message per field so errors read in form order.

pub fn validate_name(value: &str, label: &str, errors: &mut Vec<String>) {
    if value.is_empty() {
        errors.push(format!("{} is required", label));
    } else if !validate_length(value, None, Some(NAME_MAX_CHARS), None) {
        errors.push(format!("{} cannot exceed {} characters", label, NAME_MAX_CHARS));
    }
}

/// Returns true when the address is usable for a lookup.
pub fn validate_email_address(email: &str, max_chars: Option<u64>, errors: &mut Vec<String>) -> bool {
    if email.is_empty() {
        errors.push("Email is required".to_string());
        return false;
    }
    if !validate_email(email) {
        errors.push("Email is not valid".to_string());
        return false;
    }
    if let Some(max) = max_chars {
        if !validate_length(email, None, Some(max), None) {
            errors.push(format!("Email cannot exceed {} characters", max));
            return false;
        }
    }
    true
}

pub fn validate_login_password(password: &str, errors: &mut Vec<String>) {
    if password.is_empty() {
        errors.push("Password is required".to_string());
    }
}

pub fn validate_new_password(password: &str, confirmation: &str, errors: &mut Vec<String>) {
    if password.is_empty() {
        errors.push("Password is required".to_string());
    } else if !validate_length(password, Some(PASSWORD_MIN_CHARS), None, None) {
        errors.push(format!("Password must be at least {} characters", PASSWORD_MIN_CHARS));
    } else if password != confirmation {
        errors.push("Passwords do not match".to_string());
    }
}

pub fn parse_birth_date(value: &str, errors: &mut Vec<String>) -> Option<NaiveDate> {
    if value.is_empty() {
        return None;
    }
    match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(_) => {
            errors.push("Birth date is not valid".to_string());
            None
        }
    }
}

pub fn validate_sex(value: &str, errors: &mut Vec<String>) -> Option<String> {
    if value.is_empty() {
        return None;
    }
    if SEX_OPTIONS.contains(&value) {
        Some(value.to_string())
    } else {
        errors.push("Please select a valid sex".to_string());
        None
    }
}
