//! Input validation for API requests.
//!
//! Request bodies are explicit structs; these helpers check individual
//! fields and feed the `ValidationErrorBuilder` from the `error` module so
//! responses can enumerate every failing field at once.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Regex for validating email addresses
    static ref EMAIL_REGEX: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();

    /// Regex for validating person names (letters only)
    static ref NAME_REGEX: Regex = Regex::new(r"^[A-Za-z]+$").unwrap();

    /// Regex for validating a 6-digit OTP code
    static ref OTP_REGEX: Regex = Regex::new(r"^[0-9]{6}$").unwrap();
}

/// Special characters accepted in passwords
const PASSWORD_SPECIALS: &str = "@$!%*?&";

/// Validate an email address
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email address".to_string());
    }

    Ok(())
}

/// Validate a first or last name
pub fn validate_name(name: &str, field_name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err(format!("{} is required", field_name));
    }

    if name.len() < 2 {
        return Err(format!("{} is too short (min 2 characters)", field_name));
    }

    if name.len() > 255 {
        return Err(format!("{} is too long (max 255 characters)", field_name));
    }

    if !NAME_REGEX.is_match(name) {
        return Err(format!("{} must contain letters only", field_name));
    }

    Ok(())
}

/// Validate password strength: at least 8 characters with a lowercase
/// letter, an uppercase letter, a digit, and a special character.
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.len() < 8 {
        return Err("Password must be at least 8 characters".to_string());
    }

    if password.len() > 128 {
        return Err("Password is too long (max 128 characters)".to_string());
    }

    let has_lowercase = password.chars().any(|c| c.is_ascii_lowercase());
    let has_uppercase = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| PASSWORD_SPECIALS.contains(c));

    if !has_lowercase {
        return Err("Password must contain at least one lowercase letter".to_string());
    }
    if !has_uppercase {
        return Err("Password must contain at least one uppercase letter".to_string());
    }
    if !has_digit {
        return Err("Password must contain at least one digit".to_string());
    }
    if !has_special {
        return Err(format!(
            "Password must contain at least one special character ({})",
            PASSWORD_SPECIALS
        ));
    }

    Ok(())
}

/// Validate a role value
pub fn validate_role(role: &str) -> Result<(), String> {
    if role != crate::db::ROLE_USER && role != crate::db::ROLE_ADMIN {
        return Err("Role must be 'user' or 'admin'".to_string());
    }
    Ok(())
}

/// Validate a submitted OTP code
pub fn validate_otp_code(code: &str) -> Result<(), String> {
    if code.is_empty() {
        return Err("OTP is required".to_string());
    }

    if !OTP_REGEX.is_match(code) {
        return Err("OTP must be a 6-digit code".to_string());
    }

    Ok(())
}

/// Validate a UUID string
pub fn validate_uuid(id: &str, field_name: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err(format!("{} is required", field_name));
    }

    if uuid::Uuid::parse_str(id).is_err() {
        return Err(format!("Invalid {} format", field_name));
    }

    Ok(())
}

/// Validate a required non-empty text field with an upper bound
pub fn validate_text(value: &str, field_name: &str, max_len: usize) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{} is required", field_name));
    }

    if value.len() > max_len {
        return Err(format!(
            "{} is too long (max {} characters)",
            field_name, max_len
        ));
    }

    Ok(())
}

/// Validate an RFC3339 deadline that must lie in the future
pub fn validate_future_deadline(deadline: &str) -> Result<(), String> {
    let parsed = chrono::DateTime::parse_from_rfc3339(deadline)
        .map_err(|_| "Deadline must be an RFC3339 timestamp".to_string())?;

    if parsed.with_timezone(&chrono::Utc) <= chrono::Utc::now() {
        return Err("Deadline must be in the future".to_string());
    }

    Ok(())
}
