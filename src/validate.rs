//! Input validation for signup and rating submission. Limits mirror what the
//! profile and rating tables accept; messages are user-facing.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::backend::NewAccount;
use crate::error::{AppError, AppResult};

pub const NAME_MIN: usize = 3;
pub const NAME_MAX: usize = 60;
pub const ADDRESS_MAX: usize = 400;
pub const PASSWORD_MIN: usize = 8;
pub const PASSWORD_MAX: usize = 16;

static SPECIAL_CHAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[!@#$%^&*()_\-+=\[\]{};:'",.<>/?\\|`~]"#).unwrap());

static EMAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

/// Password policy: 8-16 chars with at least one uppercase letter and one
/// special character.
pub fn password_ok(password: &str) -> bool {
    let len = password.chars().count();
    (PASSWORD_MIN..=PASSWORD_MAX).contains(&len)
        && password.chars().any(|c| c.is_ascii_uppercase())
        && SPECIAL_CHAR.is_match(password)
}

pub fn validate_signup(account: &NewAccount) -> AppResult<()> {
    let name_len = account.name.trim().chars().count();
    if !(NAME_MIN..=NAME_MAX).contains(&name_len) {
        return Err(AppError::user(format!("Name must be {NAME_MIN}-{NAME_MAX} characters.")));
    }
    let address_len = account.address.trim().chars().count();
    if address_len == 0 || address_len > ADDRESS_MAX {
        return Err(AppError::user(format!(
            "Address is required and must be at most {ADDRESS_MAX} characters."
        )));
    }
    if !EMAIL.is_match(account.email.trim()) {
        return Err(AppError::user("A valid email address is required."));
    }
    if !password_ok(&account.password) {
        return Err(AppError::user(format!(
            "Password must be {PASSWORD_MIN}-{PASSWORD_MAX} chars, include at least one uppercase and one special character."
        )));
    }
    Ok(())
}
