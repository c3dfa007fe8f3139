//! Field checks shared by the registry and the directory. Each check records
//! into a [`ValidationErrors`] instead of returning early.

use crate::error::ValidationErrors;

pub const MAX_USERNAME_LENGTH: usize = 64;
pub const MAX_MESSAGE_LENGTH: usize = 2048;
pub const MAX_TAG_LENGTH: usize = 255;

pub fn username(errors: &mut ValidationErrors, value: &str) {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.add("username", "User name can't be empty");
    } else if trimmed.chars().count() > MAX_USERNAME_LENGTH {
        errors.add("username", format!("User name must be at most {} characters", MAX_USERNAME_LENGTH));
    } else if trimmed.chars().any(char::is_whitespace) {
        errors.add("username", "User name can't contain spaces");
    }
}

pub fn password(errors: &mut ValidationErrors, value: &str) {
    if value.trim().is_empty() {
        errors.add("password", "Password can't be empty");
    }
}

/// Blank is allowed; anything else must look like `local@domain.tld`.
pub fn optional_email(errors: &mut ValidationErrors, value: &str) {
    let value = value.trim();
    if !value.is_empty() && !is_email(value) {
        errors.add("email", "Email isn't correct");
    }
}

pub fn message_text(errors: &mut ValidationErrors, value: &str) {
    if value.trim().is_empty() {
        errors.add("text", "Please fill the message");
    } else if value.chars().count() > MAX_MESSAGE_LENGTH {
        errors.add("text", "Message too long (more than 2kB)");
    }
}

pub fn tag(errors: &mut ValidationErrors, value: &str) {
    if value.chars().count() > MAX_TAG_LENGTH {
        errors.add("tag", "Tag too long (more than 255)");
    }
}

fn is_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .map(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
                    .unwrap_or(false)
        }
        None => false,
    }
}
