//! Route handlers and shared input validation.

pub mod auth;
pub mod blogs;
pub mod comments;
pub mod health;
pub mod users;

use regex::Regex;

/// Minimum lengths mirror the stored model: anything shorter is rejected
/// before a store round trip.
pub(crate) const MIN_PASSWORD_LEN: usize = 3;
pub(crate) const MIN_TITLE_LEN: usize = 3;
pub(crate) const MIN_BLOG_BODY_LEN: usize = 50;

/// Normalize an email for lookup and uniqueness checks.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(crate) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email_normalized))
}
