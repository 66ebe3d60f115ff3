use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

pub const USERNAME_MAX_LEN: usize = 150;

/// Usernames are path segments, so they are restricted to letters, digits
/// and `@.+-_`.
pub fn is_valid_username(value: &str) -> bool {
    !value.is_empty()
        && value.chars().count() <= USERNAME_MAX_LEN
        && value
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
}
