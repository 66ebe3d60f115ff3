use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub pub_date: OffsetDateTime,
    pub author_id: i64,
    pub author_username: String,
    pub group_id: Option<i64>,
    pub group_slug: Option<String>,
    /// Path relative to the media root, e.g. `posts/small.gif`.
    pub image: Option<String>,
}

/// Number of characters of the text shown when a post is displayed inline.
const DISPLAY_CHARS: usize = 15;

impl fmt::Display for Post {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let preview: String = self.text.chars().take(DISPLAY_CHARS).collect();
        f.write_str(&preview)
    }
}
