use anyhow::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::domain::comment::Comment;
use crate::infra::db::Db;

const COMMENT_SELECT: &str = "SELECT c.id, c.post_id, c.author_id, u.username AS author_username, \
            c.text, c.created \
     FROM comments c \
     JOIN users u ON u.id = c.author_id";

fn comment_from_row(row: &SqliteRow) -> Comment {
    Comment {
        id: row.get("id"),
        post_id: row.get("post_id"),
        author_id: row.get("author_id"),
        author_username: row.get("author_username"),
        text: row.get("text"),
        created: row.get("created"),
    }
}

#[derive(Clone)]
pub struct CommentService {
    db: Db,
}

impl CommentService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn add_comment(&self, post_id: i64, author_id: i64, text: String) -> Result<Comment> {
        let comment_id: i64 = sqlx::query_scalar(
            "INSERT INTO comments (post_id, author_id, text) VALUES (?1, ?2, ?3) RETURNING id",
        )
        .bind(post_id)
        .bind(author_id)
        .bind(text)
        .fetch_one(self.db.pool())
        .await?;

        let row = sqlx::query(&format!("{} WHERE c.id = ?1", COMMENT_SELECT))
            .bind(comment_id)
            .fetch_one(self.db.pool())
            .await?;

        Ok(comment_from_row(&row))
    }

    /// Oldest first, in the order they were written.
    pub async fn list_for_post(&self, post_id: i64) -> Result<Vec<Comment>> {
        let rows = sqlx::query(&format!(
            "{} WHERE c.post_id = ?1 ORDER BY c.created ASC, c.id ASC",
            COMMENT_SELECT
        ))
        .bind(post_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(comment_from_row).collect())
    }

    pub async fn count_for_post(&self, post_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE post_id = ?1")
            .bind(post_id)
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }
}
