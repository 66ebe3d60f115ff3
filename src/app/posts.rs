use anyhow::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::domain::post::Post;
use crate::infra::db::Db;

/// Post columns joined with the author's username and the group slug.
pub(crate) const POST_SELECT: &str =
    "SELECT p.id, p.text, p.pub_date, p.author_id, u.username AS author_username, \
            p.group_id, g.slug AS group_slug, p.image \
     FROM posts p \
     JOIN users u ON u.id = p.author_id \
     LEFT JOIN post_groups g ON g.id = p.group_id";

pub(crate) fn post_from_row(row: &SqliteRow) -> Post {
    Post {
        id: row.get("id"),
        text: row.get("text"),
        pub_date: row.get("pub_date"),
        author_id: row.get("author_id"),
        author_username: row.get("author_username"),
        group_id: row.get("group_id"),
        group_slug: row.get("group_slug"),
        image: row.get("image"),
    }
}

#[derive(Clone)]
pub struct PostService {
    db: Db,
}

impl PostService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn create_post(
        &self,
        author_id: i64,
        text: String,
        group_id: Option<i64>,
        image: Option<String>,
    ) -> Result<Post> {
        let post_id: i64 = sqlx::query_scalar(
            "INSERT INTO posts (text, author_id, group_id, image) \
             VALUES (?1, ?2, ?3, ?4) \
             RETURNING id",
        )
        .bind(text)
        .bind(author_id)
        .bind(group_id)
        .bind(image)
        .fetch_one(self.db.pool())
        .await?;

        self.get_post(post_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("post {} vanished after insert", post_id))
    }

    pub async fn get_post(&self, post_id: i64) -> Result<Option<Post>> {
        let row = sqlx::query(&format!("{} WHERE p.id = ?1", POST_SELECT))
            .bind(post_id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.as_ref().map(post_from_row))
    }

    /// Looks a post up through its author, so `/<username>/<id>/` only
    /// resolves when both parts agree.
    pub async fn get_by_author(&self, username: &str, post_id: i64) -> Result<Option<Post>> {
        let row = sqlx::query(&format!(
            "{} WHERE p.id = ?1 AND u.username = ?2",
            POST_SELECT
        ))
        .bind(post_id)
        .bind(username)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(post_from_row))
    }

    /// Replaces text and group. `image` of `None` keeps the stored image.
    pub async fn update_post(
        &self,
        post_id: i64,
        text: String,
        group_id: Option<i64>,
        image: Option<String>,
    ) -> Result<Option<Post>> {
        let result = sqlx::query(
            "UPDATE posts \
             SET text = ?2, group_id = ?3, image = COALESCE(?4, image) \
             WHERE id = ?1",
        )
        .bind(post_id)
        .bind(text)
        .bind(group_id)
        .bind(image)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_post(post_id).await
    }

    pub async fn delete_post(&self, post_id: i64, author_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = ?1 AND author_id = ?2")
            .bind(post_id)
            .bind(author_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn count_by_author(&self, author_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE author_id = ?1")
            .bind(author_id)
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }
}
