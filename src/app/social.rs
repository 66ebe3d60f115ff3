use anyhow::Result;
use sqlx::Row;

use crate::domain::social_graph::Follow;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct SocialService {
    db: Db,
}

impl SocialService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Returns the new edge, or `None` when it already existed or the user
    /// tried to follow themselves.
    pub async fn follow(&self, user_id: i64, author_id: i64) -> Result<Option<Follow>> {
        if user_id == author_id {
            return Ok(None);
        }

        let row = sqlx::query(
            "INSERT INTO follows (user_id, author_id) VALUES (?1, ?2) \
             ON CONFLICT (user_id, author_id) DO NOTHING \
             RETURNING id, user_id, author_id, created_at",
        )
        .bind(user_id)
        .bind(author_id)
        .fetch_optional(self.db.pool())
        .await?;

        let follow = row.map(|row| Follow {
            id: row.get("id"),
            user_id: row.get("user_id"),
            author_id: row.get("author_id"),
            created_at: row.get("created_at"),
        });

        Ok(follow)
    }

    pub async fn unfollow(&self, user_id: i64, author_id: i64) -> Result<bool> {
        if user_id == author_id {
            return Ok(false);
        }

        let result = sqlx::query("DELETE FROM follows WHERE user_id = ?1 AND author_id = ?2")
            .bind(user_id)
            .bind(author_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn is_following(&self, user_id: i64, author_id: i64) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM follows WHERE user_id = ?1 AND author_id = ?2)",
        )
        .bind(user_id)
        .bind(author_id)
        .fetch_one(self.db.pool())
        .await?;

        Ok(exists)
    }

    pub async fn followers_count(&self, author_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE author_id = ?1")
            .bind(author_id)
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }

    pub async fn following_count(&self, user_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE user_id = ?1")
            .bind(user_id)
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }
}
