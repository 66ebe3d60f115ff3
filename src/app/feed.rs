use anyhow::Result;

use crate::app::pagination::{Page, PageWindow, PAGE_SIZE};
use crate::app::posts::{post_from_row, POST_SELECT};
use crate::domain::post::Post;
use crate::infra::db::Db;

/// Which posts a feed is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedScope {
    Global,
    Group(i64),
    Author(i64),
    /// Posts by every author the given user follows.
    FollowedBy(i64),
}

impl FeedScope {
    fn filter(&self) -> (&'static str, Option<i64>) {
        match *self {
            Self::Global => ("", None),
            Self::Group(group_id) => ("WHERE p.group_id = ?1", Some(group_id)),
            Self::Author(author_id) => ("WHERE p.author_id = ?1", Some(author_id)),
            Self::FollowedBy(user_id) => (
                "WHERE p.author_id IN (SELECT author_id FROM follows WHERE user_id = ?1)",
                Some(user_id),
            ),
        }
    }
}

#[derive(Clone)]
pub struct FeedService {
    db: Db,
}

impl FeedService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// One page of the scope's posts, newest first.
    pub async fn page(&self, scope: FeedScope, page: Option<&str>) -> Result<Page<Post>> {
        let (filter, param) = scope.filter();

        let count_sql = format!("SELECT COUNT(*) FROM posts p {}", filter);
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        if let Some(param) = param {
            count_query = count_query.bind(param);
        }
        let count = count_query.fetch_one(self.db.pool()).await?;

        let window = PageWindow::resolve(page, count, PAGE_SIZE);
        if count == 0 {
            return Ok(Page::new(window, Vec::new()));
        }

        let page_sql = format!(
            "{} {} ORDER BY p.pub_date DESC, p.id DESC LIMIT ?2 OFFSET ?3",
            POST_SELECT,
            if filter.is_empty() { "WHERE ?1 IS NULL" } else { filter },
        );
        let rows = sqlx::query(&page_sql)
            .bind(param)
            .bind(window.limit())
            .bind(window.offset())
            .fetch_all(self.db.pool())
            .await?;

        let posts = rows.iter().map(post_from_row).collect();
        Ok(Page::new(window, posts))
    }
}
