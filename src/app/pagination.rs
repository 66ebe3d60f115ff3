use serde::Serialize;

pub const PAGE_SIZE: i64 = 10;

/// Resolved position of one page inside a result set of `count` items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: i64,
    pub num_pages: i64,
    pub count: i64,
    pub per_page: i64,
}

impl PageWindow {
    /// Turns the raw `?page=` value into a page that exists.
    ///
    /// Missing or non-numeric values give page 1, values below 1 clamp to 1
    /// and values past the end clamp to the last page. An empty result set
    /// still has one (empty) page.
    pub fn resolve(raw: Option<&str>, count: i64, per_page: i64) -> Self {
        let num_pages = if count <= 0 {
            1
        } else {
            (count + per_page - 1) / per_page
        };
        let requested = raw
            .and_then(|value| value.trim().parse::<i64>().ok())
            .unwrap_or(1);
        let number = requested.clamp(1, num_pages);
        Self {
            number,
            num_pages,
            count: count.max(0),
            per_page,
        }
    }

    pub fn offset(&self) -> i64 {
        (self.number - 1) * self.per_page
    }

    pub fn limit(&self) -> i64 {
        self.per_page
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: i64,
    pub num_pages: i64,
    pub count: i64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T> Page<T> {
    pub fn new(window: PageWindow, items: Vec<T>) -> Self {
        Self {
            items,
            number: window.number,
            num_pages: window.num_pages,
            count: window.count,
            has_next: window.has_next(),
            has_previous: window.has_previous(),
        }
    }
}
