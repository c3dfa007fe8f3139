use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Columns a listing may be ordered by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Id,
    Text,
    Tag,
}

impl SortKey {
    pub(crate) fn column(&self) -> &'static str {
        match self {
            SortKey::Id => "m.id",
            SortKey::Text => "m.text",
            SortKey::Tag => "m.tag",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    Asc,
    #[default]
    Desc,
}

impl SortDir {
    pub(crate) fn keyword(&self) -> &'static str {
        match self {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        }
    }
}

/// Offset/limit request. The default is the first page of ten, newest id first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub size: i64,
    pub sort_by: SortKey,
    pub sort_dir: SortDir,
}

impl PageRequest {
    pub fn new(page: i64, size: i64) -> Self {
        Self {
            page: page.max(0),
            size: size.clamp(1, MAX_PAGE_SIZE),
            sort_by: SortKey::default(),
            sort_dir: SortDir::default(),
        }
    }

    pub fn sorted(mut self, sort_by: SortKey, sort_dir: SortDir) -> Self {
        self.sort_by = sort_by;
        self.sort_dir = sort_dir;
        self
    }

    /// Row offset of the page. Saturates for absurd page numbers, which
    /// then read past the end and come back empty.
    pub fn offset(&self) -> i64 {
        self.page.saturating_mul(self.size)
    }

    /// ORDER BY clause built only from whitelisted columns. Ties on a
    /// non-unique key fall back to id so page boundaries stay stable.
    pub(crate) fn order_clause(&self) -> String {
        match self.sort_by {
            SortKey::Id => format!("ORDER BY m.id {}", self.sort_dir.keyword()),
            other => format!(
                "ORDER BY {} {}, m.id {}",
                other.column(),
                self.sort_dir.keyword(),
                self.sort_dir.keyword()
            ),
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(0, DEFAULT_PAGE_SIZE)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub content: Vec<T>,
    pub number: i64,
    pub size: i64,
    pub total_elements: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, request: &PageRequest, total_elements: i64) -> Self {
        let total_pages = (total_elements + request.size - 1) / request.size;
        Self {
            content,
            number: request.page,
            size: request.size,
            total_elements,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_is_clamped() {
        let request = PageRequest::new(-3, 1000);
        assert_eq!(request.page, 0);
        assert_eq!(request.size, MAX_PAGE_SIZE);

        assert_eq!(PageRequest::new(2, 0).size, 1);
    }

    #[test]
    fn test_offset() {
        assert_eq!(PageRequest::new(0, 10).offset(), 0);
        assert_eq!(PageRequest::new(3, 10).offset(), 30);
        assert_eq!(PageRequest::new(i64::MAX, 10).offset(), i64::MAX);
    }

    #[test]
    fn test_total_pages_rounds_up() {
        let request = PageRequest::new(0, 10);
        assert_eq!(Page::<()>::new(vec![], &request, 15).total_pages, 2);
        assert_eq!(Page::<()>::new(vec![], &request, 20).total_pages, 2);
        assert_eq!(Page::<()>::new(vec![], &request, 0).total_pages, 0);
    }

    #[test]
    fn test_order_clause_defaults_to_newest_id() {
        assert_eq!(PageRequest::default().order_clause(), "ORDER BY m.id DESC");
        let by_tag = PageRequest::default().sorted(SortKey::Tag, SortDir::Asc);
        assert_eq!(by_tag.order_clause(), "ORDER BY m.tag ASC, m.id ASC");
    }
}
