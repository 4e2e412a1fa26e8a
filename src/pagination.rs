//! Offset pagination for list endpoints.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Default page size.
pub const DEFAULT_PAGE_SIZE: u64 = 15;
/// Maximum page size.
pub const MAX_PAGE_SIZE: u64 = 100;

/// Highest page whose offset still fits an SQLite integer.
const MAX_PAGE: u64 = i64::MAX as u64 / MAX_PAGE_SIZE;

/// Characters left untouched in query values.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

/// Request parameters for paginated queries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PageRequest {
    /// Page number (1-based).
    pub page: u64,
    /// Number of items per page.
    pub per_page: u64,
}

impl PageRequest {
    pub fn new(page: Option<u64>, per_page: Option<u64>) -> Self {
        Self {
            page: page.unwrap_or(1).clamp(1, MAX_PAGE),
            per_page: per_page.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// SQL `OFFSET`.
    pub fn offset(&self) -> i64 {
        let offset = self.page.saturating_sub(1).saturating_mul(self.per_page);
        i64::try_from(offset).unwrap_or(i64::MAX)
    }

    /// SQL `LIMIT`.
    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Paginated response wrapper.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T: Serialize> {
    pub items: Vec<T>,
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
    pub last_page: u64,
    pub links: PageLinks,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct PageLinks {
    pub first: String,
    pub last: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

impl<T: Serialize> Page<T> {
    /// `filters` are the applied filters, in the order they should appear in links.
    pub fn new(items: Vec<T>, request: PageRequest, total: u64, base_path: &str, filters: &[(String, String)]) -> Self {
        let last_page = if total == 0 {
            1
        } else {
            total.div_ceil(request.per_page)
        };

        let link = |page: u64| page_link(base_path, filters, page, request.per_page);
        let links = PageLinks {
            first: link(1),
            last: link(last_page),
            prev: (request.page > 1).then(|| link(request.page - 1)),
            next: (request.page < last_page).then(|| link(request.page + 1)),
        };

        Self {
            items,
            page: request.page,
            per_page: request.per_page,
            total,
            last_page,
            links,
        }
    }
}

/// Builds `base?filter=..&page=N`, keeping `per_page` only when it differs from the default.
pub fn page_link(base_path: &str, filters: &[(String, String)], page: u64, per_page: u64) -> String {
    let mut parts: Vec<String> = filters
        .iter()
        .map(|(key, value)| format!("{}={}", key, utf8_percent_encode(value, QUERY_VALUE)))
        .collect();

    if per_page != DEFAULT_PAGE_SIZE {
        parts.push(format!("per_page={}", per_page));
    }
    parts.push(format!("page={}", page));

    format!("{}?{}", base_path, parts.join("&"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_is_clamped() {
        let req = PageRequest::new(Some(0), Some(1_000));
        assert_eq!(req.page, 1);
        assert_eq!(req.per_page, MAX_PAGE_SIZE);
        assert_eq!(PageRequest::new(Some(3), Some(10)).offset(), 20);
    }

    #[test]
    fn huge_page_does_not_overflow() {
        let req = PageRequest::new(Some(u64::MAX), Some(MAX_PAGE_SIZE));
        assert_eq!(req.page, MAX_PAGE);
        assert!(req.offset() > 0);

        let odd = PageRequest { page: u64::MAX, per_page: u64::MAX };
        assert_eq!(odd.offset(), i64::MAX);
    }

    #[test]
    fn links_keep_filters_and_encode_values() {
        let filters = vec![
            ("search".to_string(), "road & bridge".to_string()),
            ("category".to_string(), "infrastructure".to_string()),
        ];
        let page: Page<u8> = Page::new(vec![], PageRequest::new(Some(2), None), 40, "/api/bids-awards", &filters);

        assert_eq!(page.last_page, 3);
        assert_eq!(
            page.links.next.as_deref(),
            Some("/api/bids-awards?search=road%20%26%20bridge&category=infrastructure&page=3")
        );
        assert_eq!(
            page.links.prev.as_deref(),
            Some("/api/bids-awards?search=road%20%26%20bridge&category=infrastructure&page=1")
        );
    }

    #[test]
    fn empty_result_has_one_page_and_no_neighbours() {
        let page: Page<u8> = Page::new(vec![], PageRequest::default(), 0, "/api/news", &[]);
        assert_eq!(page.last_page, 1);
        assert!(page.links.next.is_none());
        assert!(page.links.prev.is_none());
        assert_eq!(page.links.first, "/api/news?page=1");
    }

    #[test]
    fn custom_page_size_is_carried() {
        let link = page_link("/api/news", &[], 2, 5);
        assert_eq!(link, "/api/news?per_page=5&page=2");
    }
}
