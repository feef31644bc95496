//! Pagination metadata and navigation links.

use url::form_urlencoded;

use crate::domain::{PageRequest, PaginationMeta};

/// Build the metadata for a page.
///
/// Links repeat every original parameter except `page` and `limit`, which
/// are appended with the neighbouring page number and the effective limit.
#[must_use]
pub fn pagination(
    total: u64,
    page: PageRequest,
    base_url: &str,
    raw: &[(String, String)],
) -> PaginationMeta {
    let pages = total.div_ceil(page.limit.max(1));

    let next = (page.page < pages).then(|| link(base_url, raw, page.page + 1, page.limit));
    let prev = (page.page > 1).then(|| link(base_url, raw, page.page - 1, page.limit));

    PaginationMeta {
        total,
        page: page.page,
        limit: page.limit,
        pages,
        next,
        prev,
    }
}

fn link(base_url: &str, raw: &[(String, String)], page: u64, limit: u64) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    for (key, value) in raw {
        if key != "page" && key != "limit" {
            query.append_pair(key, value);
        }
    }
    query.append_pair("page", &page.to_string());
    query.append_pair("limit", &limit.to_string());

    format!("{base_url}?{}", query.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "http://localhost:8080/v1/scopes";

    fn raw(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_first_page() {
        let meta = pagination(5, PageRequest { page: 1, limit: 2 }, BASE, &raw(&[]));
        assert_eq!(meta.pages, 3);
        assert_eq!(meta.prev, None);
        assert_eq!(
            meta.next.as_deref(),
            Some("http://localhost:8080/v1/scopes?page=2&limit=2")
        );
    }

    #[test]
    fn test_last_page_keeps_other_params() {
        let meta = pagination(
            5,
            PageRequest { page: 3, limit: 2 },
            BASE,
            &raw(&[("status", "approved"), ("page", "3"), ("fields[client]", "clientName")]),
        );
        assert_eq!(meta.next, None);
        assert_eq!(
            meta.prev.as_deref(),
            Some(
                "http://localhost:8080/v1/scopes?status=approved&fields%5Bclient%5D=clientName&page=2&limit=2"
            )
        );
    }

    #[test]
    fn test_empty_result() {
        let meta = pagination(0, PageRequest::default(), BASE, &raw(&[]));
        assert_eq!(meta.pages, 0);
        assert_eq!(meta.next, None);
        assert_eq!(meta.prev, None);
    }
}
