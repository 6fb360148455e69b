use serde::{Deserialize, Serialize};

use crate::storage::Page;

/// Paged list response with navigation metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetListResponse<T> {
    pub items: Vec<T>,
    pub index: usize,
    pub size: usize,
    pub count: usize,
    pub pages: usize,
    pub has_previous: bool,
    pub has_next: bool,
}

impl<T> GetListResponse<T> {
    /// Builds a response from a storage page, mapping each item.
    pub fn from_page<E>(page: Page<E>, mapper: impl Fn(E) -> T) -> Self {
        Self {
            index: page.index,
            size: page.size,
            count: page.count,
            pages: page.pages(),
            has_previous: page.has_previous(),
            has_next: page.has_next(),
            items: page.items.into_iter().map(mapper).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_page_carries_metadata() {
        let page = Page {
            items: vec![1, 2, 3],
            index: 0,
            size: 3,
            count: 7,
        };

        let response = GetListResponse::from_page(page, |n| n * 10);

        assert_eq!(response.items, vec![10, 20, 30]);
        assert_eq!(response.index, 0);
        assert_eq!(response.size, 3);
        assert_eq!(response.count, 7);
        assert_eq!(response.pages, 3);
        assert!(!response.has_previous);
        assert!(response.has_next);
    }

    #[test]
    fn test_from_page_last_page() {
        let page = Page {
            items: vec![7],
            index: 2,
            size: 3,
            count: 7,
        };

        let response = GetListResponse::from_page(page, |n: i32| n);

        assert!(response.has_previous);
        assert!(!response.has_next);
    }
}
