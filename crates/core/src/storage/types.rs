use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::PageRequestError;

/// A boolean filter over an entity, applied before pagination.
///
/// Repositories apply predicates verbatim: there is no implicit soft-delete
/// filter, so predicates spell out their `deleted_at` conditions.
#[derive(Clone)]
pub struct Predicate<E>(Arc<dyn Fn(&E) -> bool + Send + Sync>);

impl<E> Predicate<E> {
    pub fn new(f: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn matches(&self, entity: &E) -> bool {
        (self.0)(entity)
    }
}

impl<E> std::fmt::Debug for Predicate<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Predicate(..)")
    }
}

/// An ordering over entities, built from a key extractor.
#[derive(Clone)]
pub struct OrderBy<E>(Arc<dyn Fn(&E, &E) -> Ordering + Send + Sync>);

impl<E> OrderBy<E> {
    /// Ascending order by the extracted key.
    pub fn asc_by<K: Ord>(key: impl Fn(&E) -> K + Send + Sync + 'static) -> Self {
        Self(Arc::new(move |a, b| key(a).cmp(&key(b))))
    }

    /// Descending order by the extracted key.
    pub fn desc_by<K: Ord>(key: impl Fn(&E) -> K + Send + Sync + 'static) -> Self {
        Self(Arc::new(move |a, b| key(b).cmp(&key(a))))
    }

    pub fn compare(&self, a: &E, b: &E) -> Ordering {
        (self.0)(a, b)
    }
}

impl<E> std::fmt::Debug for OrderBy<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("OrderBy(..)")
    }
}

/// Paging parameters: zero-based index, positive size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub index: usize,
    pub size: usize,
}

impl PageRequest {
    /// Creates a page request, validating that size is positive.
    pub fn new(index: usize, size: usize) -> Result<Self, PageRequestError> {
        if size == 0 {
            return Err(PageRequestError::InvalidSize);
        }
        Ok(Self { index, size })
    }
}

/// One page of a filtered query result.
///
/// `count` is the total number of items matching the filter, not the number
/// of items on this page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub index: usize,
    pub size: usize,
    pub count: usize,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, index: usize, size: usize, count: usize) -> Self {
        Self {
            items,
            index,
            size,
            count,
        }
    }

    /// Total number of pages for the filtered set.
    pub fn pages(&self) -> usize {
        self.count.div_ceil(self.size)
    }

    pub fn has_previous(&self) -> bool {
        self.index > 0
    }

    pub fn has_next(&self) -> bool {
        (self.index + 1) * self.size < self.count
    }

    /// Maps the page items, preserving the paging metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            index: self.index,
            size: self.size,
            count: self.count,
        }
    }
}

/// Single-entity lookup.
///
/// `include_related` and `track` are hints for persistence backends (eager
/// loading, change tracking); the in-memory backend ignores them.
#[derive(Debug, Clone)]
pub struct GetQuery<E> {
    pub predicate: Predicate<E>,
    pub include_related: bool,
    pub track: bool,
}

impl<E> GetQuery<E> {
    pub fn by(predicate: Predicate<E>) -> Self {
        Self {
            predicate,
            include_related: false,
            track: true,
        }
    }

    pub fn with_related(mut self) -> Self {
        self.include_related = true;
        self
    }

    pub fn without_tracking(mut self) -> Self {
        self.track = false;
        self
    }
}

/// Paged list query: optional filter, optional ordering, page request.
#[derive(Debug, Clone)]
pub struct ListQuery<E> {
    pub predicate: Option<Predicate<E>>,
    pub order_by: Option<OrderBy<E>>,
    pub page: PageRequest,
    pub include_related: bool,
}

impl<E> ListQuery<E> {
    pub fn page(page: PageRequest) -> Self {
        Self {
            predicate: None,
            order_by: None,
            page,
            include_related: false,
        }
    }

    pub fn filter(mut self, predicate: Predicate<E>) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn order(mut self, order_by: OrderBy<E>) -> Self {
        self.order_by = Some(order_by);
        self
    }

    pub fn with_related(mut self) -> Self {
        self.include_related = true;
        self
    }
}

/// Delete semantics: soft delete stamps `deleted_at`, hard delete removes the
/// row physically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeleteMode {
    #[default]
    Soft,
    Hard,
}

/// Identifier generation for repository `add`.
pub trait GenerateId: Sized {
    fn generate(seq: u64) -> Self;
}

impl GenerateId for i32 {
    fn generate(seq: u64) -> Self {
        // Saturate rather than wrap if the sequence ever outgrows i32.
        i32::try_from(seq).unwrap_or(i32::MAX)
    }
}

impl GenerateId for Uuid {
    fn generate(_seq: u64) -> Self {
        Uuid::new_v4()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_rejects_zero_size() {
        assert_eq!(PageRequest::new(0, 0), Err(PageRequestError::InvalidSize));
    }

    #[test]
    fn test_page_request_accepts_positive_size() {
        let page = PageRequest::new(2, 25).unwrap();
        assert_eq!(page.index, 2);
        assert_eq!(page.size, 25);
    }

    #[test]
    fn test_page_flags_first_page() {
        let page = Page::new(vec![1, 2, 3], 0, 3, 10);
        assert!(!page.has_previous());
        assert!(page.has_next());
        assert_eq!(page.pages(), 4);
    }

    #[test]
    fn test_page_flags_last_page() {
        let page = Page::new(vec![10], 3, 3, 10);
        assert!(page.has_previous());
        assert!(!page.has_next());
    }

    #[test]
    fn test_page_has_next_iff_count_exceeds_size_on_first_page() {
        let full = Page::new(vec![1, 2, 3], 0, 3, 4);
        assert!(full.has_next());

        let exact = Page::new(vec![1, 2, 3], 0, 3, 3);
        assert!(!exact.has_next());
    }

    #[test]
    fn test_page_map_preserves_metadata() {
        let page = Page::new(vec![1, 2], 1, 2, 5).map(|n| n * 10);
        assert_eq!(page.items, vec![10, 20]);
        assert_eq!(page.index, 1);
        assert_eq!(page.size, 2);
        assert_eq!(page.count, 5);
    }

    #[test]
    fn test_predicate_matches() {
        let even = Predicate::new(|n: &i32| n % 2 == 0);
        assert!(even.matches(&4));
        assert!(!even.matches(&5));
    }

    #[test]
    fn test_order_by_asc_and_desc() {
        let asc = OrderBy::asc_by(|n: &i32| *n);
        assert_eq!(asc.compare(&1, &2), Ordering::Less);

        let desc = OrderBy::desc_by(|n: &i32| *n);
        assert_eq!(desc.compare(&1, &2), Ordering::Greater);
    }

    #[test]
    fn test_generate_sequential_i32() {
        assert_eq!(i32::generate(1), 1);
        assert_eq!(i32::generate(42), 42);
    }

    #[test]
    fn test_generate_i32_saturates_past_max() {
        assert_eq!(i32::generate(i32::MAX as u64), i32::MAX);
        assert_eq!(i32::generate(i32::MAX as u64 + 1), i32::MAX);
        assert_eq!(i32::generate(u64::MAX), i32::MAX);
    }

    #[test]
    fn test_generate_uuid_is_unique() {
        assert_ne!(Uuid::generate(1), Uuid::generate(1));
    }
}
