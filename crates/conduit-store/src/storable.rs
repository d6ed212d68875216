//! Storable records and filter predicates

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// A record the repository can persist
///
/// Records of one type share the namespace named by [`Storable::KIND`]; keys
/// are unique within it.
pub trait Storable: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Namespace for this record type
    const KIND: &'static str;

    /// Primary key; empty until one is assigned
    fn key(&self) -> &str;

    /// Assign the primary key
    fn set_key(&mut self, key: String);
}

/// Predicate over one stored record
///
/// Filters are stateless and cheap to clone; a list of filters accepts a
/// record only when every filter does.
pub struct Filter<T> {
    predicate: Arc<dyn Fn(&T) -> bool + Send + Sync>,
}

impl<T> Filter<T> {
    /// Wrap a predicate
    pub fn new(predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        Self {
            predicate: Arc::new(predicate),
        }
    }

    /// Evaluate the predicate
    pub fn accepts(&self, record: &T) -> bool {
        (self.predicate)(record)
    }

    /// Combine with another filter by logical AND
    pub fn and(self, other: Filter<T>) -> Filter<T>
    where
        T: 'static,
    {
        Filter::new(move |record| self.accepts(record) && other.accepts(record))
    }
}

impl<T> Clone for Filter<T> {
    fn clone(&self) -> Self {
        Self {
            predicate: Arc::clone(&self.predicate),
        }
    }
}

impl<T> fmt::Debug for Filter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter").finish_non_exhaustive()
    }
}

/// True when `record` passes every filter; an empty list accepts everything
pub fn accepts_all<T>(filters: &[Filter<T>], record: &T) -> bool {
    filters.iter().all(|filter| filter.accepts(record))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_list_accepts() {
        assert!(accepts_all::<u32>(&[], &7));
    }

    #[test]
    fn test_filters_are_anded() {
        let even = Filter::new(|n: &u32| n % 2 == 0);
        let small = Filter::new(|n: &u32| *n < 10);
        let filters = vec![even.clone(), small.clone()];

        assert!(accepts_all(&filters, &4));
        assert!(!accepts_all(&filters, &5));
        assert!(!accepts_all(&filters, &12));

        let both = even.and(small);
        assert!(both.accepts(&8));
        assert!(!both.accepts(&14));
    }
}
