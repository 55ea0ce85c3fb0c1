//! Session cache of result sets keyed by time window.
//!
//! Entries persist for the whole session, storing backend results keyed by
//! the selected time-range tab. This avoids a second round-trip when users
//! click back and forth between tabs.
//!
//! # Cache Key Structure
//! - `start`: tab start time as the backend lists it (`HH:MM`)
//! - `end`: tab end time, or empty for single-instant tabs
//!
//! Distances are not part of the key: the rows of a window already say which
//! distances they cover.
//!
//! # Cache Value Structure
//! - `Rc<R>`: the stored result set, shared read-only with every reader

use crate::models::TimeRange;
use log::debug;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// `start-end`, with an empty `end` for single-instant windows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&TimeRange> for CacheKey {
    fn from(tab: &TimeRange) -> Self {
        CacheKey(format!(
            "{}-{}",
            tab.start_time,
            tab.end_time.as_deref().unwrap_or("")
        ))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unbounded, never-invalidated map from time window to result set.
#[derive(Debug)]
pub struct ResultCache<R> {
    entries: HashMap<CacheKey, Rc<R>>,
}

impl<R> Default for ResultCache<R> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<R> ResultCache<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<Rc<R>> {
        self.entries.get(key).cloned()
    }

    /// Store `value` under `key` and return the shared handle.
    pub fn put(&mut self, key: CacheKey, value: R) -> Rc<R> {
        let value = Rc::new(value);
        debug!("Caching result set for window {}", key);
        self.entries.insert(key, value.clone());
        value
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tab(start: &str, end: Option<&str>) -> TimeRange {
        TimeRange {
            start_time: start.to_string(),
            end_time: end.map(str::to_string),
        }
    }

    #[test]
    fn key_joins_start_and_optional_end() {
        assert_eq!(CacheKey::from(&tab("14:00", None)).as_str(), "14:00-");
        assert_eq!(
            CacheKey::from(&tab("14:00", Some("16:30"))).as_str(),
            "14:00-16:30"
        );
    }

    #[test]
    fn put_then_get_returns_same_entry() {
        let mut cache = ResultCache::new();
        let key = CacheKey::from(&tab("14:00", None));
        assert!(cache.is_empty());
        let stored = cache.put(key.clone(), vec![280u16, 500]);

        let first = cache.get(&key).unwrap();
        let second = cache.get(&key).unwrap();
        assert!(Rc::ptr_eq(&stored, &first));
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(*first, vec![280, 500]);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&key));
        assert!(!cache.contains(&CacheKey::from(&tab("14:00", Some("15:00")))));
    }
}
