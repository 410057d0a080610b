//! Per-session identity cache of persisted records.
//!
//! # Invariants
//! - Entries only ever hold state that was read from or written to the store.
//! - Statements that change many rows at once clear the whole table entry set.

use crate::model::record::{Record, RecordId};
use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;

type CacheKey = (&'static str, RecordId);

/// Identity cache keyed by `(table, id)`.
#[derive(Default)]
pub struct RecordCache {
    entries: RefCell<HashMap<CacheKey, Box<dyn Any>>>,
}

impl RecordCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<R: Record>(&self, id: RecordId) -> Option<R> {
        self.entries
            .borrow()
            .get(&(R::TABLE, id))
            .and_then(|entry| entry.downcast_ref::<R>())
            .cloned()
    }

    /// Stores a snapshot of `record`. Records without an id are ignored.
    pub fn put<R: Record>(&self, record: &R) {
        if let Some(id) = record.id() {
            self.entries
                .borrow_mut()
                .insert((R::TABLE, id), Box::new(record.clone()));
        }
    }

    pub fn evict<R: Record>(&self, id: RecordId) {
        self.entries.borrow_mut().remove(&(R::TABLE, id));
    }

    pub fn clear_table(&self, table: &str) {
        self.entries
            .borrow_mut()
            .retain(|(entry_table, _), _| *entry_table != table);
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::RecordCache;
    use crate::model::member::Member;
    use crate::model::record::Record;
    use crate::model::team::Team;

    #[test]
    fn put_get_and_evict_by_table_and_id() {
        let cache = RecordCache::new();
        let member = Member::with_age("member1", 10).with_id(1);
        let team = Team::new("teamA").with_id(1);
        cache.put(&member);
        cache.put(&team);

        assert_eq!(cache.get::<Member>(1), Some(member));
        assert_eq!(cache.get::<Team>(1), Some(team));

        cache.evict::<Member>(1);
        assert_eq!(cache.get::<Member>(1), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn clear_table_keeps_other_tables() {
        let cache = RecordCache::new();
        cache.put(&Member::new("member1").with_id(1));
        cache.put(&Member::new("member2").with_id(2));
        cache.put(&Team::new("teamA").with_id(1));

        cache.clear_table("members");
        assert_eq!(cache.len(), 1);
        assert!(cache.get::<Team>(1).is_some());

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn unsaved_records_are_not_cached() {
        let cache = RecordCache::new();
        cache.put(&Member::new("draft"));
        assert!(cache.is_empty());
    }
}
