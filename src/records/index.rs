//! In-memory lookup structures over the telemetry log.

use crate::types::ItemId;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::ops::Bound;

/// Per-item index entry.
#[derive(Clone, Debug)]
pub struct IndexEntry {
    /// Offset of the insert frame in the log.
    pub offset: u64,
    /// Event time, as submitted.
    pub time: String,
    /// Derived classification.
    pub item_type: String,
}

/// Index over the live item set.
///
/// Rebuilt from the log on open by replaying entries in order; never
/// persisted separately. Supports id lookup, time-ordered pagination, and
/// itemType bucketing.
pub struct TelemetryIndex {
    /// id -> entry.
    entries: RwLock<HashMap<ItemId, IndexEntry>>,

    /// (time, id), ordered; iterated in reverse for time-descending reads.
    by_time: RwLock<BTreeSet<(String, ItemId)>>,

    /// itemType -> ids.
    by_type: RwLock<HashMap<String, HashSet<ItemId>>>,
}

impl TelemetryIndex {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            by_time: RwLock::new(BTreeSet::new()),
            by_type: RwLock::new(HashMap::new()),
        }
    }

    /// Add an item to the index.
    pub fn insert(&self, id: ItemId, time: String, item_type: String, offset: u64) {
        self.by_time.write().insert((time.clone(), id.clone()));
        self.by_type
            .write()
            .entry(item_type.clone())
            .or_default()
            .insert(id.clone());
        self.entries.write().insert(
            id,
            IndexEntry {
                offset,
                time,
                item_type,
            },
        );
    }

    /// Remove an item. Returns false if the id was not present.
    pub fn remove(&self, id: &ItemId) -> bool {
        let entry = match self.entries.write().remove(id) {
            Some(entry) => entry,
            None => return false,
        };

        self.by_time.write().remove(&(entry.time, id.clone()));

        let mut by_type = self.by_type.write();
        if let Some(ids) = by_type.get_mut(&entry.item_type) {
            ids.remove(id);
            if ids.is_empty() {
                by_type.remove(&entry.item_type);
            }
        }

        true
    }

    /// Drop every entry. Returns the number removed.
    pub fn clear(&self) -> u64 {
        let mut entries = self.entries.write();
        let count = entries.len() as u64;
        entries.clear();
        self.by_time.write().clear();
        self.by_type.write().clear();
        count
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.entries.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Log offsets of the most recent items, time-descending, skipping
    /// `skip` and returning at most `limit`.
    pub fn recent(&self, limit: usize, skip: usize) -> Vec<u64> {
        let by_time = self.by_time.read();
        let entries = self.entries.read();

        by_time
            .iter()
            .rev()
            .skip(skip)
            .take(limit)
            .filter_map(|(_, id)| entries.get(id).map(|e| e.offset))
            .collect()
    }

    /// Ids matching the conjunction of the supplied criteria. Bounds are
    /// inclusive on both ends; an absent criterion matches everything.
    pub fn select(
        &self,
        ids: Option<&[ItemId]>,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Vec<ItemId> {
        let in_range = |time: &str| {
            start.map_or(true, |s| time >= s) && end.map_or(true, |e| time <= e)
        };

        if let Some(ids) = ids {
            let entries = self.entries.read();
            return ids
                .iter()
                .filter(|id| entries.get(*id).is_some_and(|e| in_range(&e.time)))
                .cloned()
                .collect();
        }

        let lower = match start {
            Some(s) => Bound::Included((s.to_string(), ItemId(String::new()))),
            None => Bound::Unbounded,
        };

        self.by_time
            .read()
            .range((lower, Bound::Unbounded))
            .take_while(|(time, _)| end.map_or(true, |e| time.as_str() <= e))
            .map(|(_, id)| id.clone())
            .collect()
    }

    /// Ids carrying a given classification.
    pub fn ids_of_type(&self, item_type: &str) -> Vec<ItemId> {
        self.by_type
            .read()
            .get(item_type)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of distinct classifications currently present.
    pub fn type_count(&self) -> usize {
        self.by_type.read().len()
    }
}

impl Default for TelemetryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(index: &TelemetryIndex, id: &str, time: &str, item_type: &str, offset: u64) {
        index.insert(
            ItemId::from(id),
            time.to_string(),
            item_type.to_string(),
            offset,
        );
    }

    #[test]
    fn test_recent_is_time_descending() {
        let index = TelemetryIndex::new();
        add(&index, "a", "2024-01-01T00:00:00Z", "Event", 0);
        add(&index, "b", "2024-01-03T00:00:00Z", "Event", 100);
        add(&index, "c", "2024-01-02T00:00:00Z", "Request", 200);

        assert_eq!(index.recent(10, 0), vec![100, 200, 0]);
        assert_eq!(index.recent(2, 0), vec![100, 200]);
        assert_eq!(index.recent(10, 1), vec![200, 0]);
    }

    #[test]
    fn test_remove_updates_all_structures() {
        let index = TelemetryIndex::new();
        add(&index, "a", "2024-01-01T00:00:00Z", "Event", 0);
        add(&index, "b", "2024-01-02T00:00:00Z", "Event", 100);

        assert!(index.remove(&ItemId::from("a")));
        assert!(!index.remove(&ItemId::from("a")));

        assert_eq!(index.len(), 1);
        assert_eq!(index.recent(10, 0), vec![100]);
        assert_eq!(index.ids_of_type("Event"), vec![ItemId::from("b")]);
    }

    #[test]
    fn test_select_by_ids_and_range() {
        let index = TelemetryIndex::new();
        add(&index, "a", "2024-01-01T00:00:00Z", "Event", 0);
        add(&index, "b", "2024-01-02T00:00:00Z", "Event", 100);
        add(&index, "c", "2024-01-03T00:00:00Z", "Event", 200);

        // id membership is intersected with the time range
        let ids = [ItemId::from("a"), ItemId::from("c"), ItemId::from("zz")];
        let matched = index.select(Some(&ids), Some("2024-01-02T00:00:00Z"), None);
        assert_eq!(matched, vec![ItemId::from("c")]);

        // range only, inclusive on both ends
        let matched = index.select(
            None,
            Some("2024-01-01T00:00:00Z"),
            Some("2024-01-02T00:00:00Z"),
        );
        assert_eq!(matched.len(), 2);
        assert!(matched.contains(&ItemId::from("a")));
        assert!(matched.contains(&ItemId::from("b")));

        // no criteria matches everything (the store rejects this case
        // before it reaches the index)
        assert_eq!(index.select(None, None, None).len(), 3);
    }

    #[test]
    fn test_clear() {
        let index = TelemetryIndex::new();
        add(&index, "a", "2024-01-01T00:00:00Z", "Event", 0);
        add(&index, "b", "2024-01-02T00:00:00Z", "Request", 100);

        assert_eq!(index.clear(), 2);
        assert!(index.is_empty());
        assert_eq!(index.type_count(), 0);
    }
}
