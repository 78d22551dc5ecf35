use std::collections::BTreeSet;

/// A group of related observable values. Observers re-read a group when it is
/// reported dirty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldGroup {
    /// Hashes, credits, staked, insight.
    Resources,
    /// Heat, integrity, thermal status, purge.
    Thermal,
    /// Breaker, draw, bill, overclock.
    Power,
    Market,
    Chaos,
    /// Story stage, dilemma, flavor, news.
    Narrative,
    /// Tech, prestige, faction, ascension.
    Progression,
}

impl FieldGroup {
    pub const ALL: [FieldGroup; 7] = [
        FieldGroup::Resources,
        FieldGroup::Thermal,
        FieldGroup::Power,
        FieldGroup::Market,
        FieldGroup::Chaos,
        FieldGroup::Narrative,
        FieldGroup::Progression,
    ];
}

/// Tracks which field groups changed since the last drain.
///
/// Handlers mark groups as they mutate them; the caller drains the set with
/// [`take`](ChangeTracker::take) after advancing the engine.
#[derive(Debug, Clone, Default)]
pub struct ChangeTracker {
    dirty: BTreeSet<FieldGroup>,
    fleet_dirty: bool,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&mut self, group: FieldGroup) {
        self.dirty.insert(group);
    }

    /// Equipment counts changed. Also dirties the groups derived from them.
    pub fn mark_fleet(&mut self) {
        self.fleet_dirty = true;
        self.dirty.insert(FieldGroup::Resources);
        self.dirty.insert(FieldGroup::Thermal);
        self.dirty.insert(FieldGroup::Power);
    }

    pub fn mark_all(&mut self) {
        self.dirty.extend(FieldGroup::ALL);
        self.fleet_dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty() || self.fleet_dirty
    }

    pub fn is_group_dirty(&self, group: FieldGroup) -> bool {
        self.dirty.contains(&group)
    }

    pub fn is_fleet_dirty(&self) -> bool {
        self.fleet_dirty
    }

    /// Return the dirty groups and mark everything clean.
    pub fn take(&mut self) -> BTreeSet<FieldGroup> {
        self.fleet_dirty = false;
        std::mem::take(&mut self.dirty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_tracker_is_clean() {
        let t = ChangeTracker::new();
        assert!(!t.is_dirty());
        assert!(!t.is_fleet_dirty());
    }

    #[test]
    fn mark_and_take() {
        let mut t = ChangeTracker::new();
        t.mark(FieldGroup::Market);
        t.mark(FieldGroup::Market);
        assert!(t.is_group_dirty(FieldGroup::Market));
        let taken = t.take();
        assert_eq!(taken.into_iter().collect::<Vec<_>>(), vec![FieldGroup::Market]);
        assert!(!t.is_dirty());
    }

    #[test]
    fn fleet_changes_dirty_derived_groups() {
        let mut t = ChangeTracker::new();
        t.mark_fleet();
        assert!(t.is_fleet_dirty());
        assert!(t.is_group_dirty(FieldGroup::Thermal));
        assert!(t.is_group_dirty(FieldGroup::Power));
        assert!(!t.is_group_dirty(FieldGroup::Narrative));
        t.take();
        assert!(!t.is_fleet_dirty());
    }

    #[test]
    fn mark_all_covers_every_group() {
        let mut t = ChangeTracker::new();
        t.mark_all();
        assert_eq!(t.take().len(), FieldGroup::ALL.len());
    }
}
