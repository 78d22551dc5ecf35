use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

pub use hashforge_tech_tree::TechId;

new_key_type! {
    /// Identifies a pending one-shot timer in the scheduler.
    pub struct TimerId;
}

/// Identifies a narrative event (dilemma) in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NarrativeId(pub u32);

/// Key of the single player-progress record in the store.
pub const PLAYER_RECORD_ID: u32 = 1;

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn narrative_ids_order_by_value() {
        assert!(NarrativeId(1) < NarrativeId(2));
        assert_eq!(NarrativeId(3), NarrativeId(3));
    }

    #[test]
    fn timer_ids_are_distinct() {
        let mut sm = SlotMap::<TimerId, ()>::with_key();
        let a = sm.insert(());
        let b = sm.insert(());
        assert_ne!(a, b);
        sm.remove(a);
        assert!(!sm.contains_key(a));
        assert!(sm.contains_key(b));
    }
}
