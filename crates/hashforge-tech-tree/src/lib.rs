//! Tech Tree Module for the hashforge engine.
//!
//! Holds the static set of upgrade nodes bought with insight (the prestige
//! currency) and validates unlocks against a player's unlocked set.
//!
//! # Overview
//!
//! Nodes are registered at startup via [`TechTree::register`]. Each
//! [`TechNode`] has prerequisites, an insight cost and three passive effects:
//! a bonus added to the prestige multiplier, a production bonus summed into
//! the rate calculator, and a security bonus that discounts breach losses.
//!
//! The tree itself never stores which nodes a player owns. Unlock state is
//! part of the persisted player record and is passed in by the caller, so the
//! same tree can validate any number of saves.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Identifies a node in the tech tree. Cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TechId(pub u32);

// ---------------------------------------------------------------------------
// Node definition
// ---------------------------------------------------------------------------

/// A node that can be unlocked with insight. Registered at startup; immutable
/// after registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechNode {
    /// Unique identifier.
    pub id: TechId,

    /// Human-readable name.
    pub name: String,

    /// Nodes that must be unlocked before this one.
    pub prerequisites: Vec<TechId>,

    /// Insight spent on unlock.
    pub cost: f64,

    /// Added to the prestige multiplier when unlocked.
    #[serde(default)]
    pub prestige_multiplier: f64,

    /// Summed into the production formula's `(1 + bonus)` term.
    #[serde(default)]
    pub production_bonus: f64,

    /// Fraction of breach losses prevented. Summed and capped by the caller.
    #[serde(default)]
    pub security_bonus: f64,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during tech tree operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TechTreeError {
    #[error("tech node not found: {0:?}")]
    NotFound(TechId),

    #[error("tech node {0:?} is already unlocked")]
    AlreadyUnlocked(TechId),

    #[error("prerequisite not met: {0:?} requires {1:?}")]
    PrerequisiteNotMet(TechId, TechId),

    #[error("not enough insight for {id:?}: need {needed}, have {available}")]
    InsufficientInsight {
        id: TechId,
        needed: f64,
        available: f64,
    },

    #[error("duplicate tech node id: {0:?}")]
    DuplicateId(TechId),

    #[error("prerequisite {prereq:?} for node {node:?} does not exist")]
    InvalidPrerequisite { node: TechId, prereq: TechId },
}

// ---------------------------------------------------------------------------
// Unlock receipt
// ---------------------------------------------------------------------------

/// What a successful unlock changed. Returned so the caller can apply the
/// prestige bonus and report the spend.
#[derive(Debug, Clone, PartialEq)]
pub struct UnlockReceipt {
    pub id: TechId,
    pub cost: f64,
    pub prestige_multiplier: f64,
}

// ---------------------------------------------------------------------------
// TechTree
// ---------------------------------------------------------------------------

/// The registered set of tech nodes.
///
/// Nodes keep registration order so listings are stable for UIs and data
/// files. Serialized as the plain node list; the id index is rebuilt on load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<TechNode>", into = "Vec<TechNode>")]
pub struct TechTree {
    /// Registered nodes in registration order.
    nodes: Vec<TechNode>,

    /// Position of each node in `nodes`.
    index: HashMap<TechId, usize>,
}

impl From<Vec<TechNode>> for TechTree {
    fn from(nodes: Vec<TechNode>) -> Self {
        let index = nodes.iter().enumerate().map(|(i, n)| (n.id, i)).collect();
        Self { nodes, index }
    }
}

impl From<TechTree> for Vec<TechNode> {
    fn from(tree: TechTree) -> Self {
        tree.nodes
    }
}

impl TechTree {
    /// Create a new, empty tech tree.
    pub fn new() -> Self {
        Self::default()
    }

    // -- Registration API --

    /// Register a node. Its id must be unique and every prerequisite must
    /// already be registered, which also rules out cycles.
    pub fn register(&mut self, node: TechNode) -> Result<TechId, TechTreeError> {
        let id = node.id;

        if self.index.contains_key(&id) {
            return Err(TechTreeError::DuplicateId(id));
        }

        for prereq in &node.prerequisites {
            if !self.index.contains_key(prereq) {
                return Err(TechTreeError::InvalidPrerequisite {
                    node: id,
                    prereq: *prereq,
                });
            }
        }

        self.index.insert(id, self.nodes.len());
        self.nodes.push(node);
        Ok(id)
    }

    // -- Query API --

    /// Get a node definition by ID.
    pub fn get(&self, id: TechId) -> Option<&TechNode> {
        self.index.get(&id).map(|&i| &self.nodes[i])
    }

    /// All nodes in registration order.
    pub fn nodes(&self) -> impl Iterator<Item = &TechNode> {
        self.nodes.iter()
    }

    /// Number of registered nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether every prerequisite of `id` is in `unlocked`.
    pub fn prerequisites_met(
        &self,
        id: TechId,
        unlocked: &BTreeSet<TechId>,
    ) -> Result<bool, TechTreeError> {
        let node = self.get(id).ok_or(TechTreeError::NotFound(id))?;
        Ok(node.prerequisites.iter().all(|p| unlocked.contains(p)))
    }

    /// Nodes that could be unlocked right now, ignoring cost.
    pub fn available(&self, unlocked: &BTreeSet<TechId>) -> Vec<TechId> {
        self.nodes()
            .filter(|n| !unlocked.contains(&n.id))
            .filter(|n| n.prerequisites.iter().all(|p| unlocked.contains(p)))
            .map(|n| n.id)
            .collect()
    }

    /// Sum of production bonuses over the unlocked set. Unknown ids are
    /// skipped.
    pub fn production_bonus(&self, unlocked: &BTreeSet<TechId>) -> f64 {
        unlocked
            .iter()
            .filter_map(|id| self.get(*id))
            .map(|n| n.production_bonus)
            .sum()
    }

    /// Sum of security bonuses over the unlocked set.
    pub fn security_bonus(&self, unlocked: &BTreeSet<TechId>) -> f64 {
        unlocked
            .iter()
            .filter_map(|id| self.get(*id))
            .map(|n| n.security_bonus)
            .sum()
    }

    // -- Unlock --

    /// Check whether `id` can be unlocked without changing anything.
    pub fn check_unlock(
        &self,
        id: TechId,
        unlocked: &BTreeSet<TechId>,
        insight: f64,
    ) -> Result<&TechNode, TechTreeError> {
        let node = self.get(id).ok_or(TechTreeError::NotFound(id))?;

        if unlocked.contains(&id) {
            return Err(TechTreeError::AlreadyUnlocked(id));
        }

        for prereq in &node.prerequisites {
            if !unlocked.contains(prereq) {
                return Err(TechTreeError::PrerequisiteNotMet(id, *prereq));
            }
        }

        if insight < node.cost {
            return Err(TechTreeError::InsufficientInsight {
                id,
                needed: node.cost,
                available: insight,
            });
        }

        Ok(node)
    }

    /// Unlock `id`: deduct its cost from `insight` and insert it into
    /// `unlocked`. Either both change or neither does.
    pub fn unlock(
        &self,
        id: TechId,
        unlocked: &mut BTreeSet<TechId>,
        insight: &mut f64,
    ) -> Result<UnlockReceipt, TechTreeError> {
        let node = self.check_unlock(id, unlocked, *insight)?;
        let receipt = UnlockReceipt {
            id,
            cost: node.cost,
            prestige_multiplier: node.prestige_multiplier,
        };

        *insight = (*insight - node.cost).max(0.0);
        unlocked.insert(id);
        Ok(receipt)
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: u32, cost: f64, prerequisites: Vec<u32>) -> TechNode {
        TechNode {
            id: TechId(id),
            name: format!("node-{id}"),
            prerequisites: prerequisites.into_iter().map(TechId).collect(),
            cost,
            prestige_multiplier: 0.05,
            production_bonus: 0.1,
            security_bonus: 0.0,
        }
    }

    /// Kernel -> (Paste, Scheduler) -> Ledger
    fn setup_diamond() -> TechTree {
        let mut tree = TechTree::new();
        tree.register(node(0, 1.0, vec![])).unwrap();
        tree.register(node(1, 2.0, vec![0])).unwrap();
        tree.register(node(2, 3.0, vec![0])).unwrap();
        tree.register(node(3, 5.0, vec![1, 2])).unwrap();
        tree
    }

    #[test]
    fn unlock_deducts_cost_and_records_node() {
        let tree = setup_diamond();
        let mut unlocked = BTreeSet::new();
        let mut insight = 4.0;

        let receipt = tree.unlock(TechId(0), &mut unlocked, &mut insight).unwrap();

        assert_eq!(receipt.cost, 1.0);
        assert_eq!(receipt.prestige_multiplier, 0.05);
        assert_eq!(insight, 3.0);
        assert!(unlocked.contains(&TechId(0)));
    }

    #[test]
    fn already_unlocked_is_rejected_without_charge() {
        let tree = setup_diamond();
        let mut unlocked = BTreeSet::from([TechId(0)]);
        let mut insight = 10.0;

        let result = tree.unlock(TechId(0), &mut unlocked, &mut insight);

        assert_eq!(result, Err(TechTreeError::AlreadyUnlocked(TechId(0))));
        assert_eq!(insight, 10.0);
    }

    #[test]
    fn missing_prerequisite_is_rejected() {
        let tree = setup_diamond();
        let mut unlocked = BTreeSet::from([TechId(0), TechId(1)]);
        let mut insight = 10.0;

        let result = tree.unlock(TechId(3), &mut unlocked, &mut insight);

        assert_eq!(
            result,
            Err(TechTreeError::PrerequisiteNotMet(TechId(3), TechId(2)))
        );
        assert_eq!(unlocked.len(), 2);
        assert_eq!(insight, 10.0);
    }

    #[test]
    fn insufficient_insight_is_rejected() {
        let tree = setup_diamond();
        let mut unlocked = BTreeSet::from([TechId(0)]);
        let mut insight = 2.5;

        let result = tree.unlock(TechId(2), &mut unlocked, &mut insight);

        assert!(matches!(
            result,
            Err(TechTreeError::InsufficientInsight { needed, available, .. })
                if needed == 3.0 && available == 2.5
        ));
        assert!(!unlocked.contains(&TechId(2)));
    }

    #[test]
    fn unknown_node_is_not_found() {
        let tree = setup_diamond();
        let mut unlocked = BTreeSet::new();
        let mut insight = 100.0;
        assert_eq!(
            tree.unlock(TechId(99), &mut unlocked, &mut insight),
            Err(TechTreeError::NotFound(TechId(99)))
        );
    }

    #[test]
    fn register_rejects_duplicates_and_dangling_prerequisites() {
        let mut tree = setup_diamond();
        assert_eq!(
            tree.register(node(1, 1.0, vec![])),
            Err(TechTreeError::DuplicateId(TechId(1)))
        );
        assert_eq!(
            tree.register(node(7, 1.0, vec![42])),
            Err(TechTreeError::InvalidPrerequisite {
                node: TechId(7),
                prereq: TechId(42)
            })
        );
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn available_follows_prerequisites() {
        let tree = setup_diamond();
        assert_eq!(tree.available(&BTreeSet::new()), vec![TechId(0)]);

        let unlocked = BTreeSet::from([TechId(0)]);
        assert_eq!(tree.available(&unlocked), vec![TechId(1), TechId(2)]);
    }

    #[test]
    fn bonus_sums_cover_unlocked_nodes_only() {
        let tree = setup_diamond();
        let unlocked = BTreeSet::from([TechId(0), TechId(2)]);
        assert!((tree.production_bonus(&unlocked) - 0.2).abs() < 1e-12);
        assert_eq!(tree.security_bonus(&unlocked), 0.0);
    }

    #[test]
    fn nodes_iterate_in_registration_order() {
        let tree = setup_diamond();
        let ids: Vec<u32> = tree.nodes().map(|n| n.id.0).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
    }

    #[test]
    fn tech_tree_is_serializable() {
        let tree = setup_diamond();
        let json = serde_json::to_string(&tree).unwrap();
        let restored: TechTree = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.len(), 4);
        assert_eq!(restored.get(TechId(3)), tree.get(TechId(3)));
    }
}
