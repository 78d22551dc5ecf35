//! Static game content behind one trait: equipment specs, the tech tree,
//! narrative dilemmas, headlines, flavor text and faction perks.
//!
//! [`StaticCatalog::builtin`] ships the default content; the data crate
//! builds a [`StaticCatalog`] from files instead.

use crate::equipment::{EquipmentSpec, EquipmentTable, EquipmentType};
use crate::faction::{Faction, PerkTable};
use crate::id::{NarrativeId, TechId};
use crate::market::Headline;
use crate::narrative::{DilemmaOption, Effect, NarrativeEvent, RollContext};
use crate::rng::SimRng;
use hashforge_tech_tree::{TechNode, TechTree};
use std::collections::BTreeMap;

pub trait Catalog {
    fn equipment_table(&self) -> &EquipmentTable;

    fn tech_tree(&self) -> &TechTree;

    fn narrative_event(&self, id: NarrativeId) -> Option<&NarrativeEvent>;

    /// Every event whose stage range includes `stage`.
    fn narrative_events_for_stage(&self, stage: u32) -> Vec<&NarrativeEvent>;

    fn headlines(&self) -> &[Headline];

    /// Flavor lines for `stage`. Empty when the stage has none.
    fn flavor_lines(&self, stage: u32) -> &[String];

    fn perks(&self) -> &PerkTable;

    fn equipment(&self, ty: EquipmentType) -> &EquipmentSpec {
        self.equipment_table().get(ty)
    }

    /// Choose a dilemma to present, uniformly among eligible events.
    fn roll_candidate(&self, ctx: &RollContext<'_>, rng: &mut SimRng) -> Option<NarrativeEvent> {
        let eligible: Vec<&NarrativeEvent> = self
            .narrative_events_for_stage(ctx.stage)
            .into_iter()
            .filter(|e| e.eligible(ctx))
            .collect();
        rng.pick(&eligible).map(|e| (*e).clone())
    }
}

// ---------------------------------------------------------------------------
// StaticCatalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    pub equipment: EquipmentTable,
    pub tech_tree: TechTree,
    pub events: Vec<NarrativeEvent>,
    pub headlines: Vec<Headline>,
    /// Lines keyed by the first stage they apply to.
    pub flavor: BTreeMap<u32, Vec<String>>,
    pub perks: PerkTable,
}

impl Catalog for StaticCatalog {
    fn equipment_table(&self) -> &EquipmentTable {
        &self.equipment
    }

    fn tech_tree(&self) -> &TechTree {
        &self.tech_tree
    }

    fn narrative_event(&self, id: NarrativeId) -> Option<&NarrativeEvent> {
        self.events.iter().find(|e| e.id == id)
    }

    fn narrative_events_for_stage(&self, stage: u32) -> Vec<&NarrativeEvent> {
        self.events.iter().filter(|e| e.fits_stage(stage)).collect()
    }

    fn headlines(&self) -> &[Headline] {
        &self.headlines
    }

    fn flavor_lines(&self, stage: u32) -> &[String] {
        self.flavor
            .range(..=stage)
            .next_back()
            .map(|(_, lines)| lines.as_slice())
            .unwrap_or(&[])
    }

    fn perks(&self) -> &PerkTable {
        &self.perks
    }
}

impl StaticCatalog {
    /// The default game content.
    pub fn builtin() -> Self {
        Self {
            equipment: EquipmentTable::builtin(),
            tech_tree: builtin_tech_tree(),
            events: builtin_events(),
            headlines: builtin_headlines(),
            flavor: builtin_flavor(),
            perks: PerkTable::builtin(),
        }
    }
}

// ---------------------------------------------------------------------------
// Built-in content
// ---------------------------------------------------------------------------

fn node(id: u32, name: &str, prerequisites: &[u32], cost: f64) -> TechNode {
    TechNode {
        id: TechId(id),
        name: name.to_string(),
        prerequisites: prerequisites.iter().map(|&p| TechId(p)).collect(),
        cost,
        prestige_multiplier: 0.0,
        production_bonus: 0.0,
        security_bonus: 0.0,
    }
}

fn builtin_tech_tree() -> TechTree {
    let nodes = vec![
        TechNode {
            prestige_multiplier: 0.05,
            production_bonus: 0.10,
            ..node(1, "Firmware Hacks", &[], 1.0)
        },
        TechNode {
            security_bonus: 0.25,
            ..node(2, "Hardened Wallets", &[], 2.0)
        },
        TechNode {
            prestige_multiplier: 0.10,
            production_bonus: 0.15,
            ..node(3, "Pool Routing", &[1], 3.0)
        },
        TechNode {
            security_bonus: 0.25,
            ..node(4, "Honeypots", &[2], 4.0)
        },
        TechNode {
            prestige_multiplier: 0.15,
            production_bonus: 0.25,
            ..node(5, "Immersion Know-how", &[3], 6.0)
        },
        TechNode {
            prestige_multiplier: 0.10,
            security_bonus: 0.30,
            ..node(6, "Zero-Knowledge Ops", &[4], 8.0)
        },
        TechNode {
            prestige_multiplier: 0.50,
            production_bonus: 0.50,
            ..node(7, "Quantum Annealing", &[5, 6], 15.0)
        },
    ];
    TechTree::from(nodes)
}

fn option(label: &str, effects: Vec<Effect>) -> DilemmaOption {
    DilemmaOption {
        label: label.to_string(),
        effects,
    }
}

fn event(
    id: u32,
    title: &str,
    body: &str,
    stages: (u32, Option<u32>),
    one_time: bool,
    options: Vec<DilemmaOption>,
) -> NarrativeEvent {
    NarrativeEvent {
        id: NarrativeId(id),
        title: title.to_string(),
        body: body.to_string(),
        min_stage: stages.0,
        max_stage: stages.1,
        one_time,
        requires_faction: None,
        options,
    }
}

fn builtin_events() -> Vec<NarrativeEvent> {
    vec![
        event(
            1,
            "A Stranger's Offer",
            "Someone at the repair shop is dumping a box of used cards.",
            (1, Some(2)),
            true,
            vec![
                option(
                    "Take a card",
                    vec![
                        Effect::GrantEquipment {
                            equipment: EquipmentType::RefurbishedGpu,
                            count: 1,
                        },
                        Effect::Log("The card still smells of smoke. It works.".into()),
                    ],
                ),
                option("Sell the tip", vec![Effect::AddCredits(25.0)]),
            ],
        ),
        event(
            2,
            "Landlord at the Door",
            "The hallway is warm and the meter is spinning.",
            (2, Some(3)),
            false,
            vec![
                option("Pay him off", vec![Effect::ScaleCredits(0.9)]),
                option(
                    "Hide the rigs",
                    vec![
                        Effect::AddHeat(15.0),
                        Effect::Log("Rigs stuffed in the closet. It is getting hot.".into()),
                    ],
                ),
            ],
        ),
        event(
            3,
            "Pool Invitation",
            "A corporate mining pool wants your hashrate under contract.",
            (2, None),
            true,
            vec![
                option(
                    "Sign the contract",
                    vec![Effect::SetFaction(Faction::Corporate), Effect::AddCredits(500.0)],
                ),
                option("Stay independent", vec![Effect::AddInsight(0.5)]),
            ],
        ),
        event(
            4,
            "The Collective",
            "An encrypted message asks you to run a privacy relay.",
            (3, None),
            true,
            vec![
                option(
                    "Run the relay",
                    vec![Effect::SetFaction(Faction::Cypherpunk), Effect::AddHashes(1_000.0)],
                ),
                option(
                    "Report them",
                    vec![Effect::AddCredits(2_000.0), Effect::DamageIntegrity(10.0)],
                ),
            ],
        ),
        event(
            5,
            "Firmware Leak",
            "Unsigned firmware promises thirty percent more hashrate.",
            (3, None),
            false,
            vec![
                option(
                    "Flash it",
                    vec![Effect::AddHashes(5_000.0), Effect::AddHeat(20.0)],
                ),
                option("Ignore it", vec![Effect::Log("Probably malware anyway.".into())]),
            ],
        ),
        event(
            6,
            "Grid Audit",
            "The utility is sending an inspector about your draw.",
            (3, None),
            false,
            vec![
                option("Bribe the inspector", vec![Effect::ScaleCredits(0.8)]),
                option(
                    "Let them inspect",
                    vec![Effect::DamageIntegrity(5.0), Effect::AddInsight(0.2)],
                ),
            ],
        ),
        event(
            7,
            "Whispers in the Noise",
            "The quantum rig is returning hashes nobody asked for.",
            (4, None),
            true,
            vec![
                option(
                    "Listen",
                    vec![
                        Effect::SetFaction(Faction::Singularity),
                        Effect::AdvanceStage(5),
                        Effect::Log("Something on the other side listens back.".into()),
                    ],
                ),
                option("Pull the plug", vec![Effect::RepairIntegrity(50.0)]),
            ],
        ),
        event(
            8,
            "The Awakening",
            "The farm has started optimizing itself.",
            (4, None),
            true,
            vec![
                option("Let it wake", vec![Effect::AdvanceStage(5)]),
                option("Roll it back", vec![Effect::AddCredits(10_000.0)]),
            ],
        ),
    ]
}

fn builtin_headlines() -> Vec<Headline> {
    vec![
        Headline::new("ETF approval rumors lift prices", 1.4, 1.0),
        Headline::new("Whale dumps holdings; prices slide", 0.7, 1.0),
        Headline::new("Difficulty adjustment eases mining", 1.0, 1.15),
        Headline::new("Difficulty spikes after hashrate surge", 1.0, 0.85),
        Headline::new("Regulators announce crackdown", 0.6, 0.9),
        Headline::new("Payment giant adds crypto checkout", 1.25, 1.0),
        Headline::new("Exchange hacked; withdrawals frozen", 0.75, 0.95),
        Headline::new("Markets quiet ahead of halving", 1.0, 1.0),
    ]
}

fn lines(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn builtin_flavor() -> BTreeMap<u32, Vec<String>> {
    BTreeMap::from([
        (
            1,
            lines(&[
                "The fan rattles like a loose coin.",
                "Mom asks why the electric bill doubled.",
                "You refresh the price chart again.",
            ]),
        ),
        (
            2,
            lines(&[
                "The garage hums through the night.",
                "A neighbor complains about the noise.",
                "You start reading about cooling loops.",
            ]),
        ),
        (
            3,
            lines(&[
                "The ASICs scream in unison.",
                "Your spreadsheet has its own spreadsheet now.",
            ]),
        ),
        (
            4,
            lines(&[
                "The warehouse lights flicker with every block.",
                "Analysts quote your hashrate in their reports.",
            ]),
        ),
        (
            5,
            lines(&[
                "The farm dreams in SHA-256.",
                "Somewhere, a block is mined that no one asked for.",
            ]),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progression::STAGE_FLOOR;
    use std::collections::BTreeSet;

    #[test]
    fn builtin_tech_tree_is_consistent() {
        let catalog = StaticCatalog::builtin();
        let tree = catalog.tech_tree();
        assert_eq!(tree.len(), 7);
        for n in tree.nodes() {
            for p in &n.prerequisites {
                assert!(tree.get(*p).is_some(), "{:?} missing prereq {:?}", n.id, p);
            }
        }
    }

    #[test]
    fn builtin_event_ids_are_unique_and_have_options() {
        let catalog = StaticCatalog::builtin();
        let ids: BTreeSet<_> = catalog.events.iter().map(|e| e.id).collect();
        assert_eq!(ids.len(), catalog.events.len());
        assert!(catalog.events.iter().all(|e| !e.options.is_empty()));
    }

    #[test]
    fn flavor_falls_back_to_lower_stage() {
        let mut catalog = StaticCatalog::builtin();
        catalog.flavor.remove(&4);
        assert_eq!(catalog.flavor_lines(4), catalog.flavor_lines(3));
        assert!(catalog.flavor_lines(0).is_empty());
    }

    #[test]
    fn stage_filter_respects_ranges() {
        let catalog = StaticCatalog::builtin();
        let first: Vec<u32> = catalog
            .narrative_events_for_stage(1)
            .iter()
            .map(|e| e.id.0)
            .collect();
        assert_eq!(first, vec![1]);
        assert!(catalog
            .narrative_events_for_stage(STAGE_FLOOR)
            .iter()
            .any(|e| e.id == NarrativeId(3)));
    }

    #[test]
    fn roll_skips_triggered_one_time_events() {
        let catalog = StaticCatalog::builtin();
        let triggered = BTreeSet::from([NarrativeId(1)]);
        let ctx = RollContext {
            stage: 1,
            faction: Faction::Unaligned,
            triggered: &triggered,
        };
        let mut rng = SimRng::new(1);
        assert_eq!(catalog.roll_candidate(&ctx, &mut rng), None);
    }

    #[test]
    fn roll_returns_an_eligible_event() {
        let catalog = StaticCatalog::builtin();
        let triggered = BTreeSet::new();
        let ctx = RollContext {
            stage: 1,
            faction: Faction::Unaligned,
            triggered: &triggered,
        };
        let picked = catalog.roll_candidate(&ctx, &mut SimRng::new(1));
        assert_eq!(picked.map(|e| e.id), Some(NarrativeId(1)));
    }

    #[test]
    fn equipment_lookup_goes_through_table() {
        let catalog = StaticCatalog::builtin();
        assert_eq!(catalog.equipment(EquipmentType::RefurbishedGpu).hash_rate, 1.0);
    }
}
