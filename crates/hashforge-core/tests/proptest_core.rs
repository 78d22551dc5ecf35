//! Property-based tests for the Hashforge core engine.
//!
//! Uses proptest to generate fleets, modifiers and command scripts, then
//! verify the invariants the rate calculator and the engine promise.

use hashforge_core::chaos::ChaosKind;
use hashforge_core::command_queue::Command;
use hashforge_core::equipment::{EquipmentTable, EquipmentType, Fleet};
use hashforge_core::fixed::SECOND;
use hashforge_core::offline::{OfflineConfig, catch_up};
use hashforge_core::progression::{self, AscensionBranch};
use hashforge_core::rates::{self, Modifiers};
use hashforge_core::state::{PlayerState, Protocol};
use hashforge_core::test_utils::*;
use proptest::prelude::*;

// ===========================================================================
// Generators
// ===========================================================================

fn arb_equipment() -> impl Strategy<Value = EquipmentType> {
    (0..EquipmentType::COUNT).prop_map(|i| EquipmentType::ALL[i])
}

fn arb_producer() -> impl Strategy<Value = EquipmentType> {
    prop_oneof![
        Just(EquipmentType::RefurbishedGpu),
        Just(EquipmentType::GamingRig),
        Just(EquipmentType::AsicMiner),
        Just(EquipmentType::ImmersionTank),
        Just(EquipmentType::QuantumRig),
    ]
}

/// Types that emit heat and add no thermal buffer.
fn arb_heater() -> impl Strategy<Value = EquipmentType> {
    prop_oneof![
        Just(EquipmentType::RefurbishedGpu),
        Just(EquipmentType::GamingRig),
        Just(EquipmentType::AsicMiner),
        Just(EquipmentType::QuantumRig),
        Just(EquipmentType::DieselGenerator),
    ]
}

/// Types that remove heat and add no thermal buffer.
fn arb_cooler() -> impl Strategy<Value = EquipmentType> {
    prop_oneof![Just(EquipmentType::BoxFan), Just(EquipmentType::AcUnit)]
}

fn arb_fleet() -> impl Strategy<Value = Fleet> {
    proptest::collection::vec((arb_equipment(), 0..20u32), 0..8).prop_map(Fleet::from_rows)
}

fn arb_modifiers() -> impl Strategy<Value = Modifiers> {
    (
        any::<bool>(),
        any::<bool>(),
        any::<bool>(),
        0.0..100.0f64,
        prop_oneof![
            Just(Protocol::Standard),
            Just(Protocol::HighYield),
            Just(Protocol::Stealth)
        ],
    )
        .prop_map(|(overclock, diagnostics, exhaust, heat, protocol)| Modifiers {
            overclock,
            diagnostics_active: diagnostics,
            purge_exhaust: exhaust,
            heat,
            protocol,
            ..Modifiers::default()
        })
}

fn arb_command() -> impl Strategy<Value = Command> {
    prop_oneof![
        arb_equipment().prop_map(Command::BuyEquipment),
        arb_equipment().prop_map(Command::SellEquipment),
        Just(Command::Train),
        (0.0..500.0f64).prop_map(|hashes| Command::Convert { hashes }),
        (0.0..500.0f64).prop_map(|credits| Command::Stake { credits }),
        (0.0..500.0f64).prop_map(|credits| Command::Unstake { credits }),
        Just(Command::Purge),
        Just(Command::Repair),
        Just(Command::ResetBreaker),
        Just(Command::ToggleOverclock),
        (0..4usize).prop_map(|i| Command::TapEncounter(ChaosKind::ALL[i])),
        (0..12u32).prop_map(Command::TapDiagnosticsCell),
        (0..3usize).prop_map(|option| Command::ResolveDilemma { option }),
        Just(Command::ConfirmAscension(AscensionBranch::Continue)),
        Just(Command::CancelAscension),
        Just(Command::Pause),
        Just(Command::Resume),
    ]
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Adding a producer never lowers production.
    #[test]
    fn production_is_monotone_in_producers(
        fleet in arb_fleet(),
        m in arb_modifiers(),
        ty in arb_producer(),
    ) {
        let table = EquipmentTable::builtin();
        let before = rates::production_rate(&fleet, &table, &m);
        let mut more = fleet.clone();
        more.add(ty, 1);
        let after = rates::production_rate(&more, &table, &m);
        prop_assert!(after >= before);
    }

    /// The throttle stays within [0.1, 1] and never rises with heat.
    #[test]
    fn throttle_is_bounded_and_non_increasing(a in 0.0..100.0f64, b in 0.0..100.0f64) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let t_lo = rates::thermal_throttle(lo);
        let t_hi = rates::thermal_throttle(hi);
        prop_assert!(t_hi <= t_lo);
        prop_assert!((0.1 - 1e-12..=1.0).contains(&t_hi));
    }

    /// The throttle is the identity up to 75% and strictly falls above it.
    #[test]
    fn throttle_strictly_decreases_above_threshold(
        cool in 0.0..=75.0f64,
        lo in 75.001..99.99f64,
        gap in 0.001..25.0f64,
    ) {
        prop_assert_eq!(rates::thermal_throttle(cool), 1.0);
        let hi = (lo + gap).min(100.0);
        prop_assert!(rates::thermal_throttle(hi) < rates::thermal_throttle(lo));
    }

    /// At a fixed buffer, one more heater raises the heat percent-change.
    #[test]
    fn heat_change_rises_with_heaters(
        fleet in arb_fleet(),
        m in arb_modifiers(),
        ty in arb_heater(),
    ) {
        let table = EquipmentTable::builtin();
        let before = rates::heat_percent_change(&fleet, &table, &m);
        let mut more = fleet.clone();
        more.add(ty, 1);
        prop_assert_eq!(
            rates::thermal_buffer(&more, &table),
            rates::thermal_buffer(&fleet, &table)
        );
        prop_assert!(rates::heat_percent_change(&more, &table, &m) > before);
    }

    /// At a fixed buffer, one more cooler lowers the heat percent-change.
    #[test]
    fn heat_change_falls_with_coolers(
        fleet in arb_fleet(),
        m in arb_modifiers(),
        ty in arb_cooler(),
    ) {
        let table = EquipmentTable::builtin();
        let before = rates::heat_percent_change(&fleet, &table, &m);
        let mut more = fleet.clone();
        more.add(ty, 1);
        prop_assert_eq!(
            rates::thermal_buffer(&more, &table),
            rates::thermal_buffer(&fleet, &table)
        );
        prop_assert!(rates::heat_percent_change(&more, &table, &m) < before);
    }

    /// A tripped breaker zeroes production whatever else applies.
    #[test]
    fn tripped_breaker_stops_production(fleet in arb_fleet(), m in arb_modifiers()) {
        let table = EquipmentTable::builtin();
        let m = Modifiers { breaker_tripped: true, ..m };
        prop_assert_eq!(rates::production_rate(&fleet, &table, &m), 0.0);
    }

    /// Catching up twice for the same instant credits once.
    #[test]
    fn offline_catch_up_is_idempotent(
        last in 0..1_000_000u64,
        gap in 0..200_000u64,
        rate in 0.0..1_000.0f64,
        heat in 0.0..100.0f64,
    ) {
        let config = OfflineConfig::default();
        let mut player = PlayerState::new(last);
        player.set_heat(heat);
        let now = last + gap;
        catch_up(&mut player, rate, now, &config);
        let once = player.clone();
        let second = catch_up(&mut player, rate, now, &config);
        prop_assert!(second.is_empty());
        prop_assert_eq!(player, once);
    }

    /// Ascension always raises the multiplier by a tenth of the potential
    /// and leaves an empty fleet.
    #[test]
    fn ascension_scales_with_potential(credits in 10_000.0..10_000_000.0f64, fleet in arb_fleet()) {
        let mut player = PlayerState::new(0);
        player.credits = credits;
        let mut fleet = fleet;
        prop_assert!(progression::can_ascend(&player));
        let report = progression::ascend(&mut player, &mut fleet, AscensionBranch::Continue);
        prop_assert!((player.prestige_multiplier - (1.0 + report.potential * 0.1)).abs() < 1e-9);
        prop_assert!(report.potential >= 1.0);
        prop_assert_eq!(fleet.total_units(), 0);
        prop_assert_eq!(player.credits, 0.0);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// A rejected command leaves the record and the fleet untouched.
    #[test]
    fn rejected_commands_do_not_mutate(script in proptest::collection::vec(arb_command(), 1..40)) {
        let mut engine = started(engine_with_seed(5));
        engine.debug_grant_credits(2_000.0);
        for command in script {
            let (state, fleet) = (engine.state().clone(), engine.fleet().clone());
            if engine.execute(command).is_err() {
                prop_assert_eq!(engine.state(), &state);
                prop_assert_eq!(engine.fleet(), &fleet);
            }
            engine.advance(SECOND);
        }
    }

    /// Gauges stay in range through arbitrary play.
    #[test]
    fn gauges_stay_in_range(
        fleet in proptest::collection::vec((arb_equipment(), 1..6u32), 0..6),
        script in proptest::collection::vec(arb_command(), 0..30),
        seed in any::<u64>(),
    ) {
        let mut engine = started(engine_with_seed(seed));
        for (ty, count) in fleet {
            engine.debug_grant_equipment(ty, count);
        }
        for command in script {
            engine.submit(command);
            engine.advance(3 * SECOND);
            let p = engine.state();
            prop_assert!((0.0..=100.0).contains(&p.heat));
            prop_assert!((0.0..=100.0).contains(&p.integrity));
            prop_assert!(p.credits >= 0.0);
            prop_assert!(p.hashes >= 0.0);
            prop_assert!(p.staked >= 0.0);
            prop_assert!(p.prestige_multiplier >= 1.0);
        }
    }

    /// Same seed and script, same state hash.
    #[test]
    fn replays_are_deterministic(
        script in proptest::collection::vec(arb_command(), 0..30),
        seed in any::<u64>(),
    ) {
        let run = |script: &[Command]| {
            let mut engine = started(engine_with_seed(seed));
            engine.debug_grant_credits(5_000.0);
            for command in script {
                engine.submit(command.clone());
                engine.advance(2 * SECOND);
            }
            engine.state_hash()
        };
        prop_assert_eq!(run(&script), run(&script));
    }
}
