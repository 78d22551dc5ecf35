//! Player transactions.
//!
//! Every command validates before it mutates, so a rejected command leaves
//! state untouched. Rejections are logged to the terminal and published as
//! [`EngineEvent::ActionRejected`]; successful commands are persisted.

use crate::chaos::{ChaosKind, TapOutcome};
use crate::command_queue::Command;
use crate::dirty::FieldGroup;
use crate::engine::Engine;
use crate::equipment::EquipmentType;
use crate::error::ActionError;
use crate::event::{EngineEvent, LogLevel};
use crate::id::{TechId, TimerId};
use crate::narrative::{self, Applied};
use crate::progression::{self, AscensionBranch, UploadProgress};
use crate::sim::TimerKind;
use crate::state::{MAX_INTEGRITY, Protocol};
use tracing::{debug, info, warn};

impl Engine {
    /// Run one command now and deliver the events it emitted.
    pub fn execute(&mut self, command: Command) -> Result<(), ActionError> {
        let name = command.name();
        let persist = !matches!(
            command,
            Command::Pause | Command::Resume | Command::Background { .. }
        );

        let result = self.apply(command);
        match &result {
            Ok(()) if persist => {
                if let Err(error) = self.persist() {
                    warn!(command = name, %error, "failed to persist command");
                    self.log(LogLevel::Alert, format!("Save failed: {error}"));
                }
            }
            Ok(()) => {}
            Err(error) => {
                info!(command = name, %error, "command rejected");
                self.log(LogLevel::Warning, format!("{name}: {error}"));
                self.emit(EngineEvent::ActionRejected {
                    reason: error.to_string(),
                    tick: self.clock(),
                });
            }
        }
        self.event_bus.deliver();
        result
    }

    fn apply(&mut self, command: Command) -> Result<(), ActionError> {
        match command {
            Command::BuyEquipment(ty) => self.buy(ty),
            Command::SellEquipment(ty) => self.sell(ty),
            Command::Train => self.train(),
            Command::Convert { hashes } => self.convert(hashes),
            Command::Stake { credits } => self.stake(credits),
            Command::Unstake { credits } => self.unstake(credits),
            Command::Purge => self.purge(),
            Command::Repair => self.repair(),
            Command::ResetBreaker => self.reset_breaker(),
            Command::ToggleOverclock => self.toggle_overclock(),
            Command::SetProtocol(protocol) => {
                self.set_protocol(protocol);
                Ok(())
            }
            Command::TapEncounter(kind) => self.tap_encounter(kind),
            Command::TapDiagnosticsCell(index) => self.tap_cell(index),
            Command::ResolveDilemma { option } => self.resolve_dilemma(option),
            Command::UnlockTech(id) => self.unlock(id),
            Command::ConfirmAscension(branch) => self.confirm_ascension(branch),
            Command::CancelAscension => self.cancel_ascension(),
            Command::Pause => {
                self.set_paused(true);
                Ok(())
            }
            Command::Resume => {
                self.set_paused(false);
                Ok(())
            }
            Command::Foreground { now } => {
                self.on_foreground(now);
                Ok(())
            }
            Command::Background { now } => {
                if let Err(error) = self.on_background(now) {
                    warn!(%error, "failed to persist on background");
                    self.log(LogLevel::Alert, format!("Save failed: {error}"));
                }
                Ok(())
            }
        }
    }

    // -----------------------------------------------------------------------
    // Economy
    // -----------------------------------------------------------------------

    fn buy(&mut self, ty: EquipmentType) -> Result<(), ActionError> {
        let spec = self.catalog.equipment(ty);
        let price = spec.price(self.fleet.count(ty));
        let name = spec.name.clone();
        if !self.player.try_spend_credits(price) {
            return Err(ActionError::InsufficientFunds {
                needed: price,
                available: self.player.credits,
            });
        }
        self.fleet.add(ty, 1);
        debug!(?ty, price, "bought equipment");
        self.log(LogLevel::Info, format!("Bought {name} for {price:.2} cr."));
        self.changes.mark_fleet();
        Ok(())
    }

    fn sell(&mut self, ty: EquipmentType) -> Result<(), ActionError> {
        let spec = self.catalog.equipment(ty);
        let owned = self.fleet.count(ty);
        let name = spec.name.clone();
        if owned == 0 {
            return Err(ActionError::invalid(format!("no {name} to sell")));
        }
        let refund = spec.refund(owned);
        self.fleet.remove_one(ty);
        self.player.deposit(refund);
        debug!(?ty, refund, "sold equipment");
        self.log(LogLevel::Info, format!("Sold {name} for {refund:.2} cr."));
        self.changes.mark_fleet();
        Ok(())
    }

    fn train(&mut self) -> Result<(), ActionError> {
        if self.session.thermal.is_locked_out() {
            return Err(ActionError::LockedOut);
        }
        self.player.add_hashes(self.player.prestige_multiplier);
        self.changes.mark(FieldGroup::Resources);
        Ok(())
    }

    fn convert(&mut self, hashes: f64) -> Result<(), ActionError> {
        if !(hashes > 0.0) {
            return Err(ActionError::invalid("convert a positive amount"));
        }
        if hashes > self.player.hashes {
            return Err(ActionError::InsufficientFunds {
                needed: hashes,
                available: self.player.hashes,
            });
        }
        let credits = hashes * self.session.market.sell_rate();
        self.player.add_hashes(-hashes);
        self.player.add_credits(credits);
        self.log(
            LogLevel::Info,
            format!("Sold {hashes:.0} hashes for {credits:.2} cr."),
        );
        self.changes.mark(FieldGroup::Resources);
        Ok(())
    }

    fn stake(&mut self, credits: f64) -> Result<(), ActionError> {
        if !(credits > 0.0) {
            return Err(ActionError::invalid("stake a positive amount"));
        }
        if !self.player.try_spend_credits(credits) {
            return Err(ActionError::InsufficientFunds {
                needed: credits,
                available: self.player.credits,
            });
        }
        self.player.staked += credits;
        self.log(LogLevel::Info, format!("Staked {credits:.2} cr."));
        self.changes.mark(FieldGroup::Resources);
        Ok(())
    }

    fn unstake(&mut self, credits: f64) -> Result<(), ActionError> {
        if !(credits > 0.0) {
            return Err(ActionError::invalid("unstake a positive amount"));
        }
        if credits > self.player.staked {
            return Err(ActionError::InsufficientFunds {
                needed: credits,
                available: self.player.staked,
            });
        }
        self.player.staked -= credits;
        self.player.deposit(credits);
        self.log(LogLevel::Info, format!("Unstaked {credits:.2} cr."));
        self.changes.mark(FieldGroup::Resources);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Rig control
    // -----------------------------------------------------------------------

    fn purge(&mut self) -> Result<(), ActionError> {
        let purge = &mut self.session.purge;
        if !purge.ready() {
            return Err(ActionError::OnCooldown {
                action: "purge",
                remaining: purge.cooldown_remaining,
            });
        }
        let config = self.config.purge;
        purge.start(config.exhaust_ticks, config.spike_ticks, config.cooldown_ticks);
        self.player.add_heat(-config.heat_drop);
        info!(heat = self.player.heat, "coolant purged");
        self.log(
            LogLevel::Info,
            format!("Coolant purged. Core at {:.0}%.", self.player.heat),
        );
        self.changes.mark(FieldGroup::Thermal);
        self.changes.mark(FieldGroup::Power);
        Ok(())
    }

    fn repair(&mut self) -> Result<(), ActionError> {
        let missing = MAX_INTEGRITY - self.player.integrity;
        if missing <= 0.0 {
            return Err(ActionError::invalid("integrity is already full"));
        }
        let cost = missing * self.config.repair_cost_per_point;
        if !self.player.try_spend_credits(cost) {
            return Err(ActionError::InsufficientFunds {
                needed: cost,
                available: self.player.credits,
            });
        }
        self.player.set_integrity(MAX_INTEGRITY);
        self.log(LogLevel::Info, format!("Repaired the rig for {cost:.2} cr."));
        self.changes.mark(FieldGroup::Thermal);
        self.changes.mark(FieldGroup::Resources);
        Ok(())
    }

    fn reset_breaker(&mut self) -> Result<(), ActionError> {
        let rates = self.rates();
        let event = self
            .session
            .breaker
            .reset(rates.power_draw, rates.grid_capacity, self.clock())?;
        info!(draw = rates.power_draw, "breaker reset");
        self.log(LogLevel::Info, "Breaker reset. Power restored.");
        self.emit(EngineEvent::Power(event));
        self.changes.mark(FieldGroup::Power);
        self.changes.mark(FieldGroup::Resources);
        Ok(())
    }

    fn toggle_overclock(&mut self) -> Result<(), ActionError> {
        let enabled = !self.session.overclock;
        if enabled && self.session.breaker.is_tripped() {
            return Err(ActionError::invalid("the breaker is tripped"));
        }
        self.session.overclock = enabled;
        self.log(
            LogLevel::Info,
            if enabled { "Overclock engaged." } else { "Overclock disengaged." },
        );
        self.emit(EngineEvent::OverclockChanged {
            enabled,
            tick: self.clock(),
        });
        self.changes.mark(FieldGroup::Power);
        self.changes.mark(FieldGroup::Thermal);
        Ok(())
    }

    fn set_protocol(&mut self, protocol: Protocol) {
        if self.player.protocol == protocol {
            return;
        }
        self.player.protocol = protocol;
        self.log(LogLevel::Info, format!("Protocol set to {protocol:?}."));
        self.changes.mark(FieldGroup::Resources);
        self.changes.mark(FieldGroup::Chaos);
    }

    fn set_paused(&mut self, paused: bool) {
        if self.session.paused == paused {
            return;
        }
        self.session.paused = paused;
        info!(paused, "pause changed");
        self.emit(EngineEvent::PauseChanged {
            paused,
            tick: self.clock(),
        });
    }

    // -----------------------------------------------------------------------
    // Encounters
    // -----------------------------------------------------------------------

    fn tap_encounter(&mut self, kind: ChaosKind) -> Result<(), ActionError> {
        if kind == ChaosKind::Diagnostics {
            return Err(ActionError::invalid("diagnostics are cleared cell by cell"));
        }
        match self.session.encounters.tap(kind) {
            TapOutcome::Inactive => Err(ActionError::EncounterInactive(kind)),
            TapOutcome::Resolved { timeout } => {
                self.resolve_encounter(kind, timeout);
                Ok(())
            }
            TapOutcome::Progress { .. } | TapOutcome::Nominal => {
                self.changes.mark(FieldGroup::Chaos);
                Ok(())
            }
        }
    }

    fn tap_cell(&mut self, index: u32) -> Result<(), ActionError> {
        match self.session.encounters.tap_cell(index) {
            TapOutcome::Inactive => Err(ActionError::EncounterInactive(ChaosKind::Diagnostics)),
            TapOutcome::Nominal => {
                self.log(LogLevel::Info, format!("Cell {index} nominal."));
                Ok(())
            }
            TapOutcome::Progress { remaining } => {
                self.log(
                    LogLevel::Info,
                    format!("Fault in cell {index} cleared. {remaining} to go."),
                );
                self.changes.mark(FieldGroup::Chaos);
                Ok(())
            }
            TapOutcome::Resolved { timeout } => {
                self.resolve_encounter(ChaosKind::Diagnostics, timeout);
                Ok(())
            }
        }
    }

    fn resolve_encounter(&mut self, kind: ChaosKind, timeout: TimerId) {
        self.scheduler.cancel(timeout);
        match kind {
            ChaosKind::Breach => self.log(LogLevel::Info, "Breach repelled. Wallet secure."),
            ChaosKind::Airdrop => {
                let chaos = &self.config.chaos;
                let bonus = chaos.airdrop_bonus(self.player.credits);
                let (multiplier, ticks) = (chaos.airdrop_multiplier, chaos.airdrop_boost_ticks);
                self.player.add_credits(bonus);
                self.session.encounters.start_airdrop_boost(ticks);
                self.log(
                    LogLevel::Info,
                    format!("Airdrop claimed: {bonus:.2} cr and x{multiplier:.0} hash rate for {ticks}s."),
                );
                self.changes.mark(FieldGroup::Resources);
            }
            ChaosKind::Diagnostics => {
                self.log(LogLevel::Info, "Diagnostics complete. All cells nominal.")
            }
            ChaosKind::Attack => self.log(LogLevel::Info, "Attack repelled. Stake intact."),
        }
        info!(kind = kind.label(), "encounter resolved");
        self.emit(EngineEvent::EncounterResolved {
            kind,
            tick: self.clock(),
        });
        self.changes.mark(FieldGroup::Chaos);
    }

    // -----------------------------------------------------------------------
    // Narrative and progression
    // -----------------------------------------------------------------------

    fn resolve_dilemma(&mut self, option: usize) -> Result<(), ActionError> {
        let Some(active) = &self.session.dilemma else {
            return Err(ActionError::NoActiveDilemma);
        };
        let Some(choice) = active.event.options.get(option) else {
            return Err(ActionError::UnknownOption(option));
        };
        let id = active.event.id;
        let label = choice.label.clone();
        let effects = choice.effects.clone();
        self.session.dilemma = None;

        self.log(LogLevel::Info, format!("> {label}"));
        for effect in &effects {
            let applied = narrative::apply_effect(effect, &mut self.player, &mut self.fleet);
            self.on_applied(applied);
        }
        info!(id = id.0, option, "dilemma resolved");
        self.emit(EngineEvent::DilemmaResolved {
            id,
            option,
            tick: self.clock(),
        });
        self.changes.mark(FieldGroup::Narrative);
        Ok(())
    }

    fn on_applied(&mut self, applied: Applied) {
        let tick = self.clock();
        match applied {
            Applied::Resources => self.changes.mark(FieldGroup::Resources),
            Applied::Thermal => self.changes.mark(FieldGroup::Thermal),
            Applied::Fleet => self.changes.mark_fleet(),
            Applied::Stage(stage) => {
                info!(stage, "story stage advanced");
                self.log(LogLevel::Info, format!("Stage {stage} reached."));
                self.emit(EngineEvent::StageAdvanced { stage, tick });
                self.changes.mark(FieldGroup::Narrative);
            }
            Applied::Faction(faction) => {
                info!(?faction, "faction chosen");
                self.log(LogLevel::Info, format!("Aligned with {faction:?}."));
                self.emit(EngineEvent::FactionChosen { faction, tick });
                self.changes.mark(FieldGroup::Progression);
            }
            Applied::Log(line) => self.log(LogLevel::Info, line),
            Applied::Ignored => {}
        }
    }

    fn unlock(&mut self, id: TechId) -> Result<(), ActionError> {
        let receipt = progression::unlock_tech(self.catalog.tech_tree(), &mut self.player, id)?;
        let name = self
            .catalog
            .tech_tree()
            .get(id)
            .map(|node| node.name.clone())
            .unwrap_or_default();
        info!(id = id.0, cost = receipt.cost, "tech unlocked");
        self.log(
            LogLevel::Info,
            format!("Unlocked {name} for {:.0} insight.", receipt.cost),
        );
        self.emit(EngineEvent::TechUnlocked {
            id,
            tick: self.clock(),
        });
        self.changes.mark(FieldGroup::Progression);
        self.changes.mark(FieldGroup::Resources);
        Ok(())
    }

    fn confirm_ascension(&mut self, branch: AscensionBranch) -> Result<(), ActionError> {
        if !self.scheduler.is_running() {
            return Err(ActionError::NotRunning);
        }
        if self.session.upload.is_some() {
            return Err(ActionError::invalid("an upload is already running"));
        }
        if !progression::can_ascend(&self.player) {
            return Err(ActionError::invalid(format!(
                "potential {:.2} is below the ascension threshold",
                progression::potential(self.player.credits)
            )));
        }
        let timer = self
            .scheduler
            .schedule_once(self.config.schedules.upload_step, TimerKind::UploadStep);
        self.session.upload = Some(UploadProgress::new(branch, timer));
        info!(?branch, "ascension upload started");
        self.log(LogLevel::Alert, "Uploading consciousness...");
        self.changes.mark(FieldGroup::Progression);
        Ok(())
    }

    fn cancel_ascension(&mut self) -> Result<(), ActionError> {
        let Some(upload) = self.session.upload.take() else {
            return Err(ActionError::invalid("no upload in progress"));
        };
        self.scheduler.cancel(upload.next_step);
        info!(step = upload.step, "ascension cancelled");
        self.log(LogLevel::Warning, "Upload aborted.");
        self.emit(EngineEvent::AscensionCancelled { tick: self.clock() });
        self.changes.mark(FieldGroup::Progression);
        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::faction::Faction;
    use crate::fixed::SECOND;
    use crate::id::NarrativeId;
    use crate::store::StateStore;
    use crate::test_utils::*;
    use hashforge_power::BreakerError;
    use hashforge_tech_tree::TechTreeError;

    #[test]
    fn rejected_purchase_changes_nothing_and_is_reported() {
        let mut engine = started(quiet_engine());
        let before = engine.state().clone();
        let err = engine
            .execute(Command::BuyEquipment(EquipmentType::RefurbishedGpu))
            .unwrap_err();
        assert_eq!(
            err,
            ActionError::InsufficientFunds {
                needed: 50.0,
                available: 0.0
            }
        );
        assert_eq!(engine.state(), &before);
        assert_eq!(engine.fleet().count(EquipmentType::RefurbishedGpu), 0);
        assert_eq!(engine.event_bus.total_emitted(EventKind::ActionRejected), 1);
        assert_eq!(engine.terminal().latest().map(|l| l.level), Some(LogLevel::Warning));
    }

    #[test]
    fn buying_spends_and_persists() {
        let (mut engine, store) = quiet_engine_with_store();
        engine.debug_grant_credits(100.0);
        engine
            .execute(Command::BuyEquipment(EquipmentType::RefurbishedGpu))
            .unwrap();
        assert_eq!(engine.state().credits, 50.0);
        assert_eq!(engine.fleet().count(EquipmentType::RefurbishedGpu), 1);
        let stored = store.get_equipment().unwrap();
        assert!(stored.contains(&(EquipmentType::RefurbishedGpu, 1)));
    }

    #[test]
    fn selling_refunds_half_without_counting_as_earnings() {
        let mut engine = quiet_engine_with(&[(EquipmentType::RefurbishedGpu, 1)]);
        engine
            .execute(Command::SellEquipment(EquipmentType::RefurbishedGpu))
            .unwrap();
        assert_eq!(engine.state().credits, 25.0);
        assert_eq!(engine.state().lifetime_credits, 0.0);
        assert!(engine
            .execute(Command::SellEquipment(EquipmentType::RefurbishedGpu))
            .is_err());
    }

    #[test]
    fn train_adds_prestige_scaled_hash() {
        let mut engine = quiet_engine();
        engine.player.prestige_multiplier = 1.5;
        engine.execute(Command::Train).unwrap();
        assert_eq!(engine.state().hashes, 1.5);
    }

    #[test]
    fn convert_uses_the_sell_rate() {
        let mut engine = quiet_engine();
        engine.player.hashes = 100.0;
        let rate = engine.session().market.sell_rate();
        engine.execute(Command::Convert { hashes: 40.0 }).unwrap();
        assert_eq!(engine.state().hashes, 60.0);
        assert!((engine.state().credits - 40.0 * rate).abs() < 1e-9);
        assert!(matches!(
            engine.execute(Command::Convert { hashes: 61.0 }),
            Err(ActionError::InsufficientFunds { .. })
        ));
        assert!(engine.execute(Command::Convert { hashes: 0.0 }).is_err());
    }

    #[test]
    fn stake_and_unstake_move_credits() {
        let mut engine = quiet_engine();
        engine.debug_grant_credits(100.0);
        engine.execute(Command::Stake { credits: 80.0 }).unwrap();
        assert_eq!(engine.state().credits, 20.0);
        assert_eq!(engine.state().staked, 80.0);
        assert!(engine.execute(Command::Unstake { credits: 81.0 }).is_err());
        engine.execute(Command::Unstake { credits: 30.0 }).unwrap();
        assert_eq!(engine.state().staked, 50.0);
        assert_eq!(engine.state().credits, 50.0);
    }

    #[test]
    fn staking_pays_once_a_minute() {
        let mut engine = started(quiet_engine());
        engine.debug_grant_credits(10_000.0);
        engine.execute(Command::Stake { credits: 10_000.0 }).unwrap();
        engine.advance(60 * SECOND);
        assert!((engine.state().credits - 5.0).abs() < 1e-9);
    }

    #[test]
    fn purge_drops_heat_then_cools_down() {
        let mut engine = started(quiet_engine());
        engine.debug_set_heat(70.0);
        engine.execute(Command::Purge).unwrap();
        assert_eq!(engine.state().heat, 30.0);
        assert!(engine.session().purge.exhaust_active());
        assert!(matches!(
            engine.execute(Command::Purge),
            Err(ActionError::OnCooldown { action: "purge", remaining: 60 })
        ));
        engine.advance(60 * SECOND);
        assert!(engine.session().purge.ready());
        engine.execute(Command::Purge).unwrap();
    }

    #[test]
    fn repair_charges_per_missing_point() {
        let mut engine = quiet_engine();
        engine.player.set_integrity(70.0);
        assert!(matches!(
            engine.execute(Command::Repair),
            Err(ActionError::InsufficientFunds { .. })
        ));
        engine.debug_grant_credits(500.0);
        engine.execute(Command::Repair).unwrap();
        assert_eq!(engine.state().integrity, 100.0);
        assert_eq!(engine.state().credits, 200.0);
        assert!(engine.execute(Command::Repair).is_err());
    }

    #[test]
    fn breaker_trips_forces_overclock_off_and_resets_when_load_fits() {
        let mut engine = started(quiet_engine_with(&[(EquipmentType::GamingRig, 5)]));
        engine.execute(Command::ToggleOverclock).unwrap();
        // 5 rigs at 18 kW, overclocked: 157.5 kW on a 100 kW grid.
        engine.advance(SECOND);
        assert!(engine.session().breaker.is_tripped());
        assert!(!engine.session().overclock);
        assert_eq!(engine.rates().production, 0.0);
        assert!(engine.execute(Command::ToggleOverclock).is_err());

        let bill = engine.state().power_bill;
        engine.advance(5 * SECOND);
        assert_eq!(engine.state().power_bill, bill);

        // 90 kW fits.
        engine.execute(Command::ResetBreaker).unwrap();
        assert!(!engine.session().breaker.is_tripped());
        assert_eq!(
            engine.execute(Command::ResetBreaker),
            Err(ActionError::Breaker(BreakerError::NotTripped))
        );
    }

    #[test]
    fn overloaded_reset_is_rejected() {
        let mut engine = started(quiet_engine_with(&[(EquipmentType::GamingRig, 6)]));
        engine.advance(SECOND);
        assert!(engine.session().breaker.is_tripped());
        assert!(matches!(
            engine.execute(Command::ResetBreaker),
            Err(ActionError::Breaker(BreakerError::Overloaded { .. }))
        ));
        assert!(engine.session().breaker.is_tripped());
    }

    #[test]
    fn tapping_out_a_breach_cancels_its_penalty() {
        let mut engine = started(quiet_engine());
        engine.debug_grant_credits(1_000.0);
        engine.debug_trigger_encounter(ChaosKind::Breach);
        for _ in 0..10 {
            engine.execute(Command::TapEncounter(ChaosKind::Breach)).unwrap();
        }
        assert!(!engine.session().encounters.is_active(ChaosKind::Breach));
        assert_eq!(
            engine.execute(Command::TapEncounter(ChaosKind::Breach)),
            Err(ActionError::EncounterInactive(ChaosKind::Breach))
        );
        engine.advance(20 * SECOND);
        assert_eq!(engine.state().credits, 1_000.0);
        assert_eq!(engine.event_bus.total_emitted(EventKind::EncounterExpired), 0);
    }

    #[test]
    fn airdrop_claim_pays_and_boosts() {
        let mut engine = started(quiet_engine_with(&[(EquipmentType::RefurbishedGpu, 1)]));
        engine.debug_trigger_encounter(ChaosKind::Airdrop);
        engine.execute(Command::TapEncounter(ChaosKind::Airdrop)).unwrap();
        assert_eq!(engine.state().credits, 50.0);
        assert_eq!(engine.rates().production, 2.0);
    }

    #[test]
    fn diagnostics_clear_cell_by_cell() {
        let mut engine = started(quiet_engine_with(&[(EquipmentType::RefurbishedGpu, 2)]));
        engine.debug_trigger_encounter(ChaosKind::Diagnostics);
        assert_eq!(engine.rates().production, 1.0);
        assert!(engine.execute(Command::TapEncounter(ChaosKind::Diagnostics)).is_err());

        let faulty: Vec<u32> = engine.session().encounters.faulty_cells().iter().copied().collect();
        let nominal = (0..9).find(|c| !faulty.contains(c)).unwrap();
        engine.execute(Command::TapDiagnosticsCell(nominal)).unwrap();
        assert_eq!(engine.session().encounters.faulty_cells().len(), 3);

        for cell in faulty {
            engine.execute(Command::TapDiagnosticsCell(cell)).unwrap();
        }
        assert!(!engine.session().encounters.diagnostics_active());
        assert_eq!(engine.rates().production, 2.0);
    }

    #[test]
    fn unknown_option_leaves_the_dilemma_in_place() {
        let mut engine = started(quiet_engine());
        engine.debug_force_dilemma(NarrativeId(3)).unwrap();
        assert_eq!(
            engine.execute(Command::ResolveDilemma { option: 9 }),
            Err(ActionError::UnknownOption(9))
        );
        assert!(engine.session().dilemma.is_some());
        assert_eq!(
            quiet_engine().execute(Command::ResolveDilemma { option: 0 }),
            Err(ActionError::NoActiveDilemma)
        );
    }

    #[test]
    fn pool_invitation_sets_the_faction() {
        let mut engine = started(quiet_engine());
        engine.debug_force_dilemma(NarrativeId(3)).unwrap();
        engine.execute(Command::ResolveDilemma { option: 0 }).unwrap();
        assert_eq!(engine.state().faction, Faction::Corporate);
        assert!(engine.session().dilemma.is_none());
        assert_eq!(engine.event_bus.total_emitted(EventKind::FactionChosen), 1);
    }

    #[test]
    fn tech_unlock_spends_insight() {
        let mut engine = quiet_engine();
        assert!(matches!(
            engine.execute(Command::UnlockTech(TechId(1))),
            Err(ActionError::Tech(TechTreeError::InsufficientInsight { .. }))
        ));
        engine.player.add_insight(1.0);
        engine.execute(Command::UnlockTech(TechId(1))).unwrap();
        assert_eq!(engine.state().insight, 0.0);
        assert!(engine.state().unlocked_tech.contains(&TechId(1)));
    }

    #[test]
    fn ascension_upload_completes_after_ten_steps() {
        let mut engine = started(quiet_engine_with(&[(EquipmentType::GamingRig, 2)]));
        assert!(engine
            .execute(Command::ConfirmAscension(AscensionBranch::Continue))
            .is_err());
        engine.debug_grant_credits(10_000.0);
        engine
            .execute(Command::ConfirmAscension(AscensionBranch::Cypherpunk))
            .unwrap();
        engine.advance(4 * SECOND);
        assert_eq!(engine.metrics().upload_percent, Some(80.0));
        engine.advance(SECOND);

        let p = engine.state();
        assert_eq!(p.ascensions, 1);
        assert_eq!(p.credits, 0.0);
        assert_eq!(p.story_stage, 2);
        assert_eq!(p.faction, Faction::Cypherpunk);
        assert!((p.prestige_multiplier - 1.1).abs() < 1e-9);
        assert!((p.insight - 1.0).abs() < 1e-9);
        assert_eq!(engine.fleet().total_units(), 0);
        assert!(engine.session().upload.is_none());
    }

    #[test]
    fn cancelled_upload_never_lands() {
        let mut engine = started(quiet_engine());
        engine.debug_grant_credits(10_000.0);
        engine
            .execute(Command::ConfirmAscension(AscensionBranch::Continue))
            .unwrap();
        engine.advance(2 * SECOND);
        engine.execute(Command::CancelAscension).unwrap();
        engine.advance(10 * SECOND);
        assert_eq!(engine.state().ascensions, 0);
        assert_eq!(engine.state().credits, 10_000.0);
        assert!(engine.execute(Command::CancelAscension).is_err());
    }

    #[test]
    fn queued_commands_run_at_next_advance() {
        let mut engine = started(quiet_engine());
        engine.debug_grant_credits(100.0);
        engine.submit(Command::BuyEquipment(EquipmentType::RefurbishedGpu));
        assert_eq!(engine.fleet().count(EquipmentType::RefurbishedGpu), 0);
        let result = engine.advance(SECOND);
        assert_eq!(result.commands_applied, 1);
        assert_eq!(engine.fleet().count(EquipmentType::RefurbishedGpu), 1);
        assert_eq!(engine.state().hashes, 1.0);
    }
}
