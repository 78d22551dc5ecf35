//! The simulation engine: owns the player record, the fleet and the session
//! state, and runs every periodic loop on one logical clock.
//!
//! # Dispatch
//!
//! Each `advance(dt)`:
//! 1. **Commands** -- execute everything queued with `submit`, in order
//! 2. **Tasks and timers** -- pop the earliest due item up to `clock + dt`,
//!    run its handler to completion, deliver the events it emitted
//! 3. **Bookkeeping** -- move the clock to `clock + dt`
//!
//! A handler that returns a [`TickError`] is logged and skipped; the loop
//! never stops on an error. Because every handler takes `&mut self`, at most
//! one of them touches state at a time.

use crate::catalog::Catalog;
use crate::chaos::{ChaosKind, roll_encounters};
use crate::command_queue::{Command, CommandQueue};
use crate::config::EngineConfig;
use crate::dirty::{ChangeTracker, FieldGroup};
use crate::equipment::{EquipmentType, Fleet};
use crate::error::{ActionError, TickError};
use crate::event::{EngineEvent, EventBus, EventKind, LogLevel, LogLine, RingLog, TerminalLog};
use crate::faction::{Faction, FactionPerks};
use crate::fixed::{SECOND, Ticks, probability};
use crate::id::{NarrativeId, TimerId};
use crate::narrative::{self, ActiveDilemma, NarrativeEvent, RollContext};
use crate::offline::{self, OfflineReport};
use crate::progression::{self, AscensionBranch};
use crate::rates::{Modifiers, RateReport};
use crate::rng::SimRng;
use crate::sim::{AdvanceResult, Due, Scheduler, StateHash, TaskKind, TimerKind};
use crate::state::{PlayerState, Protocol, SessionState};
use crate::store::{StateStore, StoreError, StoreListener};
use crate::thermal::{PurgeState, ThermalEvent, ThermalStatus};
use hashforge_power::{BillingMeter, PowerEvent};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Every value a front end displays, read in one call.
#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub clock: Ticks,
    pub hashes: f64,
    pub credits: f64,
    pub staked: f64,
    pub heat: f64,
    pub power_bill: f64,
    pub integrity: f64,
    pub prestige_multiplier: f64,
    pub insight: f64,
    pub story_stage: u32,
    pub faction: Faction,
    pub protocol: Protocol,
    pub ascensions: u32,
    pub rates: RateReport,
    pub sell_rate: f64,
    pub headline: Option<String>,
    pub thermal_status: ThermalStatus,
    pub breaker_tripped: bool,
    pub overclock: bool,
    pub paused: bool,
    pub purge: PurgeState,
    pub active_encounters: Vec<ChaosKind>,
    pub airdrop_boost_remaining: u32,
    pub dilemma: Option<NarrativeId>,
    /// Percent complete of a running ascension upload.
    pub upload_percent: Option<f64>,
    pub potential: f64,
    pub can_ascend: bool,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct Engine {
    pub(crate) config: EngineConfig,
    pub(crate) catalog: Box<dyn Catalog>,
    pub(crate) store: Box<dyn StateStore>,

    pub(crate) player: PlayerState,
    pub(crate) fleet: Fleet,
    pub(crate) session: SessionState,

    pub(crate) scheduler: Scheduler,
    pub(crate) rng: SimRng,

    /// Typed event bus. Listeners run after each task or command.
    pub event_bus: EventBus,
    pub(crate) changes: ChangeTracker,
    pub(crate) commands: CommandQueue,

    /// Tasks whose next run fails (debug hook).
    faults: BTreeSet<TaskKind>,
    /// The record was created by this engine and has never been synced.
    fresh: bool,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("clock", &self.scheduler.clock())
            .field("running", &self.scheduler.is_running())
            .field("player", &self.player)
            .field("fleet", &self.fleet)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Load the player record and fleet from `store`. On first run a fresh
    /// record with every equipment type at zero is created and persisted.
    pub fn new(
        config: EngineConfig,
        catalog: impl Catalog + 'static,
        store: impl StateStore + 'static,
    ) -> Result<Self, StoreError> {
        let mut store: Box<dyn StateStore> = Box::new(store);
        let (player, fleet, fresh) = match store.get()? {
            Some(mut player) => {
                player.normalize();
                let fleet = Fleet::from_rows(store.get_equipment()?);
                debug!(stage = player.story_stage, "loaded player record");
                (player, fleet, false)
            }
            None => {
                let player = PlayerState::new(0);
                let fleet = Fleet::new();
                store.put(&player)?;
                store.put_fleet(&fleet.rows())?;
                info!("created player record");
                (player, fleet, true)
            }
        };

        let meter = BillingMeter::new(config.price_per_kw_second, config.settlement_period);
        Ok(Self {
            session: SessionState::new(meter, config.news_capacity, config.terminal_capacity),
            scheduler: Scheduler::new(),
            rng: SimRng::new(config.seed),
            event_bus: EventBus::new(config.event_history),
            changes: ChangeTracker::new(),
            commands: CommandQueue::with_max_history(config.command_history),
            catalog: Box::new(catalog),
            store,
            player,
            fleet,
            config,
            faults: BTreeSet::new(),
            fresh,
        })
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Arm every task and credit time spent away since the last sync. `now`
    /// is wall-clock seconds. Starting a running engine does nothing.
    pub fn start(&mut self, now: u64) -> OfflineReport {
        if self.scheduler.is_running() {
            return OfflineReport::default();
        }
        if std::mem::take(&mut self.fresh) {
            self.player.last_sync = now;
        }
        self.scheduler.start(self.config.schedules.all());
        info!(clock = self.clock(), "engine started");
        let report = self.on_foreground(now);
        self.event_bus.deliver();
        report
    }

    /// Disarm every task, drop pending encounters and uploads, and persist.
    pub fn stop(&mut self) -> Result<(), StoreError> {
        if !self.scheduler.is_running() {
            return Ok(());
        }
        self.session.encounters.clear();
        self.session.upload = None;
        self.scheduler.stop();
        info!(clock = self.clock(), "engine stopped");
        self.persist()
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Run everything due in the next `dt` milliseconds.
    pub fn advance(&mut self, dt: Ticks) -> AdvanceResult {
        let mut result = AdvanceResult::default();
        if !self.scheduler.is_running() {
            return result;
        }
        let until = self.scheduler.clock() + dt;

        let commands = self.commands.drain(self.scheduler.clock());
        result.commands_applied = commands.len();
        for command in commands {
            // Rejections are already logged and published.
            let _ = self.execute(command);
        }

        while let Some((_, due)) = self.scheduler.pop_due(until) {
            match due {
                Due::Task(kind) => {
                    result.tasks_run += 1;
                    if let Err(error) = self.run_task(kind) {
                        result.failures += 1;
                        self.report_failure(kind, error);
                    }
                }
                Due::Timer(id, kind) => {
                    result.timers_fired += 1;
                    self.run_timer(id, kind);
                }
            }
            self.event_bus.deliver();
        }

        self.scheduler.advance_clock(until);
        result
    }

    /// Queue a command for the start of the next `advance`.
    pub fn submit(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn submit_batch(&mut self, commands: impl IntoIterator<Item = Command>) {
        self.commands.push_batch(commands);
    }

    /// The app came back to the foreground at `now` (wall-clock seconds).
    pub fn on_foreground(&mut self, now: u64) -> OfflineReport {
        let rate = self.rates().production;
        let report = offline::catch_up(&mut self.player, rate, now, &self.config.offline);
        if !report.is_empty() {
            info!(
                elapsed = report.elapsed_secs,
                hashes = report.hashes_earned,
                cooled = report.heat_cooled,
                "offline earnings credited"
            );
            self.log(
                LogLevel::Info,
                format!(
                    "Welcome back. {:.0} hashes mined over {}s offline.",
                    report.hashes_earned, report.elapsed_secs
                ),
            );
            self.emit(EngineEvent::OfflineCredited {
                report,
                tick: self.clock(),
            });
            self.changes.mark(FieldGroup::Resources);
            self.changes.mark(FieldGroup::Thermal);
        }
        report
    }

    /// The app is going to the background at `now`. Syncs and persists.
    pub fn on_background(&mut self, now: u64) -> Result<(), StoreError> {
        self.player.last_sync = now.max(self.player.last_sync);
        self.persist()
    }

    // -----------------------------------------------------------------------
    // Observables
    // -----------------------------------------------------------------------

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &dyn Catalog {
        self.catalog.as_ref()
    }

    pub fn clock(&self) -> Ticks {
        self.scheduler.clock()
    }

    pub fn state(&self) -> &PlayerState {
        &self.player
    }

    pub fn fleet(&self) -> &Fleet {
        &self.fleet
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn terminal(&self) -> &TerminalLog {
        &self.session.terminal
    }

    pub fn news(&self) -> &RingLog<String> {
        &self.session.news
    }

    /// Commands drained from the queue, if history is enabled.
    pub fn command_history(&self) -> &[(Ticks, Command)] {
        self.commands.history()
    }

    /// Register a passive listener for one event kind.
    pub fn on_event(&mut self, kind: EventKind, listener: impl FnMut(&EngineEvent) + 'static) {
        self.event_bus.on_passive(kind, Box::new(listener));
    }

    pub fn subscribe_store(&mut self, listener: StoreListener) {
        self.store.subscribe(listener);
    }

    /// Field groups changed since the last call.
    pub fn take_changes(&mut self) -> BTreeSet<FieldGroup> {
        self.changes.take()
    }

    pub fn perks(&self) -> FactionPerks {
        self.catalog.perks().get(self.player.faction)
    }

    /// Everything besides the fleet that currently bends a rate.
    pub fn modifiers(&self) -> Modifiers {
        let s = &self.session;
        Modifiers {
            perks: self.perks(),
            overclock: s.overclock,
            protocol: self.player.protocol,
            tech_bonus: self
                .catalog
                .tech_tree()
                .production_bonus(&self.player.unlocked_tech),
            diagnostics_active: s.encounters.diagnostics_active(),
            airdrop_multiplier: if s.encounters.airdrop_boost_active() {
                self.config.chaos.airdrop_multiplier
            } else {
                1.0
            },
            news_multiplier: s.market.production_multiplier,
            prestige_multiplier: self.player.prestige_multiplier,
            breaker_tripped: s.breaker.is_tripped(),
            purge_exhaust: s.purge.exhaust_active(),
            purge_spike: s.purge.spike_active(),
            heat: self.player.heat,
        }
    }

    pub fn rates(&self) -> RateReport {
        RateReport::compute(&self.fleet, self.catalog.equipment_table(), &self.modifiers())
    }

    pub fn metrics(&self) -> Metrics {
        let p = &self.player;
        let s = &self.session;
        Metrics {
            clock: self.clock(),
            hashes: p.hashes,
            credits: p.credits,
            staked: p.staked,
            heat: p.heat,
            power_bill: p.power_bill,
            integrity: p.integrity,
            prestige_multiplier: p.prestige_multiplier,
            insight: p.insight,
            story_stage: p.story_stage,
            faction: p.faction,
            protocol: p.protocol,
            ascensions: p.ascensions,
            rates: self.rates(),
            sell_rate: s.market.sell_rate(),
            headline: s.market.headline.clone(),
            thermal_status: s.thermal.status(),
            breaker_tripped: s.breaker.is_tripped(),
            overclock: s.overclock,
            paused: s.paused,
            purge: s.purge,
            active_encounters: s.encounters.active_kinds(),
            airdrop_boost_remaining: s.encounters.airdrop_boost_remaining(),
            dilemma: s.dilemma.as_ref().map(|d| d.event.id),
            upload_percent: s.upload.as_ref().map(|u| u.percent()),
            potential: progression::potential(p.credits),
            can_ascend: progression::can_ascend(p),
        }
    }

    /// Digest of the persisted state, the clock and the rng position.
    pub fn state_hash(&self) -> u64 {
        let p = &self.player;
        let mut h = StateHash::new();
        h.write_u64(self.clock());
        for v in [
            p.hashes,
            p.credits,
            p.staked,
            p.heat,
            p.power_bill,
            p.integrity,
            p.prestige_multiplier,
            p.insight,
            p.lifetime_credits,
        ] {
            h.write_f64(v);
        }
        h.write_u32(p.story_stage);
        h.write_u32(p.ascensions);
        h.write_u32(p.faction as u32);
        h.write_u32(p.protocol as u32);
        for id in &p.unlocked_tech {
            h.write_u32(id.0);
        }
        for id in &p.triggered_events {
            h.write_u32(id.0);
        }
        for (ty, count) in self.fleet.rows() {
            h.write_u32(ty as u32);
            h.write_u32(count);
        }
        h.write_u64(self.rng.state());
        h.finish()
    }

    // -----------------------------------------------------------------------
    // Debug hooks
    // -----------------------------------------------------------------------

    pub fn debug_set_heat(&mut self, heat: f64) {
        self.player.set_heat(heat);
        self.changes.mark(FieldGroup::Thermal);
    }

    pub fn debug_grant_credits(&mut self, credits: f64) {
        self.player.add_credits(credits);
        self.changes.mark(FieldGroup::Resources);
    }

    pub fn debug_grant_equipment(&mut self, ty: EquipmentType, count: u32) {
        self.fleet.add(ty, count);
        self.changes.mark_fleet();
    }

    /// Start `kind` now. Returns false if it is already active.
    pub fn debug_trigger_encounter(&mut self, kind: ChaosKind) -> bool {
        if self.session.encounters.is_active(kind) {
            return false;
        }
        self.start_encounter(kind);
        self.event_bus.deliver();
        true
    }

    /// Present a catalog event regardless of eligibility.
    pub fn debug_force_dilemma(&mut self, id: NarrativeId) -> Result<(), ActionError> {
        if self.session.dilemma.is_some() {
            return Err(ActionError::invalid("a dilemma is already waiting"));
        }
        let event = self
            .catalog
            .narrative_event(id)
            .cloned()
            .ok_or_else(|| ActionError::invalid(format!("no narrative event {}", id.0)))?;
        self.present_dilemma(event);
        self.event_bus.deliver();
        Ok(())
    }

    /// Make the next run of `task` fail.
    pub fn debug_inject_fault(&mut self, task: TaskKind) {
        self.faults.insert(task);
    }

    // -----------------------------------------------------------------------
    // Shared helpers
    // -----------------------------------------------------------------------

    pub(crate) fn emit(&mut self, event: EngineEvent) {
        self.event_bus.emit(event);
    }

    /// Append a line to the user-visible terminal.
    pub(crate) fn log(&mut self, level: LogLevel, text: impl Into<String>) {
        let line = LogLine {
            tick: self.scheduler.clock(),
            level,
            text: text.into(),
        };
        self.session.terminal.push(line);
    }

    pub(crate) fn persist(&mut self) -> Result<(), StoreError> {
        self.store.put(&self.player)?;
        self.store.put_fleet(&self.fleet.rows())
    }

    fn report_failure(&mut self, task: TaskKind, error: TickError) {
        warn!(?task, %error, "task failed; continuing");
        self.log(LogLevel::Alert, format!("{task:?} loop error: {error}"));
        self.emit(EngineEvent::TaskFailed {
            task,
            reason: error.to_string(),
            tick: self.clock(),
        });
    }

    pub(crate) fn start_encounter(&mut self, kind: ChaosKind) {
        let timer = self.scheduler.schedule_once(
            self.config.chaos.timeout(kind),
            TimerKind::EncounterTimeout(kind),
        );
        self.session
            .encounters
            .activate(kind, &self.config.chaos, timer, &mut self.rng);
        let line = match kind {
            ChaosKind::Breach => "BREACH DETECTED. Tap to lock down the wallet.",
            ChaosKind::Airdrop => "Airdrop incoming. Tap to claim it.",
            ChaosKind::Diagnostics => "Hardware fault. Find the failing cells.",
            ChaosKind::Attack => "51% attack underway. Tap to defend your stake.",
        };
        self.log(LogLevel::Alert, line);
        info!(kind = kind.label(), "encounter started");
        self.emit(EngineEvent::EncounterStarted {
            kind,
            tick: self.clock(),
        });
        self.changes.mark(FieldGroup::Chaos);
    }

    pub(crate) fn present_dilemma(&mut self, event: NarrativeEvent) {
        let tick = self.clock();
        let id = event.id;
        if event.one_time {
            self.player.triggered_events.insert(id);
        }
        info!(id = id.0, title = %event.title, "dilemma presented");
        self.log(LogLevel::Warning, format!("INCOMING: {}", event.title));
        self.session.dilemma = Some(ActiveDilemma {
            event,
            presented_at: tick,
        });
        self.emit(EngineEvent::DilemmaPresented { id, tick });
        self.changes.mark(FieldGroup::Narrative);
    }

    fn reevaluate_stage(&mut self) {
        if let Some(stage) = narrative::evaluate_stage(&self.player, &self.fleet)
            && self.player.advance_stage(stage)
        {
            info!(stage, "story stage advanced");
            self.log(LogLevel::Info, format!("Stage {stage} reached."));
            self.emit(EngineEvent::StageAdvanced {
                stage,
                tick: self.clock(),
            });
            self.changes.mark(FieldGroup::Narrative);
        }
    }

    // -----------------------------------------------------------------------
    // Tasks
    // -----------------------------------------------------------------------

    fn run_task(&mut self, kind: TaskKind) -> Result<(), TickError> {
        if self.faults.remove(&kind) {
            return Err(TickError::InjectedFault(kind));
        }
        match kind {
            TaskKind::Production => self.run_production(),
            TaskKind::Thermal => self.run_thermal(),
            TaskKind::Power => self.run_power(),
            TaskKind::Market => self.run_market(),
            TaskKind::Chaos => self.run_chaos(),
            TaskKind::NarrativeFlavor => self.run_flavor(),
            TaskKind::NarrativeDilemma => self.run_dilemma(),
            TaskKind::Autosave => self.run_autosave(),
        }
    }

    fn run_production(&mut self) -> Result<(), TickError> {
        let rates = self.rates();
        self.session.last_rates = rates;
        if self.session.paused || self.session.thermal.is_locked_out() {
            return Ok(());
        }
        self.player.add_hashes(rates.production);
        debug!(rate = rates.production, hashes = self.player.hashes, "production tick");
        self.emit(EngineEvent::ProductionTick {
            rate: rates.production,
            hashes: self.player.hashes,
            tick: self.clock(),
        });
        self.changes.mark(FieldGroup::Resources);
        Ok(())
    }

    fn run_thermal(&mut self) -> Result<(), TickError> {
        if self.session.paused {
            return Ok(());
        }
        let tick = self.clock();
        let rates = self.rates();
        let before = self.player.heat;
        self.player.add_heat(rates.heat_percent_change);
        let delta = self.player.heat - before;
        if delta != 0.0 {
            self.emit(EngineEvent::HeatChanged {
                heat: self.player.heat,
                delta,
                tick,
            });
            self.changes.mark(FieldGroup::Thermal);
        }

        if self.session.purge.tick() {
            self.log(LogLevel::Info, "Purge exhaust cleared.");
            self.changes.mark(FieldGroup::Thermal);
        }
        if self.session.encounters.tick_airdrop_boost() {
            self.log(LogLevel::Info, "Airdrop boost expired.");
            self.changes.mark(FieldGroup::Chaos);
        }

        let perks = self.perks();
        let events = self.session.thermal.check(
            &mut self.player,
            &mut self.fleet,
            self.catalog.equipment_table(),
            &perks,
            &mut self.rng,
        );
        let mut fleet_changed = false;
        for event in events {
            fleet_changed |= self.on_thermal_event(&event);
            self.emit(EngineEvent::Thermal { event, tick });
        }
        if fleet_changed {
            self.persist()?;
        }
        Ok(())
    }

    /// Log one failure transition. Returns true if equipment was destroyed.
    fn on_thermal_event(&mut self, event: &ThermalEvent) -> bool {
        self.changes.mark(FieldGroup::Thermal);
        match event {
            ThermalEvent::EnteredCritical { heat } => {
                info!(heat, "integrity critical");
                self.log(
                    LogLevel::Alert,
                    format!("CRITICAL: core at {heat:.0}%. Integrity failing."),
                );
            }
            ThermalEvent::IntegrityDamaged { integrity, .. } => {
                debug!(integrity, "integrity damaged");
            }
            ThermalEvent::Recovered { .. } => {
                self.log(LogLevel::Info, "Temperature back under control.");
            }
            ThermalEvent::Meltdown { cause, destroyed } => {
                warn!(?cause, ?destroyed, "meltdown");
                match destroyed {
                    Some(ty) => {
                        let name = self.catalog.equipment(*ty).name.clone();
                        self.log(LogLevel::Alert, format!("MELTDOWN. One {name} is slag."));
                        self.changes.mark_fleet();
                        return true;
                    }
                    None => self.log(LogLevel::Alert, "MELTDOWN. Nothing left to burn."),
                }
            }
            ThermalEvent::LockoutStarted { ticks } => {
                self.log(LogLevel::Alert, format!("Rig locked out for {ticks}s."));
            }
            ThermalEvent::LockoutEnded => {
                info!("lockout ended");
                self.log(LogLevel::Info, "Lockout lifted. Rig back online.");
            }
        }
        false
    }

    fn run_power(&mut self) -> Result<(), TickError> {
        // Both cadences keep counting while paused; what falls due waits
        // for resume.
        self.session.settlement_due |= self.session.meter.tick();
        self.session.yield_due |= self.count_stake_tick();
        if self.session.paused {
            return Ok(());
        }
        let tick = self.clock();
        let rates = self.rates();
        let save_chance = probability(self.perks().breaker_save_chance);
        let breaker_event = {
            let rng = &mut self.rng;
            self.session
                .breaker
                .check(rates.power_draw, rates.grid_capacity, tick, || {
                    rng.chance(save_chance)
                })
        };
        if let Some(event) = breaker_event {
            self.on_breaker_event(&event);
            self.emit(EngineEvent::Power(event));
            self.changes.mark(FieldGroup::Power);
        }

        if !self.session.breaker.is_tripped() {
            self.session
                .meter
                .accrue(&mut self.player.power_bill, rates.billed_kw());
            self.changes.mark(FieldGroup::Power);
        }

        if std::mem::take(&mut self.session.yield_due) {
            self.pay_staking_yield();
        }

        if std::mem::take(&mut self.session.settlement_due)
            && let Some(event) =
                BillingMeter::settle(&mut self.player.power_bill, &mut self.player.credits, tick)
        {
            match &event {
                PowerEvent::BillPaid { amount, .. } => {
                    info!(amount, "power bill paid");
                    self.log(LogLevel::Info, format!("Paid {amount:.2} cr to the utility."));
                }
                PowerEvent::BillUnpaid {
                    owed, available, ..
                } => {
                    warn!(owed, available, "power bill unpaid");
                    self.log(
                        LogLevel::Warning,
                        format!("Power bill unpaid: {owed:.2} cr owed, {available:.2} cr on hand."),
                    );
                }
                _ => {}
            }
            self.emit(EngineEvent::Power(event));
            self.changes.mark(FieldGroup::Resources);
            self.changes.mark(FieldGroup::Power);
        }
        Ok(())
    }

    fn on_breaker_event(&mut self, event: &PowerEvent) {
        match event {
            PowerEvent::BreakerTripped { draw, capacity, .. } => {
                warn!(draw, capacity, "breaker tripped");
                self.log(
                    LogLevel::Alert,
                    format!("BREAKER TRIPPED: {draw:.0} kW on a {capacity:.0} kW grid."),
                );
                if self.session.overclock {
                    self.session.overclock = false;
                    self.emit(EngineEvent::OverclockChanged {
                        enabled: false,
                        tick: self.clock(),
                    });
                }
            }
            PowerEvent::SurgeAbsorbed { draw, .. } => {
                self.log(
                    LogLevel::Warning,
                    format!("Surge absorbed at {draw:.0} kW. The breaker held."),
                );
            }
            _ => {}
        }
    }

    /// Count one power tick. Returns true once per minute of ticks.
    fn count_stake_tick(&mut self) -> bool {
        let interval = self.config.schedules.power.interval.max(1);
        self.session.stake_ticks += 1;
        if u64::from(self.session.stake_ticks) * interval < 60 * SECOND {
            return false;
        }
        self.session.stake_ticks = 0;
        true
    }

    fn pay_staking_yield(&mut self) {
        let payout = self.player.staked * self.config.staking_yield_per_minute;
        if payout > 0.0 {
            debug!(payout, "staking yield");
            self.player.add_credits(payout);
            self.changes.mark(FieldGroup::Resources);
        }
    }

    fn run_market(&mut self) -> Result<(), TickError> {
        if self.session.paused {
            return Ok(());
        }
        let perks = self.perks();
        let headline = self
            .session
            .market
            .roll(self.catalog.headlines(), &perks, &mut self.rng);
        if let Some(text) = &headline {
            self.session.news.push(text.clone());
            self.changes.mark(FieldGroup::Narrative);
        }
        let sell_rate = self.session.market.sell_rate();
        debug!(sell_rate, ?headline, "market rolled");
        self.emit(EngineEvent::MarketUpdated {
            headline,
            sell_rate,
            tick: self.clock(),
        });
        self.changes.mark(FieldGroup::Market);
        Ok(())
    }

    fn run_chaos(&mut self) -> Result<(), TickError> {
        if self.session.paused {
            return Ok(());
        }
        let perks = self.perks();
        let kinds = roll_encounters(
            &self.session.encounters,
            &self.config.chaos,
            self.player.protocol,
            &perks,
            &mut self.rng,
        );
        for kind in kinds {
            self.start_encounter(kind);
        }
        Ok(())
    }

    fn run_flavor(&mut self) -> Result<(), TickError> {
        if self.session.paused {
            return Ok(());
        }
        let stage = self.player.story_stage;
        if !self.session.flavor.tick(stage) || !self.rng.chance(self.config.flavor_chance) {
            return Ok(());
        }
        let line = self.rng.pick(self.catalog.flavor_lines(stage)).cloned();
        if let Some(line) = line {
            self.log(LogLevel::Info, line);
            self.changes.mark(FieldGroup::Narrative);
        }
        Ok(())
    }

    fn run_dilemma(&mut self) -> Result<(), TickError> {
        let s = &self.session;
        if s.paused
            || s.dilemma.is_some()
            || s.encounters.is_active(ChaosKind::Breach)
            || s.upload.is_some()
        {
            return Ok(());
        }
        let candidate = self
            .catalog
            .roll_candidate(&RollContext::of(&self.player), &mut self.rng);
        if let Some(event) = candidate {
            self.present_dilemma(event);
        }
        Ok(())
    }

    fn run_autosave(&mut self) -> Result<(), TickError> {
        self.reevaluate_stage();
        self.persist()?;
        debug!(clock = self.clock(), "autosaved");
        self.emit(EngineEvent::Autosaved { tick: self.clock() });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Timers
    // -----------------------------------------------------------------------

    fn run_timer(&mut self, id: TimerId, kind: TimerKind) {
        match kind {
            TimerKind::EncounterTimeout(chaos) => self.on_encounter_timeout(chaos),
            TimerKind::UploadStep => self.on_upload_step(id),
        }
    }

    fn on_encounter_timeout(&mut self, kind: ChaosKind) {
        if !self.session.encounters.is_active(kind) {
            return;
        }
        // Countdowns freeze while paused.
        if self.session.paused {
            let timer = self
                .scheduler
                .schedule_once(SECOND, TimerKind::EncounterTimeout(kind));
            self.session.encounters.retime(kind, timer);
            return;
        }
        self.session.encounters.expire(kind);

        let chaos = &self.config.chaos;
        let loss = match kind {
            ChaosKind::Breach => {
                let security = self
                    .catalog
                    .tech_tree()
                    .security_bonus(&self.player.unlocked_tech);
                chaos.breach_loss(self.player.credits, security)
            }
            ChaosKind::Airdrop => 0.0,
            ChaosKind::Diagnostics => self.player.hashes * chaos.diagnostics_hash_loss,
            ChaosKind::Attack => self.player.staked * chaos.attack_confiscation,
        };
        match kind {
            ChaosKind::Breach => {
                self.player.add_credits(-loss);
                self.log(LogLevel::Alert, format!("Breach succeeded. {loss:.2} cr stolen."));
            }
            ChaosKind::Airdrop => self.log(LogLevel::Info, "The airdrop drifted away."),
            ChaosKind::Diagnostics => {
                self.player.add_hashes(-loss);
                self.log(
                    LogLevel::Alert,
                    format!("Faults went unresolved. {loss:.0} hashes corrupted."),
                );
            }
            ChaosKind::Attack => {
                self.player.staked = (self.player.staked - loss).max(0.0);
                self.log(
                    LogLevel::Alert,
                    format!("Attack succeeded. {loss:.2} cr of stake confiscated."),
                );
            }
        }
        info!(kind = kind.label(), loss, "encounter expired");
        self.emit(EngineEvent::EncounterExpired {
            kind,
            loss,
            tick: self.clock(),
        });
        self.changes.mark(FieldGroup::Chaos);
        self.changes.mark(FieldGroup::Resources);
    }

    fn on_upload_step(&mut self, id: TimerId) {
        let Some(upload) = self.session.upload.as_mut() else {
            return;
        };
        if upload.next_step != id {
            return;
        }
        let done = upload.advance();
        let (step, total, branch) = (upload.step, upload.total_steps, upload.branch);
        self.emit(EngineEvent::UploadProgressed {
            step,
            total,
            tick: self.clock(),
        });
        self.changes.mark(FieldGroup::Progression);

        if done {
            self.session.upload = None;
            self.complete_ascension(branch);
            return;
        }
        let next = self
            .scheduler
            .schedule_once(self.config.schedules.upload_step, TimerKind::UploadStep);
        if let Some(upload) = self.session.upload.as_mut() {
            upload.next_step = next;
        }
    }

    fn complete_ascension(&mut self, branch: AscensionBranch) {
        let report = progression::ascend(&mut self.player, &mut self.fleet, branch);
        for timer in self.session.encounters.clear() {
            self.scheduler.cancel(timer);
        }
        self.session.dilemma = None;
        self.session.overclock = false;
        self.session.breaker.force_close();
        self.session.thermal.reset();
        self.session.purge = PurgeState::default();
        self.session.stake_ticks = 0;
        self.session.yield_due = false;

        info!(?branch, potential = report.potential, "ascended");
        self.log(
            LogLevel::Alert,
            format!(
                "Upload complete. Re-instantiated at x{:.2}.",
                self.player.prestige_multiplier
            ),
        );
        self.emit(EngineEvent::Ascended {
            report,
            tick: self.clock(),
        });
        self.changes.mark_all();
        self.changes.mark_fleet();
        if let Err(error) = self.persist() {
            warn!(%error, "failed to persist ascension");
            self.log(LogLevel::Alert, format!("Save failed: {error}"));
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
