//! Typed engine events, the passive-listener bus, and bounded log rings.
//!
//! Handlers emit events while they run; the engine delivers them to
//! listeners after each task or command completes, so a listener always sees
//! the state the event describes. Kinds can be suppressed, in which case
//! they are neither buffered nor delivered.
//!
//! The user-visible terminal log and the news ticker are separate
//! [`RingLog`]s: fixed capacity, oldest entry dropped on overflow, iterated
//! most recent first.

use crate::chaos::ChaosKind;
use crate::faction::Faction;
use crate::fixed::Ticks;
use crate::id::{NarrativeId, TechId};
use crate::offline::OfflineReport;
use crate::progression::AscensionReport;
use crate::sim::TaskKind;
use crate::thermal::ThermalEvent;
use hashforge_power::PowerEvent;
use std::collections::VecDeque;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// Something observable happened inside the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    // -- Ticks --
    ProductionTick {
        rate: f64,
        hashes: f64,
        tick: Ticks,
    },
    HeatChanged {
        heat: f64,
        delta: f64,
        tick: Ticks,
    },
    Thermal {
        event: ThermalEvent,
        tick: Ticks,
    },
    Power(PowerEvent),
    OverclockChanged {
        enabled: bool,
        tick: Ticks,
    },
    MarketUpdated {
        headline: Option<String>,
        sell_rate: f64,
        tick: Ticks,
    },

    // -- Chaos --
    EncounterStarted {
        kind: ChaosKind,
        tick: Ticks,
    },
    EncounterResolved {
        kind: ChaosKind,
        tick: Ticks,
    },
    EncounterExpired {
        kind: ChaosKind,
        loss: f64,
        tick: Ticks,
    },

    // -- Narrative and progression --
    DilemmaPresented {
        id: NarrativeId,
        tick: Ticks,
    },
    DilemmaResolved {
        id: NarrativeId,
        option: usize,
        tick: Ticks,
    },
    StageAdvanced {
        stage: u32,
        tick: Ticks,
    },
    FactionChosen {
        faction: Faction,
        tick: Ticks,
    },
    TechUnlocked {
        id: TechId,
        tick: Ticks,
    },
    UploadProgressed {
        step: u32,
        total: u32,
        tick: Ticks,
    },
    AscensionCancelled {
        tick: Ticks,
    },
    Ascended {
        report: AscensionReport,
        tick: Ticks,
    },

    // -- Lifecycle --
    OfflineCredited {
        report: OfflineReport,
        tick: Ticks,
    },
    Autosaved {
        tick: Ticks,
    },
    PauseChanged {
        paused: bool,
        tick: Ticks,
    },
    TaskFailed {
        task: TaskKind,
        reason: String,
        tick: Ticks,
    },
    ActionRejected {
        reason: String,
        tick: Ticks,
    },
}

/// Discriminant tag for event types, used for subscription and suppression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ProductionTick,
    HeatChanged,
    Thermal,
    Power,
    OverclockChanged,
    MarketUpdated,
    EncounterStarted,
    EncounterResolved,
    EncounterExpired,
    DilemmaPresented,
    DilemmaResolved,
    StageAdvanced,
    FactionChosen,
    TechUnlocked,
    UploadProgressed,
    AscensionCancelled,
    Ascended,
    OfflineCredited,
    Autosaved,
    PauseChanged,
    TaskFailed,
    ActionRejected,
}

const EVENT_KIND_COUNT: usize = 22;

impl EngineEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            EngineEvent::ProductionTick { .. } => EventKind::ProductionTick,
            EngineEvent::HeatChanged { .. } => EventKind::HeatChanged,
            EngineEvent::Thermal { .. } => EventKind::Thermal,
            EngineEvent::Power(_) => EventKind::Power,
            EngineEvent::OverclockChanged { .. } => EventKind::OverclockChanged,
            EngineEvent::MarketUpdated { .. } => EventKind::MarketUpdated,
            EngineEvent::EncounterStarted { .. } => EventKind::EncounterStarted,
            EngineEvent::EncounterResolved { .. } => EventKind::EncounterResolved,
            EngineEvent::EncounterExpired { .. } => EventKind::EncounterExpired,
            EngineEvent::DilemmaPresented { .. } => EventKind::DilemmaPresented,
            EngineEvent::DilemmaResolved { .. } => EventKind::DilemmaResolved,
            EngineEvent::StageAdvanced { .. } => EventKind::StageAdvanced,
            EngineEvent::FactionChosen { .. } => EventKind::FactionChosen,
            EngineEvent::TechUnlocked { .. } => EventKind::TechUnlocked,
            EngineEvent::UploadProgressed { .. } => EventKind::UploadProgressed,
            EngineEvent::AscensionCancelled { .. } => EventKind::AscensionCancelled,
            EngineEvent::Ascended { .. } => EventKind::Ascended,
            EngineEvent::OfflineCredited { .. } => EventKind::OfflineCredited,
            EngineEvent::Autosaved { .. } => EventKind::Autosaved,
            EngineEvent::PauseChanged { .. } => EventKind::PauseChanged,
            EngineEvent::TaskFailed { .. } => EventKind::TaskFailed,
            EngineEvent::ActionRejected { .. } => EventKind::ActionRejected,
        }
    }
}

impl EventKind {
    fn index(self) -> usize {
        self as usize
    }
}

/// The user-visible terminal log.
pub type TerminalLog = RingLog<LogLine>;

// ---------------------------------------------------------------------------
// RingLog
// ---------------------------------------------------------------------------

/// Fixed-capacity log. When full, the oldest entry is dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct RingLog<T> {
    entries: VecDeque<T>,
    capacity: usize,
    total_written: u64,
}

impl<T> RingLog<T> {
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            total_written: 0,
        }
    }

    pub fn push(&mut self, entry: T) {
        if self.entries.len() == self.capacity {
            self.entries.pop_back();
        }
        self.entries.push_front(entry);
        self.total_written += 1;
    }

    /// Most recent first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&T> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries ever pushed, dropped ones included.
    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    /// Failures and losses.
    Alert,
}

/// One line of the in-game terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub tick: Ticks,
    pub level: LogLevel,
    pub text: String,
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// A passive listener receives events read-only.
pub type PassiveListener = Box<dyn FnMut(&EngineEvent)>;

/// Optional predicate that filters events for a listener.
pub type EventFilter = Box<dyn Fn(&EngineEvent) -> bool>;

struct ListenerEntry {
    listener: PassiveListener,
    filter: Option<EventFilter>,
}

pub struct EventBus {
    pending: Vec<EngineEvent>,
    listeners: Vec<Vec<ListenerEntry>>,
    suppressed: [bool; EVENT_KIND_COUNT],
    emitted: [u64; EVENT_KIND_COUNT],
    /// Recently delivered events, most recent first.
    history: RingLog<EngineEvent>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("pending", &self.pending)
            .field("suppressed", &self.suppressed)
            .field("emitted", &self.emitted)
            .finish_non_exhaustive()
    }
}

impl EventBus {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            pending: Vec::new(),
            listeners: (0..EVENT_KIND_COUNT).map(|_| Vec::new()).collect(),
            suppressed: [false; EVENT_KIND_COUNT],
            emitted: [0; EVENT_KIND_COUNT],
            history: RingLog::new(history_capacity),
        }
    }

    /// Suppressed kinds are dropped at emit time.
    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = true;
        self.pending.retain(|e| e.kind() != kind);
    }

    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        self.suppressed[kind.index()]
    }

    /// Buffer an event for the next delivery.
    pub fn emit(&mut self, event: EngineEvent) {
        let idx = event.kind().index();
        if self.suppressed[idx] {
            return;
        }
        self.emitted[idx] += 1;
        self.pending.push(event);
    }

    /// Register a listener for one kind. Listeners run in registration order.
    pub fn on_passive(&mut self, kind: EventKind, listener: PassiveListener) {
        self.on_passive_filtered(kind, None, listener);
    }

    pub fn on_passive_filtered(
        &mut self,
        kind: EventKind,
        filter: Option<EventFilter>,
        listener: PassiveListener,
    ) {
        self.listeners[kind.index()].push(ListenerEntry { listener, filter });
    }

    /// Deliver every buffered event, oldest first, then clear the buffer.
    pub fn deliver(&mut self) {
        for event in std::mem::take(&mut self.pending) {
            for entry in &mut self.listeners[event.kind().index()] {
                if let Some(filter) = &entry.filter
                    && !filter(&event)
                {
                    continue;
                }
                (entry.listener)(&event);
            }
            self.history.push(event);
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Events ever emitted for a kind.
    pub fn total_emitted(&self, kind: EventKind) -> u64 {
        self.emitted[kind.index()]
    }

    pub fn history(&self) -> &RingLog<EngineEvent> {
        &self.history
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn autosaved(tick: Ticks) -> EngineEvent {
        EngineEvent::Autosaved { tick }
    }

    #[test]
    fn ring_log_keeps_most_recent_first() {
        let mut log = RingLog::new(3);
        for i in 0..5 {
            log.push(i);
        }
        assert_eq!(log.iter().copied().collect::<Vec<_>>(), vec![4, 3, 2]);
        assert_eq!(log.latest(), Some(&4));
        assert_eq!(log.total_written(), 5);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn ring_log_zero_capacity_clamps() {
        let mut log = RingLog::new(0);
        log.push("a");
        log.push("b");
        assert_eq!(log.capacity(), 1);
        assert_eq!(log.latest(), Some(&"b"));
    }

    #[test]
    fn listeners_receive_only_their_kind() {
        let mut bus = EventBus::default();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        bus.on_passive(
            EventKind::Autosaved,
            Box::new(move |e| sink.borrow_mut().push(e.clone())),
        );
        bus.emit(autosaved(5));
        bus.emit(EngineEvent::PauseChanged { paused: true, tick: 6 });
        assert_eq!(bus.pending_count(), 2);
        bus.deliver();
        assert_eq!(*seen.borrow(), vec![autosaved(5)]);
        assert_eq!(bus.pending_count(), 0);
        assert_eq!(bus.history().len(), 2);
    }

    #[test]
    fn delivery_preserves_emit_order() {
        let mut bus = EventBus::default();
        let ticks = Rc::new(RefCell::new(Vec::new()));
        let sink = ticks.clone();
        bus.on_passive(
            EventKind::Autosaved,
            Box::new(move |e| {
                if let EngineEvent::Autosaved { tick } = e {
                    sink.borrow_mut().push(*tick);
                }
            }),
        );
        for t in [3, 1, 2] {
            bus.emit(autosaved(t));
        }
        bus.deliver();
        assert_eq!(*ticks.borrow(), vec![3, 1, 2]);
    }

    #[test]
    fn suppressed_kinds_are_dropped() {
        let mut bus = EventBus::default();
        bus.emit(autosaved(1));
        bus.suppress(EventKind::Autosaved);
        bus.emit(autosaved(2));
        assert!(bus.is_suppressed(EventKind::Autosaved));
        assert_eq!(bus.pending_count(), 0);
        assert_eq!(bus.total_emitted(EventKind::Autosaved), 1);
    }

    #[test]
    fn filters_skip_unwanted_events() {
        let mut bus = EventBus::default();
        let count = Rc::new(RefCell::new(0));
        let sink = count.clone();
        bus.on_passive_filtered(
            EventKind::Autosaved,
            Some(Box::new(|e| matches!(e, EngineEvent::Autosaved { tick } if *tick > 10))),
            Box::new(move |_| *sink.borrow_mut() += 1),
        );
        bus.emit(autosaved(5));
        bus.emit(autosaved(50));
        bus.deliver();
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn kind_matches_variant() {
        assert_eq!(autosaved(0).kind(), EventKind::Autosaved);
        assert_eq!(
            EngineEvent::Power(PowerEvent::BreakerReset { tick: 0 }).kind(),
            EventKind::Power
        );
        assert_eq!(EventKind::ActionRejected.index(), EVENT_KIND_COUNT - 1);
    }
}
