//! Cooperative task scheduler on a logical millisecond clock.
//!
//! Every periodic loop is a [`RepeatingTask`]; one-shot delays (encounter
//! timeouts, upload steps) are cancellable timers in a slot map. The engine
//! pops one due item at a time and runs its handler to completion before
//! popping the next, so handlers never interleave.

use crate::chaos::ChaosKind;
use crate::fixed::Ticks;
use crate::id::TimerId;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// A periodic loop. Declaration order breaks ties between tasks due at the
/// same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Production,
    Thermal,
    Power,
    Market,
    Chaos,
    NarrativeFlavor,
    NarrativeDilemma,
    Autosave,
}

impl TaskKind {
    pub const ALL: [TaskKind; 8] = [
        TaskKind::Production,
        TaskKind::Thermal,
        TaskKind::Power,
        TaskKind::Market,
        TaskKind::Chaos,
        TaskKind::NarrativeFlavor,
        TaskKind::NarrativeDilemma,
        TaskKind::Autosave,
    ];
}

/// Cadence of one task: first run `warmup` after start, then every
/// `interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSchedule {
    pub interval: Ticks,
    pub warmup: Ticks,
}

impl TaskSchedule {
    pub const fn every(interval: Ticks) -> Self {
        Self {
            interval,
            warmup: interval,
        }
    }

    pub const fn with_warmup(interval: Ticks, warmup: Ticks) -> Self {
        Self { interval, warmup }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepeatingTask {
    pub kind: TaskKind,
    pub interval: Ticks,
    pub next_due: Ticks,
    pub runs: u64,
}

// ---------------------------------------------------------------------------
// Timers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    EncounterTimeout(ChaosKind),
    UploadStep,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timer {
    pub due: Ticks,
    pub kind: TimerKind,
    seq: u64,
}

/// The next thing to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Due {
    Task(TaskKind),
    Timer(TimerId, TimerKind),
}

/// What one `advance` call did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdvanceResult {
    /// Repeating-task runs dispatched.
    pub tasks_run: u64,
    pub timers_fired: u64,
    /// Handlers that returned an error and were skipped.
    pub failures: u64,
    /// Queued commands executed before the first task.
    pub commands_applied: usize,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct Scheduler {
    clock: Ticks,
    running: bool,
    tasks: Vec<RepeatingTask>,
    timers: SlotMap<TimerId, Timer>,
    next_seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current logical time.
    pub fn clock(&self) -> Ticks {
        self.clock
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Arm every task relative to the current clock. Restarting re-arms.
    pub fn start(&mut self, schedules: impl IntoIterator<Item = (TaskKind, TaskSchedule)>) {
        self.tasks = schedules
            .into_iter()
            .map(|(kind, s)| RepeatingTask {
                kind,
                interval: s.interval.max(1),
                next_due: self.clock + s.warmup,
                runs: 0,
            })
            .collect();
        self.tasks.sort_by_key(|t| t.kind);
        self.running = true;
    }

    /// Disarm every task and drop pending timers.
    pub fn stop(&mut self) {
        self.tasks.clear();
        self.timers.clear();
        self.running = false;
    }

    pub fn task(&self, kind: TaskKind) -> Option<&RepeatingTask> {
        self.tasks.iter().find(|t| t.kind == kind)
    }

    /// Fire `kind` once after `delay`.
    pub fn schedule_once(&mut self, delay: Ticks, kind: TimerKind) -> TimerId {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.timers.insert(Timer {
            due: self.clock + delay,
            kind,
            seq,
        })
    }

    /// Returns false if the timer already fired or was cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        self.timers.remove(id).is_some()
    }

    pub fn timer(&self, id: TimerId) -> Option<&Timer> {
        self.timers.get(id)
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Pop the earliest item due at or before `until`, moving the clock to
    /// its due time. Tasks win ties over timers; timers fire in the order
    /// they were scheduled.
    pub fn pop_due(&mut self, until: Ticks) -> Option<(Ticks, Due)> {
        if !self.running {
            return None;
        }
        let task = self
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.next_due <= until)
            .min_by_key(|(_, t)| (t.next_due, t.kind))
            .map(|(i, t)| (t.next_due, i));
        let timer = self
            .timers
            .iter()
            .filter(|(_, t)| t.due <= until)
            .min_by_key(|(_, t)| (t.due, t.seq))
            .map(|(id, t)| (t.due, id));

        let due = match (task, timer) {
            (Some((task_due, i)), Some((timer_due, _))) if task_due <= timer_due => {
                self.fire_task(i)
            }
            (Some((_, i)), None) => self.fire_task(i),
            (_, Some((_, id))) => self.fire_timer(id)?,
            (None, None) => return None,
        };
        Some((self.clock, due))
    }

    fn fire_task(&mut self, i: usize) -> Due {
        let task = &mut self.tasks[i];
        self.clock = self.clock.max(task.next_due);
        task.next_due += task.interval;
        task.runs += 1;
        Due::Task(task.kind)
    }

    fn fire_timer(&mut self, id: TimerId) -> Option<Due> {
        let timer = self.timers.remove(id)?;
        self.clock = self.clock.max(timer.due);
        Some(Due::Timer(id, timer.kind))
    }

    /// Move the clock forward with nothing due in between.
    pub fn advance_clock(&mut self, to: Ticks) {
        self.clock = self.clock.max(to);
    }
}

// ---------------------------------------------------------------------------
// State hash
// ---------------------------------------------------------------------------

/// FNV-1a digest of engine state for determinism checks. Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(pub u64);

impl StateHash {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self(Self::FNV_OFFSET)
    }

    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::FNV_PRIME);
        }
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write(&v.to_le_bytes());
    }

    /// Hashes the exact bit pattern.
    pub fn write_f64(&mut self, v: f64) {
        self.write(&v.to_bits().to_le_bytes());
    }

    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::{SECOND, secs};

    fn started(schedules: &[(TaskKind, TaskSchedule)]) -> Scheduler {
        let mut s = Scheduler::new();
        s.start(schedules.iter().copied());
        s
    }

    fn drain(s: &mut Scheduler, until: Ticks) -> Vec<(Ticks, Due)> {
        std::iter::from_fn(|| s.pop_due(until)).collect()
    }

    #[test]
    fn stopped_scheduler_fires_nothing() {
        let mut s = Scheduler::new();
        assert_eq!(s.pop_due(u64::MAX), None);
        assert!(!s.is_running());
    }

    #[test]
    fn warmup_then_interval() {
        let mut s = started(&[(TaskKind::Thermal, TaskSchedule::with_warmup(SECOND, 500))]);
        let fired: Vec<Ticks> = drain(&mut s, 2_600).into_iter().map(|(t, _)| t).collect();
        assert_eq!(fired, vec![500, 1_500, 2_500]);
        assert_eq!(s.task(TaskKind::Thermal).map(|t| t.runs), Some(3));
    }

    #[test]
    fn zero_warmup_fires_immediately() {
        let mut s = started(&[(TaskKind::Market, TaskSchedule::with_warmup(secs(45), 0))]);
        assert_eq!(s.pop_due(0), Some((0, Due::Task(TaskKind::Market))));
        assert_eq!(s.pop_due(44_999), None);
    }

    #[test]
    fn ties_follow_task_order() {
        let mut s = started(&[
            (TaskKind::Power, TaskSchedule::every(SECOND)),
            (TaskKind::Production, TaskSchedule::every(SECOND)),
        ]);
        let fired = drain(&mut s, SECOND);
        assert_eq!(
            fired,
            vec![
                (SECOND, Due::Task(TaskKind::Production)),
                (SECOND, Due::Task(TaskKind::Power)),
            ]
        );
    }

    #[test]
    fn timers_fire_in_time_order_and_clock_tracks() {
        let mut s = started(&[]);
        let late = s.schedule_once(300, TimerKind::UploadStep);
        let early = s.schedule_once(100, TimerKind::EncounterTimeout(ChaosKind::Breach));
        assert_eq!(
            s.pop_due(1_000),
            Some((100, Due::Timer(early, TimerKind::EncounterTimeout(ChaosKind::Breach))))
        );
        assert_eq!(s.clock(), 100);
        assert_eq!(s.pop_due(1_000), Some((300, Due::Timer(late, TimerKind::UploadStep))));
        assert_eq!(s.pending_timers(), 0);
    }

    #[test]
    fn cancelled_timers_never_fire() {
        let mut s = started(&[]);
        let id = s.schedule_once(100, TimerKind::UploadStep);
        assert!(s.cancel(id));
        assert!(!s.cancel(id));
        assert_eq!(s.pop_due(1_000), None);
    }

    #[test]
    fn tasks_beat_timers_on_ties() {
        let mut s = started(&[(TaskKind::Chaos, TaskSchedule::every(SECOND))]);
        let id = s.schedule_once(SECOND, TimerKind::UploadStep);
        assert_eq!(s.pop_due(SECOND), Some((SECOND, Due::Task(TaskKind::Chaos))));
        assert_eq!(s.pop_due(SECOND), Some((SECOND, Due::Timer(id, TimerKind::UploadStep))));
    }

    #[test]
    fn stop_drops_timers() {
        let mut s = started(&[(TaskKind::Chaos, TaskSchedule::every(SECOND))]);
        s.schedule_once(10, TimerKind::UploadStep);
        s.stop();
        assert_eq!(s.pending_timers(), 0);
        assert_eq!(s.pop_due(u64::MAX), None);
    }

    #[test]
    fn restart_rearms_from_current_clock() {
        let mut s = started(&[(TaskKind::Autosave, TaskSchedule::with_warmup(secs(10), secs(5)))]);
        drain(&mut s, 5_000);
        s.advance_clock(7_000);
        s.stop();
        s.start([(TaskKind::Autosave, TaskSchedule::with_warmup(secs(10), secs(5)))]);
        assert_eq!(s.pop_due(11_999), None);
        assert_eq!(s.pop_due(12_000), Some((12_000, Due::Task(TaskKind::Autosave))));
    }

    #[test]
    fn state_hash_is_order_sensitive() {
        let mut a = StateHash::new();
        a.write_u32(1);
        a.write_f64(2.0);
        let mut b = StateHash::new();
        b.write_f64(2.0);
        b.write_u32(1);
        assert_ne!(a.finish(), b.finish());
    }
}
