use fixed::types::I32F32;

/// Q32.32 fixed-point. Used for probabilities so chance rolls compare
/// bit-exactly across platforms.
pub type Fixed64 = I32F32;

/// Milliseconds of simulated time. The atomic unit of the scheduler clock.
pub type Ticks = u64;

/// One second of simulated time.
pub const SECOND: Ticks = 1_000;

/// Convert whole seconds to ticks.
#[inline]
pub const fn secs(s: u64) -> Ticks {
    s * SECOND
}

/// Convert an f64 probability to Fixed64. Use only for configuration.
#[inline]
pub fn probability(p: f64) -> Fixed64 {
    Fixed64::from_num(p.clamp(0.0, 1.0))
}

/// Convert Fixed64 to f64 for display and scaling.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}
