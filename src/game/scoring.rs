//! Point awards for correct answers

use std::time::Duration;

/// Points for a correct answer in a live round: the full base value,
/// whenever it arrives before the round closes.
pub fn award(base_points: u32) -> u32 {
    base_points
}

/// Solo-mode award, `floor(base * (1 + remaining / allowed))`.
///
/// `remaining` is clamped to `allowed`, so the result lies between `base`
/// and `2 * base`. A zero time allowance yields `base`.
pub fn time_decayed(base_points: u32, allowed: Duration, remaining: Duration) -> u32 {
    if allowed.is_zero() {
        return base_points;
    }
    let ratio = remaining.min(allowed).as_secs_f64() / allowed.as_secs_f64();
    (f64::from(base_points) * (1.0 + ratio)).floor() as u32
}
