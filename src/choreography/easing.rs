use std::time::Duration;

/// Quadratic ease-in-out: accelerates through the first half, decelerates
/// through the second.
pub fn ease_in_out_quad(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        2.0 * t * t
    } else {
        -1.0 + (4.0 - 2.0 * t) * t
    }
}

/// Fraction of `duration` covered by `elapsed`, capped at 1.
pub fn progress(elapsed: Duration, duration: Duration) -> f64 {
    if duration.is_zero() {
        return 1.0;
    }
    (elapsed.as_secs_f64() / duration.as_secs_f64()).min(1.0)
}

/// Scroll offset at progress `t` of an animation from `start` to `end`,
/// rounded to whole pixels.
pub fn interpolate(start: f64, end: f64, t: f64) -> f64 {
    (start + (end - start) * ease_in_out_quad(t)).round()
}
