//! Timestamp conventions shared by the camera and inertial streams.
//!
//! Both streams report time in integer nanoseconds on a common sensor clock.
//! Interval arithmetic needs signed values, so a single signed alias serves
//! frame timestamps and inertial timestamps alike.

/// Nanosecond timestamp on the shared sensor clock.
pub type Timestamp = i64;

/// Nanoseconds per second.
pub const NANOS_PER_SEC: f64 = 1.0e9;

/// Convert a nanosecond timestamp or interval to seconds.
pub fn ns_to_s(ns: Timestamp) -> f64 {
    ns as f64 / NANOS_PER_SEC
}

/// Convert seconds to the nearest nanosecond tick.
pub fn s_to_ns(seconds: f64) -> Timestamp {
    (seconds * NANOS_PER_SEC).round() as Timestamp
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_ns_to_s() {
        assert_abs_diff_eq!(ns_to_s(1_000_000_000), 1.0);
        assert_abs_diff_eq!(ns_to_s(-500_000_000), -0.5);
        assert_abs_diff_eq!(ns_to_s(1), 1.0e-9);
    }

    #[test]
    fn test_s_to_ns_round_trip() {
        for &ns in &[0_i64, 1, -1, 42, 1_000_000_007, -3_000_000_000] {
            assert_eq!(s_to_ns(ns_to_s(ns)), ns);
        }
    }
}
