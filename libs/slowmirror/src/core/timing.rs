// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

pub const MICROS_PER_SECOND: f64 = 1_000_000.0;

/// Seconds (possibly fractional, negative clamps to zero) to microseconds.
#[inline]
pub fn secs_to_us(secs: f64) -> u64 {
    if secs.is_nan() || secs <= 0.0 {
        return 0;
    }
    let us = (secs * MICROS_PER_SECOND).round();
    if us >= u64::MAX as f64 {
        u64::MAX
    } else {
        us as u64
    }
}

#[inline]
pub fn us_to_secs(us: u64) -> f64 {
    us as f64 / MICROS_PER_SECOND
}

/// Clamp to `[0, 1]`; NaN maps to 0.
#[inline]
pub fn clamp01(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.max(0.0).min(1.0)
    }
}

/// Signed difference `a - b` in seconds.
#[inline]
pub fn delta_secs(a_us: u64, b_us: u64) -> f64 {
    if a_us >= b_us {
        us_to_secs(a_us - b_us)
    } else {
        -us_to_secs(b_us - a_us)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secs_to_us() {
        assert_eq!(secs_to_us(0.0), 0);
        assert_eq!(secs_to_us(1.5), 1_500_000);
        assert_eq!(secs_to_us(-3.0), 0);
        assert_eq!(secs_to_us(f64::NAN), 0);
        assert_eq!(secs_to_us(f64::INFINITY), u64::MAX);
    }

    #[test]
    fn test_us_to_secs() {
        assert_eq!(us_to_secs(2_500_000), 2.5);
        assert_eq!(us_to_secs(0), 0.0);
    }

    #[test]
    fn test_clamp01() {
        assert_eq!(clamp01(-0.5), 0.0);
        assert_eq!(clamp01(0.25), 0.25);
        assert_eq!(clamp01(7.0), 1.0);
        assert_eq!(clamp01(f64::NAN), 0.0);
    }

    #[test]
    fn test_delta_secs_sign() {
        assert_eq!(delta_secs(3_000_000, 1_000_000), 2.0);
        assert_eq!(delta_secs(1_000_000, 3_000_000), -2.0);
    }
}
