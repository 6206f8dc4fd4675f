//! Time-of-day traffic model.
//!
//! Trip durations are multiplied by an hourly factor: peak windows carry a
//! premium (> 1.0), late night a small discount, every other hour is 1.0.

use serde::{Deserialize, Serialize};

/// Smallest multiplier an off-peak window may apply.
pub const MAX_OFF_PEAK_DISCOUNT: f64 = 0.9;

/// Hours `[start_hour, end_hour)` sharing one multiplier. Windows may wrap
/// past midnight (`start_hour > end_hour`).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start_hour: u8,
    pub end_hour: u8,
    pub multiplier: f64,
}

impl TimeWindow {
    pub const fn new(start_hour: u8, end_hour: u8, multiplier: f64) -> Self {
        Self {
            start_hour,
            end_hour,
            multiplier,
        }
    }

    pub fn contains(&self, hour: u8) -> bool {
        if self.start_hour <= self.end_hour {
            (self.start_hour..self.end_hour).contains(&hour)
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

/// Hourly duration multipliers (index 0 = midnight).
#[derive(Clone, Debug, PartialEq)]
pub struct TrafficProfile {
    hourly_factors: [f64; 24],
    peak_hours: [bool; 24],
}

impl TrafficProfile {
    /// All factors 1.0.
    pub fn flat() -> Self {
        Self {
            hourly_factors: [1.0; 24],
            peak_hours: [false; 24],
        }
    }

    /// Indian metro pattern.
    ///
    /// - 08–11: 1.35 (morning peak)
    /// - 17–21: 1.45 (evening peak)
    /// - 23–05: 0.92 (night, light traffic)
    pub fn indian_metro() -> Self {
        Self::from_windows(
            &[TimeWindow::new(8, 11, 1.35), TimeWindow::new(17, 21, 1.45)],
            Some(TimeWindow::new(23, 5, 0.92)),
        )
    }

    /// Build from peak windows plus an optional off-peak discount window.
    /// Peak multipliers below 1.0 are raised to 1.0 and the off-peak
    /// multiplier is clamped to [`MAX_OFF_PEAK_DISCOUNT`, 1.0].
    pub fn from_windows(peaks: &[TimeWindow], off_peak: Option<TimeWindow>) -> Self {
        let mut profile = Self::flat();

        if let Some(window) = off_peak {
            let factor = window.multiplier.clamp(MAX_OFF_PEAK_DISCOUNT, 1.0);
            for hour in 0..24u8 {
                if window.contains(hour) {
                    profile.hourly_factors[hour as usize] = factor;
                }
            }
        }

        for window in peaks {
            let factor = window.multiplier.max(1.0);
            for hour in 0..24u8 {
                if window.contains(hour) {
                    profile.hourly_factors[hour as usize] = factor;
                    profile.peak_hours[hour as usize] = true;
                }
            }
        }

        profile
    }

    pub fn factor_at_hour(&self, hour: u8) -> f64 {
        self.hourly_factors[(hour % 24) as usize]
    }

    pub fn is_peak(&self, hour: u8) -> bool {
        self.peak_hours[(hour % 24) as usize]
    }
}

impl Default for TrafficProfile {
    fn default() -> Self {
        Self::indian_metro()
    }
}
