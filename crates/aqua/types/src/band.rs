//! Optimal value bands for water-chemistry signals.

use serde::{Deserialize, Serialize};

use crate::SignalLevel;

/// Closed interval `[min, max]` considered optimal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub min: f64,
    pub max: f64,
}

impl Band {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn level(&self, value: f64) -> SignalLevel {
        if value < self.min {
            SignalLevel::Low
        } else if value > self.max {
            SignalLevel::High
        } else {
            SignalLevel::Ok
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.level(value) == SignalLevel::Ok
    }

    /// How far outside the band a value sits; zero inside it.
    pub fn distance_outside(&self, value: f64) -> f64 {
        if value < self.min {
            self.min - value
        } else if value > self.max {
            value - self.max
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_edges_are_inclusive() {
        let band = Band::new(29.0, 31.0);
        assert_eq!(band.level(29.0), SignalLevel::Ok);
        assert_eq!(band.level(31.0), SignalLevel::Ok);
        assert_eq!(band.level(28.9), SignalLevel::Low);
        assert_eq!(band.level(32.0), SignalLevel::High);
    }

    #[test]
    fn test_distance_outside() {
        let band = Band::new(6.5, 9.0);
        assert_eq!(band.distance_outside(7.0), 0.0);
        assert!((band.distance_outside(5.5) - 1.0).abs() < 1e-9);
        assert!((band.distance_outside(9.25) - 0.25).abs() < 1e-9);
    }
}
