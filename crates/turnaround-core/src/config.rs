//! Turnaround configuration
//!
//! Injected into every component at construction. All waits are expressed
//! in poll ticks; the circuit breaker window is wall-clock.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Complete configuration for one coordinator instance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnaroundConfig {
    pub services: ServiceConfig,
    pub timing: TimingConfig,
    pub doors: DoorConfig,
    pub refuel: RefuelConfig,
    pub taxi: TaxiConfig,
    pub poll: PollConfig,
    pub menu: MenuConfig,
    /// Seed for the loadsheet delay RNG (`None` = seeded from the OS)
    pub seed: Option<u64>,
}

/// Which services run automatically
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Call the fuel truck. When off, catering, boarding and the final
    /// loadsheet go ahead unless somebody calls it by hand.
    pub auto_refuel: bool,
    pub call_catering: bool,
    /// Open cargo doors once catering completes, close them at full load
    pub open_cargo_doors: bool,
    pub auto_boarding: bool,
    /// Disconnect PCA on departure once the APU supplies bleed air,
    /// connect it on arrival
    pub auto_pca: bool,
    pub auto_jetway_stairs: bool,
    /// Never call stairs when a jetway is served
    pub jetway_only: bool,
    pub auto_remove_equipment: bool,
    pub auto_deboarding: bool,
    pub send_loadsheets: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            auto_refuel: true,
            call_catering: true,
            open_cargo_doors: true,
            auto_boarding: true,
            auto_pca: true,
            auto_jetway_stairs: true,
            jetway_only: false,
            auto_remove_equipment: true,
            auto_deboarding: true,
            send_loadsheets: true,
        }
    }
}

/// Tick counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Ticks between refuel (and catering) completion and the boarding call
    pub boarding_delay_ticks: u32,
    /// Final loadsheet is sent a random number of ticks in this range
    /// after loading completes
    pub loadsheet_delay_min_ticks: u32,
    pub loadsheet_delay_max_ticks: u32,
    /// Ticks after a service request during which an operator prompt is answered
    pub operator_prompt_ticks: u32,
    /// Ticks between the jetway and the stairs menu selection
    pub stairs_wait_ticks: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            boarding_delay_ticks: 90,
            loadsheet_delay_min_ticks: 90,
            loadsheet_delay_max_ticks: 150,
            operator_prompt_ticks: 10,
            stairs_wait_ticks: 5,
        }
    }
}

/// Door reconciliation and circuit breaker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DoorConfig {
    /// Changes allowed per door within one breaker window
    pub breaker_max_changes: u32,
    pub breaker_window_ms: u64,
    /// Ticks a door command may stay unconfirmed before it is re-sent
    pub settle_ticks: u32,
}

impl DoorConfig {
    pub fn breaker_window(&self) -> Duration {
        Duration::from_millis(self.breaker_window_ms)
    }
}

impl Default for DoorConfig {
    fn default() -> Self {
        Self {
            breaker_max_changes: 5,
            breaker_window_ms: 5_000,
            settle_ticks: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefuelConfig {
    /// Fuel transferred per active tick (kg)
    pub rate_kg_per_tick: f64,
}

impl Default for RefuelConfig {
    fn default() -> Self {
        Self {
            rate_kg_per_tick: 28.0,
        }
    }
}

/// Ground movement thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxiConfig {
    /// Ground speed above which the aircraft is considered taxiing (kts)
    pub taxi_speed_kts: f64,
    /// Throttle lever position above which thrust is considered applied (0-1)
    pub throttle_threshold: f64,
}

impl Default for TaxiConfig {
    fn default() -> Self {
        Self {
            taxi_speed_kts: 2.0,
            throttle_threshold: 0.1,
        }
    }
}

/// Poll interval per phase group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub ground_ms: u64,
    pub taxi_ms: u64,
    pub cruise_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            ground_ms: 1_000,
            taxi_ms: 2_000,
            cruise_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MenuConfig {
    /// Item selected when the operator prompt is showing
    pub operator_item: u8,
}

impl Default for MenuConfig {
    fn default() -> Self {
        Self { operator_item: 1 }
    }
}

impl TurnaroundConfig {
    /// Check for values that would stall or break a sequence
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.timing;
        if t.loadsheet_delay_min_ticks > t.loadsheet_delay_max_ticks {
            return Err(ConfigError::EmptyLoadsheetRange {
                min: t.loadsheet_delay_min_ticks,
                max: t.loadsheet_delay_max_ticks,
            });
        }
        if self.doors.breaker_window_ms == 0 {
            return Err(ConfigError::ZeroBreakerWindow);
        }
        if self.doors.breaker_max_changes == 0 {
            return Err(ConfigError::ZeroBreakerChanges);
        }
        for (name, ms) in [
            ("ground", self.poll.ground_ms),
            ("taxi", self.poll.taxi_ms),
            ("cruise", self.poll.cruise_ms),
        ] {
            if ms == 0 {
                return Err(ConfigError::ZeroPollInterval(name));
            }
        }
        if !(self.refuel.rate_kg_per_tick > 0.0) {
            return Err(ConfigError::InvalidRefuelRate(self.refuel.rate_kg_per_tick));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = TurnaroundConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.timing.boarding_delay_ticks, 90);
        assert_eq!(config.doors.breaker_max_changes, 5);
        assert_eq!(config.doors.breaker_window(), Duration::from_secs(5));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{ "services": { "auto_refuel": false }, "timing": { "boarding_delay_ticks": 30 } }"#;
        let config: TurnaroundConfig = serde_json::from_str(json).unwrap();

        assert!(!config.services.auto_refuel);
        assert!(config.services.call_catering);
        assert_eq!(config.timing.boarding_delay_ticks, 30);
        assert_eq!(config.timing.loadsheet_delay_max_ticks, 150);
    }

    #[test]
    fn test_validate_rejects_inconsistent_values() {
        let mut config = TurnaroundConfig::default();
        config.timing.loadsheet_delay_min_ticks = 200;
        assert_eq!(
            config.validate(),
            Err(ConfigError::EmptyLoadsheetRange { min: 200, max: 150 })
        );

        let mut config = TurnaroundConfig::default();
        config.doors.breaker_window_ms = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroBreakerWindow));

        let mut config = TurnaroundConfig::default();
        config.refuel.rate_kg_per_tick = f64::NAN;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidRefuelRate(_))));
    }
}
