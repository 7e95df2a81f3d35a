//! Signal snapshot
//!
//! One tick's worth of inputs from both simulations. Reads that fail keep
//! the last-known value so a flaky collaborator never aborts a tick.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::collaborators::{AircraftSystems, FlightPlan, SimVariableProvider};
use crate::door::ExternalToggle;
use crate::error::Result;

/// Simulator variable names
pub mod vars {
    pub const COUATL_STARTED: &str = "FSDT_GSX_COUATL_STARTED";
    pub const REFUELING_STATE: &str = "FSDT_GSX_REFUELING_STATE";
    pub const CATERING_STATE: &str = "FSDT_GSX_CATERING_STATE";
    pub const BOARDING_STATE: &str = "FSDT_GSX_BOARDING_STATE";
    pub const DEBOARDING_STATE: &str = "FSDT_GSX_DEBOARDING_STATE";
    pub const DEPARTURE_STATE: &str = "FSDT_GSX_DEPARTURE_STATE";
    pub const JETWAY: &str = "FSDT_GSX_JETWAY";
    pub const JETWAY_OPERATION: &str = "FSDT_GSX_OPERATEJETWAYS_STATE";
    pub const STAIRS: &str = "FSDT_GSX_STAIRS";
    pub const STAIRS_OPERATION: &str = "FSDT_GSX_OPERATESTAIRS_STATE";
    pub const FUEL_HOSE_CONNECTED: &str = "FSDT_GSX_FUELHOSE_CONNECTED";
    pub const BYPASS_PIN: &str = "FSDT_GSX_BYPASS_PIN";
    pub const NUM_PASSENGERS: &str = "FSDT_GSX_NUMPASSENGERS";
    pub const BOARDING_PAX: &str = "FSDT_GSX_NUMPASSENGERS_BOARDING_TOTAL";
    pub const DEBOARDING_PAX: &str = "FSDT_GSX_NUMPASSENGERS_DEBOARDING_TOTAL";
    pub const BOARDING_CARGO: &str = "FSDT_GSX_BOARDING_CARGO_PERCENT";
    pub const DEBOARDING_CARGO: &str = "FSDT_GSX_DEBOARDING_CARGO_PERCENT";
    pub const SERVICE_1_TOGGLE: &str = "FSDT_GSX_AIRCRAFT_SERVICE_1_TOGGLE";
    pub const SERVICE_2_TOGGLE: &str = "FSDT_GSX_AIRCRAFT_SERVICE_2_TOGGLE";
    pub const CARGO_1_TOGGLE: &str = "FSDT_GSX_AIRCRAFT_CARGO_1_TOGGLE";
    pub const CARGO_2_TOGGLE: &str = "FSDT_GSX_AIRCRAFT_CARGO_2_TOGGLE";

    pub const BEACON: &str = "LIGHT BEACON";
    pub const APU_RUNNING: &str = "APU GENERATOR ACTIVE";
    pub const APU_BLEED: &str = "APU BLEED PRESSURE RECEIVED BY ENGINE";
    pub const EXT_POWER_AVAILABLE: &str = "EXTERNAL POWER AVAILABLE";
    pub const EXT_POWER_ON: &str = "EXTERNAL POWER ON";
    pub const PARKING_BRAKE: &str = "BRAKE PARKING POSITION";
    pub const ENGINES_RUNNING: &str = "GENERAL ENG COMBUSTION";
    pub const GROUND_SPEED: &str = "GROUND VELOCITY";
    pub const THROTTLE: &str = "GENERAL ENG THROTTLE LEVER POSITION";
    pub const ON_GROUND: &str = "SIM ON GROUND";
    pub const FREEZE_POSITION: &str = "FREEZE LATITUDE LONGITUDE";
}

/// Toggle variables in the order they appear in [`SimSnapshot::toggles`]
pub const TOGGLE_VARS: [(ExternalToggle, &str); 4] = [
    (ExternalToggle::Service(1), vars::SERVICE_1_TOGGLE),
    (ExternalToggle::Service(2), vars::SERVICE_2_TOGGLE),
    (ExternalToggle::Cargo(1), vars::CARGO_1_TOGGLE),
    (ExternalToggle::Cargo(2), vars::CARGO_2_TOGGLE),
];

/// Ground-services lifecycle sentinel
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum ServiceState {
    #[default]
    Unknown,
    Callable,
    NotAvailable,
    Bypassed,
    Requested,
    Active,
    Completed,
}

impl ServiceState {
    pub fn from_sentinel(value: i64) -> Self {
        match value {
            1 => ServiceState::Callable,
            2 => ServiceState::NotAvailable,
            3 => ServiceState::Bypassed,
            4 => ServiceState::Requested,
            5 => ServiceState::Active,
            6 => ServiceState::Completed,
            _ => ServiceState::Unknown,
        }
    }

    pub fn sentinel(self) -> i64 {
        match self {
            ServiceState::Unknown => 0,
            ServiceState::Callable => 1,
            ServiceState::NotAvailable => 2,
            ServiceState::Bypassed => 3,
            ServiceState::Requested => 4,
            ServiceState::Active => 5,
            ServiceState::Completed => 6,
        }
    }

    /// Requested or running
    pub fn is_underway(self) -> bool {
        matches!(self, ServiceState::Requested | ServiceState::Active)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimSnapshot {
    pub couatl_running: bool,
    pub refuel_state: ServiceState,
    pub catering_state: ServiceState,
    pub boarding_state: ServiceState,
    pub deboarding_state: ServiceState,
    pub departure_state: ServiceState,
    pub jetway_state: ServiceState,
    pub jetway_operation: ServiceState,
    pub stairs_state: ServiceState,
    pub stairs_operation: ServiceState,
    pub fuel_hose_connected: bool,
    pub bypass_pin_inserted: bool,
    /// Passenger count as the ground services believe it
    pub ground_pax: u32,
    pub boarding_pax: u32,
    pub deboarding_pax: u32,
    pub boarding_cargo_pct: u8,
    pub deboarding_cargo_pct: u8,
    pub toggles: [(ExternalToggle, bool); 4],

    pub beacon_on: bool,
    pub apu_running: bool,
    pub apu_bleed_on: bool,
    pub ext_power_available: bool,
    pub ext_power_on: bool,
    pub parking_brake_set: bool,
    pub engines_running: bool,
    pub on_ground: bool,
    pub ground_speed_kts: f64,
    /// Throttle lever position, 0-1
    pub throttle: f64,

    pub fuel_kg: f64,
    pub passengers_onboard: u32,
    pub cargo_pct: u8,
    pub flight_plan: Option<FlightPlan>,
}

impl Default for SimSnapshot {
    fn default() -> Self {
        Self {
            couatl_running: false,
            refuel_state: ServiceState::Unknown,
            catering_state: ServiceState::Unknown,
            boarding_state: ServiceState::Unknown,
            deboarding_state: ServiceState::Unknown,
            departure_state: ServiceState::Unknown,
            jetway_state: ServiceState::Unknown,
            jetway_operation: ServiceState::Unknown,
            stairs_state: ServiceState::Unknown,
            stairs_operation: ServiceState::Unknown,
            fuel_hose_connected: false,
            bypass_pin_inserted: false,
            ground_pax: 0,
            boarding_pax: 0,
            deboarding_pax: 0,
            boarding_cargo_pct: 0,
            deboarding_cargo_pct: 0,
            toggles: TOGGLE_VARS.map(|(toggle, _)| (toggle, false)),
            beacon_on: false,
            apu_running: false,
            apu_bleed_on: false,
            ext_power_available: false,
            ext_power_on: false,
            parking_brake_set: true,
            engines_running: false,
            on_ground: true,
            ground_speed_kts: 0.0,
            throttle: 0.0,
            fuel_kg: 0.0,
            passengers_onboard: 0,
            cargo_pct: 0,
            flight_plan: None,
        }
    }
}

/// Polls both simulations into a [`SimSnapshot`], keeping last-known values
#[derive(Debug, Default)]
pub struct SignalReader {
    last: SimSnapshot,
    failing: HashSet<&'static str>,
}

impl SignalReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> &SimSnapshot {
        &self.last
    }

    pub fn poll(
        &mut self,
        sim: &mut dyn SimVariableProvider,
        aircraft: &mut dyn AircraftSystems,
    ) -> &SimSnapshot {
        let s = &mut self.last;
        let mut r = Reads {
            sim,
            failing: &mut self.failing,
        };

        r.flag(vars::COUATL_STARTED, &mut s.couatl_running);
        r.state(vars::REFUELING_STATE, &mut s.refuel_state);
        r.state(vars::CATERING_STATE, &mut s.catering_state);
        r.state(vars::BOARDING_STATE, &mut s.boarding_state);
        r.state(vars::DEBOARDING_STATE, &mut s.deboarding_state);
        r.state(vars::DEPARTURE_STATE, &mut s.departure_state);
        r.state(vars::JETWAY, &mut s.jetway_state);
        r.state(vars::JETWAY_OPERATION, &mut s.jetway_operation);
        r.state(vars::STAIRS, &mut s.stairs_state);
        r.state(vars::STAIRS_OPERATION, &mut s.stairs_operation);
        r.flag(vars::FUEL_HOSE_CONNECTED, &mut s.fuel_hose_connected);
        r.flag(vars::BYPASS_PIN, &mut s.bypass_pin_inserted);
        r.count(vars::NUM_PASSENGERS, &mut s.ground_pax);
        r.count(vars::BOARDING_PAX, &mut s.boarding_pax);
        r.count(vars::DEBOARDING_PAX, &mut s.deboarding_pax);
        r.percent(vars::BOARDING_CARGO, &mut s.boarding_cargo_pct);
        r.percent(vars::DEBOARDING_CARGO, &mut s.deboarding_cargo_pct);
        for (slot, (_, name)) in s.toggles.iter_mut().zip(TOGGLE_VARS) {
            r.flag(name, &mut slot.1);
        }

        r.flag(vars::BEACON, &mut s.beacon_on);
        r.flag(vars::APU_RUNNING, &mut s.apu_running);
        r.flag(vars::APU_BLEED, &mut s.apu_bleed_on);
        r.flag(vars::EXT_POWER_AVAILABLE, &mut s.ext_power_available);
        r.flag(vars::EXT_POWER_ON, &mut s.ext_power_on);
        r.flag(vars::PARKING_BRAKE, &mut s.parking_brake_set);
        r.flag(vars::ENGINES_RUNNING, &mut s.engines_running);
        r.flag(vars::ON_GROUND, &mut s.on_ground);
        r.float(vars::GROUND_SPEED, &mut s.ground_speed_kts);
        r.float(vars::THROTTLE, &mut s.throttle);

        r.keep("aircraft.fuel", aircraft.fuel_kg(), &mut s.fuel_kg);
        r.keep("aircraft.passengers", aircraft.passengers(), &mut s.passengers_onboard);
        r.keep("aircraft.cargo", aircraft.cargo_percent(), &mut s.cargo_pct);
        r.keep("aircraft.flight_plan", aircraft.flight_plan(), &mut s.flight_plan);

        &self.last
    }
}

struct Reads<'a> {
    sim: &'a mut dyn SimVariableProvider,
    failing: &'a mut HashSet<&'static str>,
}

impl Reads<'_> {
    fn keep<T>(&mut self, name: &'static str, result: Result<T>, slot: &mut T) {
        match result {
            Ok(value) => {
                if self.failing.remove(name) {
                    debug!(variable = name, "read recovered");
                }
                *slot = value;
            }
            Err(e) => {
                if self.failing.insert(name) {
                    warn!(variable = name, "read failed, keeping last value: {e}");
                }
            }
        }
    }

    fn flag(&mut self, name: &'static str, slot: &mut bool) {
        let result = self.sim.read(name).map(|v| v.as_bool());
        self.keep(name, result, slot);
    }

    fn state(&mut self, name: &'static str, slot: &mut ServiceState) {
        let result = self
            .sim
            .read(name)
            .map(|v| ServiceState::from_sentinel(v.as_int()));
        self.keep(name, result, slot);
    }

    fn count(&mut self, name: &'static str, slot: &mut u32) {
        let result = self
            .sim
            .read(name)
            .map(|v| u32::try_from(v.as_int().max(0)).unwrap_or(u32::MAX));
        self.keep(name, result, slot);
    }

    fn percent(&mut self, name: &'static str, slot: &mut u8) {
        let result = self
            .sim
            .read(name)
            .map(|v| v.as_int().clamp(0, 100) as u8);
        self.keep(name, result, slot);
    }

    fn float(&mut self, name: &'static str, slot: &mut f64) {
        let result = self.sim.read(name).map(|v| v.as_float());
        self.keep(name, result, slot);
    }
}
