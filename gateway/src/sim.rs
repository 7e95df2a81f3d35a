//! Scripted World
//!
//! Drives the in-memory collaborators through repeated legs so the gateway
//! can run without a simulator attached. Ground services answer menu
//! selections; the aircraft boards, pushes back, flies a short hop, parks
//! and deboards, then the next flight plan is loaded.

use tracing::{debug, info};
use uuid::Uuid;

use turnaround_core::collaborators::memory::MemoryEnvironment;
use turnaround_core::signals::vars;
use turnaround_core::{FlightPlan, LoadsheetKind, MenuItem, ServiceState, SimValue};

const PAX: u32 = 168;
const TARGET_FUEL_KG: f64 = 5_400.0;
const INITIAL_FUEL_KG: f64 = 2_000.0;
const BURN_KG_PER_TICK: f64 = 100.0;

const CATERING_TICKS: u32 = 8;
const BOARDING_PAX_PER_TICK: u32 = 12;
const DEBOARDING_PAX_PER_TICK: u32 = 15;
const CARGO_PCT_PER_TICK: u8 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    AtGate,
    Pushback { ticks: u32 },
    TaxiOut { ticks: u32 },
    Airborne { ticks: u32 },
    TaxiIn { ticks: u32 },
    Parked { ticks: u32 },
}

/// Progress of a pax/cargo service
#[derive(Debug, Clone, Copy)]
struct Loading {
    pax: u32,
    cargo_pct: u8,
}

pub struct ScriptedWorld {
    pub env: MemoryEnvironment,
    leg: u32,
    stage: Stage,
    menu_seen: usize,
    catering: Option<u32>,
    boarding: Option<Loading>,
    deboarding: Option<Loading>,
}

impl ScriptedWorld {
    pub fn new() -> Self {
        let mut world = Self {
            env: MemoryEnvironment::new(),
            leg: 0,
            stage: Stage::AtGate,
            menu_seen: 0,
            catering: None,
            boarding: None,
            deboarding: None,
        };
        world.restart();
        world
    }

    pub fn leg(&self) -> u32 {
        self.leg
    }

    /// Start over at the gate with a fresh first leg
    pub fn restart(&mut self) {
        self.env = MemoryEnvironment::new();
        self.leg = 0;
        self.menu_seen = 0;
        self.catering = None;
        self.boarding = None;
        self.deboarding = None;

        for name in [
            vars::BEACON,
            vars::APU_RUNNING,
            vars::APU_BLEED,
            vars::ENGINES_RUNNING,
            vars::BYPASS_PIN,
            vars::FUEL_HOSE_CONNECTED,
            vars::SERVICE_1_TOGGLE,
            vars::SERVICE_2_TOGGLE,
            vars::CARGO_1_TOGGLE,
            vars::CARGO_2_TOGGLE,
        ] {
            self.flag(name, false);
        }
        for name in [
            vars::COUATL_STARTED,
            vars::EXT_POWER_AVAILABLE,
            vars::EXT_POWER_ON,
            vars::PARKING_BRAKE,
            vars::ON_GROUND,
        ] {
            self.flag(name, true);
        }
        self.float(vars::GROUND_SPEED, 0.0);
        self.float(vars::THROTTLE, 0.0);
        self.state(vars::DEPARTURE_STATE, ServiceState::Callable);
        self.state(vars::JETWAY, ServiceState::Active);
        self.state(vars::JETWAY_OPERATION, ServiceState::Callable);
        self.state(vars::STAIRS, ServiceState::Callable);
        self.state(vars::STAIRS_OPERATION, ServiceState::Callable);
        self.env.aircraft.fuel_kg = INITIAL_FUEL_KG;

        self.next_leg();
    }

    /// Advance the world by one poll tick
    pub fn step(&mut self) {
        let selections: Vec<u8> = self.env.menu.selections[self.menu_seen..].to_vec();
        self.menu_seen = self.env.menu.selections.len();
        for item in selections {
            self.on_selection(item);
        }

        self.progress_services();
        self.advance_stage();
    }

    fn on_selection(&mut self, item: u8) {
        debug!(item, "ground services received menu selection");
        if item == MenuItem::Refuel.index() {
            self.state(vars::REFUELING_STATE, ServiceState::Active);
            self.flag(vars::FUEL_HOSE_CONNECTED, true);
        } else if item == MenuItem::Catering.index() {
            self.state(vars::CATERING_STATE, ServiceState::Active);
            self.flag(vars::SERVICE_1_TOGGLE, true);
            self.catering = Some(0);
        } else if item == MenuItem::Boarding.index() {
            self.state(vars::BOARDING_STATE, ServiceState::Active);
            self.flag(vars::CARGO_1_TOGGLE, true);
            self.boarding = Some(Loading { pax: 0, cargo_pct: 0 });
        } else if item == MenuItem::Deboard.index() {
            self.state(vars::DEBOARDING_STATE, ServiceState::Active);
            self.flag(vars::CARGO_1_TOGGLE, true);
            self.deboarding = Some(Loading { pax: 0, cargo_pct: 0 });
        } else if item == MenuItem::Jetway.index() {
            let connected = self.read_state(vars::JETWAY) == ServiceState::Active;
            let next = if connected {
                ServiceState::Callable
            } else {
                ServiceState::Active
            };
            self.state(vars::JETWAY, next);
        } else if item == MenuItem::Stairs.index() {
            self.state(vars::STAIRS, ServiceState::Active);
        }
    }

    fn progress_services(&mut self) {
        if self.read_state(vars::REFUELING_STATE) == ServiceState::Active
            && self.env.aircraft.fuel_kg >= TARGET_FUEL_KG
        {
            info!("fuel truck finished");
            self.state(vars::REFUELING_STATE, ServiceState::Completed);
            self.flag(vars::FUEL_HOSE_CONNECTED, false);
        }

        if let Some(ticks) = self.catering {
            if ticks + 1 >= CATERING_TICKS {
                self.state(vars::CATERING_STATE, ServiceState::Completed);
                self.flag(vars::SERVICE_1_TOGGLE, false);
                self.catering = None;
            } else {
                self.catering = Some(ticks + 1);
            }
        }

        if let Some(mut boarding) = self.boarding {
            boarding.pax = (boarding.pax + BOARDING_PAX_PER_TICK).min(PAX);
            boarding.cargo_pct = boarding.cargo_pct.saturating_add(CARGO_PCT_PER_TICK).min(100);
            self.count(vars::BOARDING_PAX, boarding.pax);
            self.count(vars::NUM_PASSENGERS, boarding.pax);
            self.count(vars::BOARDING_CARGO, u32::from(boarding.cargo_pct));
            if boarding.pax == PAX && boarding.cargo_pct == 100 {
                self.state(vars::BOARDING_STATE, ServiceState::Completed);
                self.flag(vars::CARGO_1_TOGGLE, false);
                self.boarding = None;
            } else {
                self.boarding = Some(boarding);
            }
        }

        if let Some(mut deboarding) = self.deboarding {
            deboarding.pax = (deboarding.pax + DEBOARDING_PAX_PER_TICK).min(PAX);
            deboarding.cargo_pct = deboarding.cargo_pct.saturating_add(CARGO_PCT_PER_TICK).min(100);
            self.count(vars::DEBOARDING_PAX, deboarding.pax);
            self.count(vars::DEBOARDING_CARGO, u32::from(deboarding.cargo_pct));
            if deboarding.pax == PAX && deboarding.cargo_pct == 100 {
                self.state(vars::DEBOARDING_STATE, ServiceState::Completed);
                self.flag(vars::CARGO_1_TOGGLE, false);
                self.deboarding = None;
            } else {
                self.deboarding = Some(deboarding);
            }
        }
    }

    fn advance_stage(&mut self) {
        self.stage = match self.stage {
            Stage::AtGate => {
                let boarded = self.read_state(vars::BOARDING_STATE) == ServiceState::Completed;
                let cleared = self.env.loadsheet.count(LoadsheetKind::Final) >= self.leg as usize;
                if boarded && cleared {
                    info!(leg = self.leg, "crew preparing for pushback");
                    self.flag(vars::APU_RUNNING, true);
                    self.flag(vars::APU_BLEED, true);
                    self.flag(vars::BEACON, true);
                    self.flag(vars::EXT_POWER_ON, false);
                    Stage::Pushback { ticks: 0 }
                } else {
                    Stage::AtGate
                }
            }
            Stage::Pushback { ticks } => match ticks {
                3 => {
                    self.flag(vars::BYPASS_PIN, true);
                    Stage::Pushback { ticks: ticks + 1 }
                }
                8 => {
                    self.flag(vars::BYPASS_PIN, false);
                    Stage::Pushback { ticks: ticks + 1 }
                }
                10 => {
                    self.flag(vars::ENGINES_RUNNING, true);
                    self.flag(vars::PARKING_BRAKE, false);
                    self.float(vars::THROTTLE, 0.3);
                    self.float(vars::GROUND_SPEED, 12.0);
                    Stage::TaxiOut { ticks: 0 }
                }
                _ => Stage::Pushback { ticks: ticks + 1 },
            },
            Stage::TaxiOut { ticks } if ticks >= 6 => {
                info!(leg = self.leg, "airborne");
                self.flag(vars::ON_GROUND, false);
                self.float(vars::GROUND_SPEED, 250.0);
                self.float(vars::THROTTLE, 0.8);
                Stage::Airborne { ticks: 0 }
            }
            Stage::TaxiOut { ticks } => Stage::TaxiOut { ticks: ticks + 1 },
            Stage::Airborne { ticks } if ticks >= 20 => {
                info!(leg = self.leg, "landed");
                self.flag(vars::ON_GROUND, true);
                self.float(vars::GROUND_SPEED, 20.0);
                self.float(vars::THROTTLE, 0.1);
                Stage::TaxiIn { ticks: 0 }
            }
            Stage::Airborne { ticks } => {
                self.env.aircraft.fuel_kg = (self.env.aircraft.fuel_kg - BURN_KG_PER_TICK).max(0.0);
                Stage::Airborne { ticks: ticks + 1 }
            }
            Stage::TaxiIn { ticks } if ticks >= 6 => {
                info!(leg = self.leg, "parked at gate");
                self.float(vars::GROUND_SPEED, 0.0);
                self.float(vars::THROTTLE, 0.0);
                self.flag(vars::ENGINES_RUNNING, false);
                self.flag(vars::PARKING_BRAKE, true);
                self.flag(vars::BEACON, false);
                self.flag(vars::APU_BLEED, false);
                Stage::Parked { ticks: 0 }
            }
            Stage::TaxiIn { ticks } => Stage::TaxiIn { ticks: ticks + 1 },
            Stage::Parked { ticks } => {
                let emptied = self.read_state(vars::DEBOARDING_STATE) == ServiceState::Completed;
                if emptied && ticks >= 5 {
                    self.flag(vars::EXT_POWER_ON, true);
                    self.next_leg();
                    Stage::AtGate
                } else if emptied {
                    Stage::Parked { ticks: ticks + 1 }
                } else {
                    Stage::Parked { ticks }
                }
            }
        };
    }

    fn next_leg(&mut self) {
        self.leg += 1;
        let plan = FlightPlan {
            id: Uuid::new_v4().to_string(),
            flight_number: format!("TRN{}", 100 + self.leg),
            planned_pax: PAX,
            target_fuel_kg: TARGET_FUEL_KG,
        };
        info!(leg = self.leg, flight = %plan.flight_number, "flight plan loaded");
        self.env.aircraft.plan = Some(plan);

        for name in [
            vars::REFUELING_STATE,
            vars::CATERING_STATE,
            vars::BOARDING_STATE,
            vars::DEBOARDING_STATE,
        ] {
            self.state(name, ServiceState::Callable);
        }
        for name in [
            vars::NUM_PASSENGERS,
            vars::BOARDING_PAX,
            vars::DEBOARDING_PAX,
            vars::BOARDING_CARGO,
            vars::DEBOARDING_CARGO,
        ] {
            self.count(name, 0);
        }
        self.stage = Stage::AtGate;
    }

    fn flag(&mut self, name: &str, value: bool) {
        self.env.sim.set(name, SimValue::Bool(value));
    }

    fn float(&mut self, name: &str, value: f64) {
        self.env.sim.set(name, SimValue::Float(value));
    }

    fn count(&mut self, name: &str, value: u32) {
        self.env.sim.set(name, SimValue::Int(i64::from(value)));
    }

    fn state(&mut self, name: &str, state: ServiceState) {
        self.env.sim.set(name, SimValue::Int(state.sentinel()));
    }

    fn read_state(&self, name: &str) -> ServiceState {
        self.env
            .sim
            .get(name)
            .map_or(ServiceState::Unknown, |v| ServiceState::from_sentinel(v.as_int()))
    }
}

impl Default for ScriptedWorld {
    fn default() -> Self {
        Self::new()
    }
}
