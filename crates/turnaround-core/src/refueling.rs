//! Refueling Process
//!
//! Idle -> Requested -> Active <-> Paused -> Completed. Fuel is only
//! written while Active; the hose state decides Active versus Paused.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::collaborators::{AircraftSystems, MenuController, MenuItem};
use crate::equipment::select;
use crate::events::{
    ServiceOperationStatus, ServiceOperationType, SharedSink, TurnaroundEvent,
};
use crate::signals::ServiceState;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum RefuelState {
    #[default]
    Idle,
    Requested,
    Active,
    Paused,
    Completed,
}

pub struct RefuelingProcess {
    state: RefuelState,
    rate_kg_per_tick: f64,
    events: SharedSink,
}

impl RefuelingProcess {
    pub fn new(rate_kg_per_tick: f64, events: SharedSink) -> Self {
        Self {
            state: RefuelState::Idle,
            rate_kg_per_tick,
            events,
        }
    }

    pub fn state(&self) -> RefuelState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.state == RefuelState::Completed
    }

    /// Call the fuel truck. Only acts from Idle; `true` once requested.
    pub fn request(&mut self, menu: &mut dyn MenuController) -> bool {
        if self.state != RefuelState::Idle {
            return false;
        }
        if !select(menu, MenuItem::Refuel) {
            return false;
        }
        self.state = RefuelState::Requested;
        info!("refueling requested");
        self.emit(ServiceOperationStatus::Started);
        true
    }

    /// Take over a refuel somebody else requested
    pub fn adopt(&mut self) {
        if self.state == RefuelState::Idle {
            self.state = RefuelState::Requested;
            info!("adopted manually requested refueling");
            self.emit(ServiceOperationStatus::Started);
        }
    }

    /// Start or resume pumping. A hose without a request is ignored.
    pub fn on_hose_connected(&mut self) {
        match self.state {
            RefuelState::Requested | RefuelState::Paused => {
                debug!(from = ?self.state, "fuel hose connected");
                self.state = RefuelState::Active;
                self.emit(ServiceOperationStatus::InProgress);
            }
            RefuelState::Idle => debug!("fuel hose connected without a refuel request, ignored"),
            RefuelState::Active | RefuelState::Completed => {}
        }
    }

    pub fn on_hose_disconnected(&mut self) {
        if self.state == RefuelState::Active {
            debug!("fuel hose disconnected, pausing");
            self.state = RefuelState::Paused;
        }
    }

    /// Advance one tick. Returns the state after the tick.
    pub fn tick(
        &mut self,
        current_fuel_kg: f64,
        target_fuel_kg: f64,
        ground_state: ServiceState,
        aircraft: &mut dyn AircraftSystems,
    ) -> RefuelState {
        match self.state {
            RefuelState::Idle | RefuelState::Completed => {}
            RefuelState::Requested | RefuelState::Paused => {
                if ground_state == ServiceState::Completed {
                    self.complete();
                }
            }
            RefuelState::Active => {
                let remaining = target_fuel_kg - current_fuel_kg;
                if remaining <= 0.0 || ground_state == ServiceState::Completed {
                    self.complete();
                    return self.state;
                }
                let step = self.rate_kg_per_tick.min(remaining);
                let fuel = current_fuel_kg + step;
                if let Err(e) = aircraft.set_fuel_kg(fuel) {
                    warn!("fuel write failed: {e}");
                    return self.state;
                }
                if fuel >= target_fuel_kg {
                    self.complete();
                }
            }
        }
        self.state
    }

    pub fn reset(&mut self) {
        self.state = RefuelState::Idle;
    }

    fn complete(&mut self) {
        info!("refueling completed");
        self.state = RefuelState::Completed;
        self.emit(ServiceOperationStatus::Completed);
    }

    fn emit(&self, status: ServiceOperationStatus) {
        self.events
            .emit(TurnaroundEvent::service(ServiceOperationType::Refueling, status));
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::collaborators::memory::MemoryAircraft;
    use crate::events::RecordingSink;
    use proptest::prelude::*;

    proptest! {
        /// Fuel never moves while paused and never overshoots the target
        #[test]
        fn fuzz_hose_sequence(
            hose in prop::collection::vec(any::<bool>(), 1..60),
            target in 0.0f64..2_000.0,
        ) {
            let mut refuel = RefuelingProcess::new(28.0, RecordingSink::new());
            let mut aircraft = MemoryAircraft::new();
            refuel.adopt();

            for connected in hose {
                if connected {
                    refuel.on_hose_connected();
                } else {
                    refuel.on_hose_disconnected();
                }
                let before = aircraft.fuel_kg;
                let paused = refuel.state() == RefuelState::Paused;
                refuel.tick(before, target, ServiceState::Active, &mut aircraft);

                if paused {
                    prop_assert_eq!(aircraft.fuel_kg, before);
                }
                prop_assert!(aircraft.fuel_kg <= target.max(0.0));
            }
        }
    }
}
