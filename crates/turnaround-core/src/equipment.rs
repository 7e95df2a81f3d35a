//! Equipment Coordinator
//!
//! Tracks jetway, stairs, GPU, PCA and chocks. GPU/PCA/chocks are placed
//! through the aircraft side; jetway and stairs are operated by the
//! ground services and only mirrored here.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::collaborators::{AircraftSystems, MenuController, MenuItem};
use crate::events::{
    ServiceOperationStatus, ServiceOperationType, SharedSink, TurnaroundEvent,
};
use crate::phase::FlightPhase;
use crate::signals::{ServiceState, SimSnapshot};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EquipmentType {
    Jetway,
    Stairs,
    Gpu,
    Pca,
    Chocks,
}

impl EquipmentType {
    pub const ALL: [EquipmentType; 5] = [
        EquipmentType::Jetway,
        EquipmentType::Stairs,
        EquipmentType::Gpu,
        EquipmentType::Pca,
        EquipmentType::Chocks,
    ];

    fn index(self) -> usize {
        match self {
            EquipmentType::Jetway => 0,
            EquipmentType::Stairs => 1,
            EquipmentType::Gpu => 2,
            EquipmentType::Pca => 3,
            EquipmentType::Chocks => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EquipmentChange {
    Changed,
    AlreadyInState,
    /// Equipment cannot be connected while the aircraft is moving
    RejectedInPhase,
}

/// Ground-services view of jetway and stairs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JetwayStairsSignals {
    pub jetway_state: ServiceState,
    pub jetway_operation: ServiceState,
    pub stairs_state: ServiceState,
    pub stairs_operation: ServiceState,
}

impl From<&SimSnapshot> for JetwayStairsSignals {
    fn from(snapshot: &SimSnapshot) -> Self {
        Self {
            jetway_state: snapshot.jetway_state,
            jetway_operation: snapshot.jetway_operation,
            stairs_state: snapshot.stairs_state,
            stairs_operation: snapshot.stairs_operation,
        }
    }
}

impl JetwayStairsSignals {
    fn jetway_callable(&self) -> bool {
        callable(self.jetway_state, self.jetway_operation)
    }

    fn stairs_callable(&self) -> bool {
        callable(self.stairs_state, self.stairs_operation)
    }
}

/// Neither unavailable, already connected, nor currently operating
fn callable(state: ServiceState, operation: ServiceState) -> bool {
    !matches!(
        state,
        ServiceState::Unknown
            | ServiceState::NotAvailable
            | ServiceState::Active
            | ServiceState::Completed
    ) && !operation.is_underway()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallProgress {
    InProgress,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JetwayStairsCall {
    Idle,
    StairsPending { ticks: u32 },
    Done,
}

pub struct EquipmentCoordinator {
    connected: [bool; 5],
    phase: FlightPhase,
    call: JetwayStairsCall,
    stairs_wait_ticks: u32,
    events: SharedSink,
}

impl EquipmentCoordinator {
    pub fn new(stairs_wait_ticks: u32, events: SharedSink) -> Self {
        Self {
            connected: [false; 5],
            phase: FlightPhase::Preflight,
            call: JetwayStairsCall::Idle,
            stairs_wait_ticks,
            events,
        }
    }

    pub fn is_connected(&self, equipment: EquipmentType) -> bool {
        self.connected[equipment.index()]
    }

    pub fn states(&self) -> [(EquipmentType, bool); 5] {
        EquipmentType::ALL.map(|e| (e, self.is_connected(e)))
    }

    pub fn set_phase(&mut self, phase: FlightPhase) {
        self.phase = phase;
    }

    /// Connect or remove one piece of equipment. Idempotent.
    pub fn set(
        &mut self,
        equipment: EquipmentType,
        connected: bool,
        aircraft: &mut dyn AircraftSystems,
    ) -> EquipmentChange {
        if self.connected[equipment.index()] == connected {
            return EquipmentChange::AlreadyInState;
        }
        if connected && !self.phase.is_at_stand() {
            debug!(?equipment, phase = %self.phase, "cannot connect equipment while moving");
            return EquipmentChange::RejectedInPhase;
        }
        self.connected[equipment.index()] = connected;
        if let Err(e) = aircraft.set_equipment(equipment, connected) {
            warn!(?equipment, "equipment write failed: {e}");
        }
        info!(?equipment, connected, "equipment state changed");
        self.events.emit(TurnaroundEvent::EquipmentStateChanged {
            equipment,
            connected,
        });
        EquipmentChange::Changed
    }

    /// Mirror jetway and stairs as the ground services report them
    pub fn observe(&mut self, signals: &JetwayStairsSignals, aircraft: &mut dyn AircraftSystems) {
        let jetway = signals.jetway_state == ServiceState::Active;
        let stairs = signals.stairs_state == ServiceState::Active;
        self.set(EquipmentType::Jetway, jetway, aircraft);
        self.set(EquipmentType::Stairs, stairs, aircraft);
    }

    /// Call jetway, then stairs after a bounded wait. One menu action per
    /// call; returns `Done` once nothing remains to be called.
    pub fn call_jetway_and_stairs(
        &mut self,
        signals: &JetwayStairsSignals,
        jetway_only: bool,
        menu: &mut dyn MenuController,
    ) -> CallProgress {
        match self.call {
            JetwayStairsCall::Done => CallProgress::Done,
            JetwayStairsCall::Idle => {
                if signals.jetway_callable() {
                    if select(menu, MenuItem::Jetway) {
                        self.events.emit(TurnaroundEvent::service(
                            ServiceOperationType::Jetway,
                            ServiceOperationStatus::Started,
                        ));
                        self.call = JetwayStairsCall::StairsPending { ticks: 0 };
                    }
                    return CallProgress::InProgress;
                }
                self.call = JetwayStairsCall::StairsPending {
                    ticks: self.stairs_wait_ticks,
                };
                self.call_stairs(signals, jetway_only, menu)
            }
            JetwayStairsCall::StairsPending { .. } => self.call_stairs(signals, jetway_only, menu),
        }
    }

    fn call_stairs(
        &mut self,
        signals: &JetwayStairsSignals,
        jetway_only: bool,
        menu: &mut dyn MenuController,
    ) -> CallProgress {
        let JetwayStairsCall::StairsPending { ticks } = self.call else {
            return CallProgress::Done;
        };
        let has_jetway = !matches!(
            signals.jetway_state,
            ServiceState::Unknown | ServiceState::NotAvailable
        );
        if jetway_only && has_jetway {
            self.call = JetwayStairsCall::Done;
            return CallProgress::Done;
        }
        if ticks < self.stairs_wait_ticks {
            self.call = JetwayStairsCall::StairsPending { ticks: ticks + 1 };
            return CallProgress::InProgress;
        }
        if signals.stairs_callable() {
            if !select(menu, MenuItem::Stairs) {
                return CallProgress::InProgress;
            }
            self.events.emit(TurnaroundEvent::service(
                ServiceOperationType::Stairs,
                ServiceOperationStatus::Started,
            ));
        }
        self.call = JetwayStairsCall::Done;
        CallProgress::Done
    }

    /// Retract a connected jetway through the menu. `true` if selected.
    pub fn remove_jetway(&mut self, signals: &JetwayStairsSignals, menu: &mut dyn MenuController) -> bool {
        if signals.jetway_state != ServiceState::Active || signals.jetway_operation.is_underway() {
            return false;
        }
        select(menu, MenuItem::Jetway)
    }

    /// Forget an in-progress jetway/stairs call. Equipment flags mirror
    /// the world and are left alone.
    pub fn reset(&mut self) {
        self.call = JetwayStairsCall::Idle;
    }
}

/// Open the service menu and pick `item`; `false` if the menu failed
pub(crate) fn select(menu: &mut dyn MenuController, item: MenuItem) -> bool {
    let result = menu.open().and_then(|()| menu.select(item.index()));
    match result {
        Ok(()) => {
            debug!(?item, "menu item selected");
            true
        }
        Err(e) => {
            warn!(?item, "menu selection failed, retrying next tick: {e}");
            false
        }
    }
}
