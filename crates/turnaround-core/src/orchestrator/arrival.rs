//! Arrival services: one step per tick once the ground-services engine
//! is up and the beacon is off.

use tracing::{debug, info};

use super::{adoptable, Ground, ServiceOrchestrator, TickAction};
use crate::collaborators::{Io, MenuItem};
use crate::equipment::{select, CallProgress, EquipmentType, JetwayStairsSignals};
use crate::events::{ServiceOperationStatus, ServiceOperationType};
use crate::signals::SimSnapshot;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(super) enum ArrivalStep {
    #[default]
    JetwayStairs,
    Pca,
    ChocksAndGpu,
    RequestDeboard,
    Done,
}

impl ServiceOrchestrator {
    pub fn run_arrival_services(
        &mut self,
        snapshot: &SimSnapshot,
        ground: &mut Ground<'_>,
        io: &mut Io<'_>,
    ) -> TickAction {
        if self.answer_operator_prompt(io) {
            return TickAction::Acted;
        }
        if !snapshot.couatl_running || snapshot.beacon_on {
            debug!(
                couatl = snapshot.couatl_running,
                beacon = snapshot.beacon_on,
                "arrival services deferred"
            );
            return TickAction::Idle;
        }

        match self.arrival {
            ArrivalStep::JetwayStairs => {
                if !self.services.auto_jetway_stairs {
                    self.arrival = ArrivalStep::Pca;
                    return TickAction::Idle;
                }
                let signals = JetwayStairsSignals::from(snapshot);
                match ground.equipment.call_jetway_and_stairs(
                    &signals,
                    self.services.jetway_only,
                    io.menu,
                ) {
                    CallProgress::InProgress => return TickAction::Acted,
                    CallProgress::Done => self.arrival = ArrivalStep::Pca,
                }
            }
            ArrivalStep::Pca => {
                if self.services.auto_pca {
                    ground.equipment.set(EquipmentType::Pca, true, io.aircraft);
                }
                self.arrival = ArrivalStep::ChocksAndGpu;
            }
            ArrivalStep::ChocksAndGpu => {
                ground.equipment.set(EquipmentType::Chocks, true, io.aircraft);
                ground.equipment.set(EquipmentType::Gpu, true, io.aircraft);
                info!("chocks and GPU placed");
                self.emit(
                    ServiceOperationType::GroundEquipment,
                    ServiceOperationStatus::Completed,
                );
                self.arrival = ArrivalStep::RequestDeboard;
            }
            ArrivalStep::RequestDeboard => {
                if !self.services.auto_deboarding || adoptable(snapshot.deboarding_state) {
                    self.arrival = ArrivalStep::Done;
                } else if select(io.menu, MenuItem::Deboard) {
                    info!("deboarding requested");
                    self.arrival = ArrivalStep::Done;
                    self.after_menu_request();
                    return TickAction::Acted;
                }
            }
            ArrivalStep::Done => {}
        }
        TickAction::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::Rig;
    use super::*;
    use crate::config::TurnaroundConfig;
    use crate::phase::FlightPhase;
    use crate::signals::ServiceState;

    fn parked() -> Rig {
        let mut config = TurnaroundConfig::default();
        config.timing.stairs_wait_ticks = 0;
        let mut rig = Rig::new(config);
        rig.equipment.set_phase(FlightPhase::Arrival);
        rig.snapshot.couatl_running = true;
        rig.snapshot.beacon_on = false;
        rig.snapshot.jetway_state = ServiceState::Callable;
        rig.snapshot.jetway_operation = ServiceState::Callable;
        rig.snapshot.stairs_state = ServiceState::NotAvailable;
        rig
    }

    #[test]
    fn test_waits_for_beacon_off() {
        let mut rig = parked();
        rig.snapshot.beacon_on = true;

        for _ in 0..3 {
            assert!(!rig.arrival().acted());
        }
        assert!(rig.env.menu.selections.is_empty());
    }

    #[test]
    fn test_waits_for_ground_services_engine() {
        let mut rig = parked();
        rig.snapshot.couatl_running = false;

        rig.arrival();

        assert!(rig.env.menu.selections.is_empty());
    }

    #[test]
    fn test_full_arrival_sequence() {
        let mut rig = parked();

        assert!(rig.arrival().acted());
        assert_eq!(rig.env.menu.selections, vec![6]);

        for _ in 0..3 {
            rig.arrival();
        }
        assert!(rig.equipment.is_connected(EquipmentType::Pca));
        assert!(rig.equipment.is_connected(EquipmentType::Chocks));
        assert!(rig.equipment.is_connected(EquipmentType::Gpu));

        assert!(rig.arrival().acted());
        assert_eq!(rig.env.menu.selections, vec![6, 1]);

        for _ in 0..3 {
            rig.arrival();
        }
        assert_eq!(rig.env.menu.selections, vec![6, 1]);
    }

    #[test]
    fn test_manual_deboarding_not_requested_again() {
        let mut rig = parked();
        rig.snapshot.deboarding_state = ServiceState::Requested;

        for _ in 0..8 {
            rig.arrival();
        }

        assert!(!rig.env.menu.selections.contains(&1));
    }
}
