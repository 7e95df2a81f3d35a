//! Departure services: PCA, final loadsheet, equipment removal, pushback.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{Ground, ServiceOrchestrator, TickAction};
use crate::collaborators::{Io, LoadedData, LoadsheetKind, SimValue};
use crate::equipment::{EquipmentType, JetwayStairsSignals};
use crate::events::{ServiceOperationStatus, ServiceOperationType};
use crate::signals::{vars, ServiceState, SimSnapshot};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(super) enum FinalLoadsheet {
    #[default]
    Waiting,
    Counting {
        remaining: u32,
    },
    Sent,
}

#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PushbackState {
    #[default]
    Waiting,
    /// Bypass pin inserted, aircraft position frozen
    Frozen,
    Finished,
    /// Aircraft taxied out under its own power
    Skipped,
}

#[derive(Debug, Default, Clone, Copy)]
pub(super) struct DepartureState {
    pub(super) pca_removed: bool,
    pub(super) loadsheet: FinalLoadsheet,
    pub(super) equipment_removed: bool,
    pub(super) jetway_removed: bool,
    pub(super) pushback: PushbackState,
}

impl ServiceOrchestrator {
    pub fn run_departure_services(
        &mut self,
        snapshot: &SimSnapshot,
        ground: &mut Ground<'_>,
        io: &mut Io<'_>,
    ) -> TickAction {
        if self.answer_operator_prompt(io) {
            return TickAction::Acted;
        }

        if self.services.auto_pca
            && !self.departure.pca_removed
            && snapshot.apu_running
            && snapshot.apu_bleed_on
            && snapshot.beacon_on
            && snapshot.ext_power_available
        {
            info!("APU bleed available, disconnecting PCA");
            ground.equipment.set(EquipmentType::Pca, false, io.aircraft);
            self.departure.pca_removed = true;
        }

        let refuel_settled = self.refuel_settled(ground.refuel);
        self.final_loadsheet(snapshot, refuel_settled, io);
        self.detect_taxi_out(snapshot);
        if !self.loadsheet_done() {
            return TickAction::Idle;
        }

        if self.services.auto_remove_equipment {
            if !self.departure.equipment_removed {
                if !(snapshot.parking_brake_set && snapshot.beacon_on && !snapshot.ext_power_on) {
                    return TickAction::Idle;
                }
                info!("departure preparations complete, removing ground equipment");
                for equipment in [EquipmentType::Chocks, EquipmentType::Pca, EquipmentType::Gpu] {
                    ground.equipment.set(equipment, false, io.aircraft);
                }
                self.departure.equipment_removed = true;
                self.emit(
                    ServiceOperationType::GroundEquipment,
                    ServiceOperationStatus::Completed,
                );
            }
            if !self.departure.jetway_removed {
                let action = self.remove_jetway(snapshot, ground, io);
                if action.acted() || !self.departure.jetway_removed {
                    return action;
                }
            }
        }

        self.advance_pushback(snapshot, io);
        TickAction::Idle
    }

    /// Final loadsheet sent, or loadsheets are not ours to send
    fn loadsheet_done(&self) -> bool {
        !self.services.send_loadsheets || self.departure.loadsheet == FinalLoadsheet::Sent
    }

    /// Retract a connected jetway. Latches once the menu takes the request
    /// or no jetway is connected; a failed selection is retried next tick.
    fn remove_jetway(
        &mut self,
        snapshot: &SimSnapshot,
        ground: &mut Ground<'_>,
        io: &mut Io<'_>,
    ) -> TickAction {
        let signals = JetwayStairsSignals::from(snapshot);
        if signals.jetway_state != ServiceState::Active {
            self.departure.jetway_removed = true;
            return TickAction::Idle;
        }
        if ground.equipment.remove_jetway(&signals, io.menu) {
            info!("jetway removal requested");
            self.departure.jetway_removed = true;
            self.after_menu_request();
            return TickAction::Acted;
        }
        TickAction::Idle
    }

    fn final_loadsheet(&mut self, snapshot: &SimSnapshot, refuel_complete: bool, io: &mut Io<'_>) {
        if !self.services.send_loadsheets {
            return;
        }
        match self.departure.loadsheet {
            FinalLoadsheet::Waiting if refuel_complete && self.loading.boarding_complete() => {
                let min = self.timing.loadsheet_delay_min_ticks;
                let max = self.timing.loadsheet_delay_max_ticks.max(min);
                let remaining = self.rng.random_range(min..=max);
                debug!(remaining, "final loadsheet scheduled");
                self.departure.loadsheet = FinalLoadsheet::Counting { remaining };
            }
            FinalLoadsheet::Counting { remaining: 0 } => {
                let Some(plan) = snapshot.flight_plan.as_ref() else {
                    return;
                };
                let data = LoadedData {
                    pax: snapshot.passengers_onboard,
                    cargo_pct: snapshot.cargo_pct,
                    fuel_kg: snapshot.fuel_kg,
                    cg_percent_mac: io.aircraft.center_of_gravity().unwrap_or_default(),
                };
                match io
                    .loadsheet
                    .send(LoadsheetKind::Final, &plan.flight_number, &data)
                {
                    Ok(()) => {
                        info!(flight = %plan.flight_number, pax = data.pax, "final loadsheet sent");
                        self.departure.loadsheet = FinalLoadsheet::Sent;
                    }
                    Err(e) => warn!("final loadsheet failed, retrying: {e}"),
                }
            }
            FinalLoadsheet::Counting { remaining } => {
                self.departure.loadsheet = FinalLoadsheet::Counting {
                    remaining: remaining - 1,
                };
            }
            _ => {}
        }
    }

    /// Aircraft leaving under its own power; no pushback will follow
    fn detect_taxi_out(&mut self, snapshot: &SimSnapshot) {
        let taxiing = snapshot.ground_speed_kts > self.taxi.taxi_speed_kts
            && snapshot.throttle > self.taxi.throttle_threshold;
        if self.departure.pushback == PushbackState::Waiting
            && taxiing
            && !snapshot.bypass_pin_inserted
        {
            info!(speed = snapshot.ground_speed_kts, "taxiing under own power, no pushback");
            self.departure.pushback = PushbackState::Skipped;
            self.emit(ServiceOperationType::Pushback, ServiceOperationStatus::Cancelled);
        }
    }

    /// Freeze on pin insert, unfreeze and finish on removal. Runs only once
    /// the loadsheet and equipment steps have latched.
    fn advance_pushback(&mut self, snapshot: &SimSnapshot, io: &mut Io<'_>) {
        match self.departure.pushback {
            PushbackState::Waiting if snapshot.bypass_pin_inserted => {
                match io.sim.write(vars::FREEZE_POSITION, SimValue::Bool(true)) {
                    Ok(()) => {
                        info!("bypass pin inserted, aircraft frozen for pushback");
                        self.departure.pushback = PushbackState::Frozen;
                        self.emit(ServiceOperationType::Pushback, ServiceOperationStatus::Started);
                    }
                    Err(e) => warn!("freeze failed: {e}"),
                }
            }
            PushbackState::Frozen if !snapshot.bypass_pin_inserted => {
                match io.sim.write(vars::FREEZE_POSITION, SimValue::Bool(false)) {
                    Ok(()) => {
                        info!("bypass pin removed, pushback finished");
                        self.departure.pushback = PushbackState::Finished;
                        self.emit(
                            ServiceOperationType::Pushback,
                            ServiceOperationStatus::Completed,
                        );
                    }
                    Err(e) => warn!("unfreeze failed: {e}"),
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::Rig;
    use super::super::loading::Boarding;
    use super::*;
    use crate::config::TurnaroundConfig;
    use crate::signals::ServiceState;

    fn ready_for_pushback() -> Rig {
        let mut rig = Rig::new(TurnaroundConfig::default());
        rig.snapshot.beacon_on = true;
        rig.snapshot.parking_brake_set = true;
        rig.snapshot.ext_power_on = false;
        rig.orchestrator.departure.loadsheet = FinalLoadsheet::Sent;
        rig
    }

    fn loaded_and_fuelled(rig: &mut Rig) {
        rig.orchestrator.loading.boarding = Boarding::Done;
        rig.refuel.adopt();
        rig.refuel
            .tick(0.0, 0.0, ServiceState::Completed, &mut rig.env.aircraft);
    }

    fn freezes(rig: &Rig) -> Vec<SimValue> {
        rig.env.sim.writes_to(vars::FREEZE_POSITION)
    }

    #[test]
    fn test_pin_insert_insert_remove() {
        let mut rig = ready_for_pushback();
        rig.departure();

        rig.snapshot.bypass_pin_inserted = true;
        rig.departure();
        rig.departure();
        assert_eq!(freezes(&rig), vec![SimValue::Bool(true)]);
        assert!(!rig.orchestrator.ready_to_taxi());

        rig.snapshot.bypass_pin_inserted = false;
        rig.departure();
        rig.departure();

        assert_eq!(freezes(&rig), vec![SimValue::Bool(true), SimValue::Bool(false)]);
        assert_eq!(rig.orchestrator.pushback(), PushbackState::Finished);
        assert!(rig.orchestrator.ready_to_taxi());
    }

    #[test]
    fn test_no_freeze_before_equipment_removed() {
        let mut rig = Rig::new(TurnaroundConfig::default());
        rig.snapshot.bypass_pin_inserted = true;
        rig.departure();

        assert!(freezes(&rig).is_empty());
        assert_eq!(rig.orchestrator.pushback(), PushbackState::Waiting);
    }

    #[test]
    fn test_departure_steps_wait_for_final_loadsheet() {
        let mut config = TurnaroundConfig::default();
        config.timing.loadsheet_delay_min_ticks = 0;
        config.timing.loadsheet_delay_max_ticks = 0;
        let mut rig = Rig::new(config);
        rig.snapshot.beacon_on = true;
        rig.snapshot.parking_brake_set = true;
        rig.snapshot.ext_power_on = false;
        rig.equipment.set(EquipmentType::Chocks, true, &mut rig.env.aircraft);

        rig.departure();
        rig.snapshot.bypass_pin_inserted = true;
        rig.departure();
        rig.departure();
        rig.snapshot.bypass_pin_inserted = false;
        rig.departure();

        assert_eq!(rig.env.loadsheet.count(LoadsheetKind::Final), 0);
        assert!(rig.equipment.is_connected(EquipmentType::Chocks));
        assert!(freezes(&rig).is_empty());
        assert_eq!(rig.orchestrator.pushback(), PushbackState::Waiting);

        loaded_and_fuelled(&mut rig);
        rig.departure();
        assert!(rig.equipment.is_connected(EquipmentType::Chocks));

        rig.departure();
        assert_eq!(rig.env.loadsheet.count(LoadsheetKind::Final), 1);
        assert!(!rig.equipment.is_connected(EquipmentType::Chocks));
        assert!(freezes(&rig).is_empty());

        rig.snapshot.bypass_pin_inserted = true;
        rig.departure();
        assert_eq!(freezes(&rig), vec![SimValue::Bool(true)]);
    }

    #[test]
    fn test_pushback_follows_loadsheet_when_equipment_is_manual() {
        let mut config = TurnaroundConfig::default();
        config.services.auto_remove_equipment = false;
        let mut rig = Rig::new(config);
        rig.snapshot.bypass_pin_inserted = true;
        rig.departure();
        assert!(freezes(&rig).is_empty());

        rig.orchestrator.departure.loadsheet = FinalLoadsheet::Sent;
        rig.departure();

        assert_eq!(rig.orchestrator.pushback(), PushbackState::Frozen);
    }

    #[test]
    fn test_pushback_skipped_when_taxiing() {
        let mut rig = ready_for_pushback();
        rig.snapshot.ground_speed_kts = 8.0;
        rig.snapshot.throttle = 0.3;

        rig.departure();

        assert_eq!(rig.orchestrator.pushback(), PushbackState::Skipped);
        assert!(freezes(&rig).is_empty());
    }

    #[test]
    fn test_equipment_removed_once() {
        let mut rig = ready_for_pushback();
        for equipment in [EquipmentType::Chocks, EquipmentType::Gpu] {
            rig.equipment.set(equipment, true, &mut rig.env.aircraft);
        }

        rig.departure();
        rig.departure();

        assert!(!rig.equipment.is_connected(EquipmentType::Chocks));
        assert!(!rig.equipment.is_connected(EquipmentType::Gpu));
        assert_eq!(
            rig.service_events(
                ServiceOperationType::GroundEquipment,
                ServiceOperationStatus::Completed
            ),
            1
        );
    }

    #[test]
    fn test_equipment_kept_while_on_external_power() {
        let mut rig = ready_for_pushback();
        rig.snapshot.ext_power_on = true;
        rig.equipment.set(EquipmentType::Gpu, true, &mut rig.env.aircraft);

        rig.departure();

        assert!(rig.equipment.is_connected(EquipmentType::Gpu));
    }

    #[test]
    fn test_connected_jetway_removed_with_equipment() {
        let mut rig = ready_for_pushback();
        rig.snapshot.jetway_state = ServiceState::Active;
        rig.snapshot.jetway_operation = ServiceState::Completed;

        assert!(rig.departure().acted());
        assert_eq!(rig.env.menu.selections, vec![6]);
    }

    #[test]
    fn test_jetway_removal_retried_after_menu_failure() {
        let mut rig = ready_for_pushback();
        rig.equipment.set(EquipmentType::Chocks, true, &mut rig.env.aircraft);
        rig.snapshot.jetway_state = ServiceState::Active;
        rig.snapshot.jetway_operation = ServiceState::Callable;
        rig.env.menu.fail = true;

        assert!(!rig.departure().acted());
        assert!(!rig.equipment.is_connected(EquipmentType::Chocks));
        assert!(rig.env.menu.selections.is_empty());

        rig.snapshot.bypass_pin_inserted = true;
        rig.departure();
        assert!(freezes(&rig).is_empty());

        rig.env.menu.fail = false;
        assert!(rig.departure().acted());
        assert_eq!(rig.env.menu.selections, vec![6]);

        rig.departure();
        assert_eq!(freezes(&rig), vec![SimValue::Bool(true)]);
        assert_eq!(
            rig.service_events(
                ServiceOperationType::GroundEquipment,
                ServiceOperationStatus::Completed
            ),
            1
        );
    }

    #[test]
    fn test_pca_disconnected_on_apu_bleed() {
        let mut rig = Rig::new(TurnaroundConfig::default());
        rig.equipment.set(EquipmentType::Pca, true, &mut rig.env.aircraft);
        rig.snapshot.apu_running = true;
        rig.snapshot.apu_bleed_on = true;
        rig.snapshot.ext_power_available = true;
        rig.departure();
        assert!(rig.equipment.is_connected(EquipmentType::Pca));

        rig.snapshot.beacon_on = true;
        rig.snapshot.ext_power_on = true;
        rig.departure();

        assert!(!rig.equipment.is_connected(EquipmentType::Pca));
    }

    #[test]
    fn test_final_loadsheet_after_delay() {
        let mut config = TurnaroundConfig::default();
        config.timing.loadsheet_delay_min_ticks = 3;
        config.timing.loadsheet_delay_max_ticks = 3;
        let mut rig = Rig::new(config);
        loaded_and_fuelled(&mut rig);
        rig.snapshot.passengers_onboard = 148;

        for _ in 0..4 {
            rig.departure();
        }
        assert_eq!(rig.env.loadsheet.count(LoadsheetKind::Final), 0);

        rig.departure();
        rig.departure();

        assert_eq!(rig.env.loadsheet.count(LoadsheetKind::Final), 1);
        assert_eq!(rig.env.loadsheet.sent[0].2.pax, 148);
    }

    #[test]
    fn test_no_final_loadsheet_before_boarding() {
        let mut rig = Rig::new(TurnaroundConfig::default());
        rig.refuel.adopt();
        rig.refuel
            .tick(0.0, 0.0, ServiceState::Completed, &mut rig.env.aircraft);

        for _ in 0..200 {
            rig.departure();
        }

        assert_eq!(rig.env.loadsheet.count(LoadsheetKind::Final), 0);
    }
}
