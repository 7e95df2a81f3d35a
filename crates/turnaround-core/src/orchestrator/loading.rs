//! Loading services: refuel, catering, cargo doors and boarding.

use tracing::{debug, info, warn};

use super::{adoptable, Ground, ServiceOrchestrator, TickAction};
use crate::collaborators::{Io, LoadedData, LoadsheetKind, MenuItem};
use crate::door::DoorType;
use crate::equipment::select;
use crate::events::{ServiceOperationStatus, ServiceOperationType};
use crate::refueling::RefuelState;
use crate::signals::{ServiceState, SimSnapshot};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(super) enum Catering {
    #[default]
    NotCalled,
    Called,
    Done,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(super) enum CargoDoors {
    #[default]
    Shut,
    Opened,
    /// Closed after loading; not reopened this leg
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Boarding {
    Waiting { ticks: u32 },
    Called,
    Done,
}

impl Default for Boarding {
    fn default() -> Self {
        Boarding::Waiting { ticks: 0 }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub(super) struct LoadingState {
    pub(super) preliminary_sent: bool,
    pub(super) catering: Catering,
    pub(super) cargo_doors: CargoDoors,
    pub(super) boarding: Boarding,
}

impl LoadingState {
    pub(super) fn boarding_complete(&self) -> bool {
        self.boarding == Boarding::Done
    }
}

impl ServiceOrchestrator {
    pub fn run_loading_services(
        &mut self,
        snapshot: &SimSnapshot,
        ground: &mut Ground<'_>,
        io: &mut Io<'_>,
    ) -> TickAction {
        if self.answer_operator_prompt(io) {
            return TickAction::Acted;
        }
        let Some(plan) = snapshot.flight_plan.as_ref() else {
            debug!("no flight plan loaded, loading services deferred");
            return TickAction::Idle;
        };

        if self.services.send_loadsheets && !self.loading.preliminary_sent {
            let data = LoadedData {
                pax: plan.planned_pax,
                cargo_pct: 100,
                fuel_kg: plan.target_fuel_kg,
                cg_percent_mac: io.aircraft.center_of_gravity().unwrap_or_default(),
            };
            match io
                .loadsheet
                .send(LoadsheetKind::Preliminary, &plan.flight_number, &data)
            {
                Ok(()) => {
                    info!(flight = %plan.flight_number, "preliminary loadsheet sent");
                    self.loading.preliminary_sent = true;
                }
                Err(e) => warn!("preliminary loadsheet failed: {e}"),
            }
        }

        if ground.refuel.state() == RefuelState::Idle {
            if adoptable(snapshot.refuel_state) {
                ground.refuel.adopt();
            } else if self.services.auto_refuel && ground.refuel.request(io.menu) {
                self.after_menu_request();
                return TickAction::Acted;
            }
        }

        if self.services.call_catering {
            match self.loading.catering {
                Catering::NotCalled if adoptable(snapshot.catering_state) => {
                    info!("adopted manually requested catering");
                    self.loading.catering = Catering::Called;
                    self.emit(ServiceOperationType::Catering, ServiceOperationStatus::Started);
                }
                Catering::NotCalled
                    if ground.refuel.state() != RefuelState::Idle || !self.services.auto_refuel =>
                {
                    if select(io.menu, MenuItem::Catering) {
                        info!("catering requested");
                        self.loading.catering = Catering::Called;
                        self.emit(ServiceOperationType::Catering, ServiceOperationStatus::Started);
                        self.after_menu_request();
                        return TickAction::Acted;
                    }
                }
                Catering::Called if snapshot.catering_state == ServiceState::Completed => {
                    info!("catering completed");
                    self.loading.catering = Catering::Done;
                    self.emit(
                        ServiceOperationType::Catering,
                        ServiceOperationStatus::Completed,
                    );
                }
                _ => {}
            }
        }
        let catering_done = !self.services.call_catering || self.loading.catering == Catering::Done;

        Self::relay_door_toggles(snapshot, ground, io);

        if self.services.open_cargo_doors
            && self.loading.cargo_doors == CargoDoors::Shut
            && catering_done
        {
            for door in DoorType::CARGO {
                ground.doors.request_open(door, io.aircraft);
            }
            self.loading.cargo_doors = CargoDoors::Opened;
        }

        if snapshot.fuel_hose_connected {
            ground.refuel.on_hose_connected();
        } else {
            ground.refuel.on_hose_disconnected();
        }
        ground.refuel.tick(
            snapshot.fuel_kg,
            plan.target_fuel_kg,
            snapshot.refuel_state,
            io.aircraft,
        );

        let ready = self.refuel_settled(ground.refuel) && catering_done;
        let action = self.board(snapshot, ready, io);

        if self.loading.cargo_doors == CargoDoors::Opened && snapshot.boarding_cargo_pct >= 100 {
            info!("cargo loaded, closing cargo doors");
            for door in DoorType::CARGO {
                ground.doors.request_close(door, io.aircraft);
            }
            self.loading.cargo_doors = CargoDoors::Closed;
        }

        action
    }

    fn board(&mut self, snapshot: &SimSnapshot, ready: bool, io: &mut Io<'_>) -> TickAction {
        match self.loading.boarding {
            Boarding::Waiting { .. } if adoptable(snapshot.boarding_state) => {
                info!("adopted manually requested boarding");
                self.loading.boarding = Boarding::Called;
                self.emit(ServiceOperationType::Boarding, ServiceOperationStatus::Started);
            }
            Boarding::Waiting { ticks } if ready && self.services.auto_boarding => {
                if ticks < self.timing.boarding_delay_ticks {
                    self.loading.boarding = Boarding::Waiting { ticks: ticks + 1 };
                } else if select(io.menu, MenuItem::Boarding) {
                    info!("boarding requested");
                    self.loading.boarding = Boarding::Called;
                    self.emit(ServiceOperationType::Boarding, ServiceOperationStatus::Started);
                    self.after_menu_request();
                    return TickAction::Acted;
                }
            }
            Boarding::Called => {
                let loaded = match io
                    .aircraft
                    .progress_boarding(snapshot.boarding_pax, snapshot.boarding_cargo_pct)
                {
                    Ok(done) => done,
                    Err(e) => {
                        debug!("boarding progress unavailable: {e}");
                        false
                    }
                };
                if loaded || snapshot.boarding_state == ServiceState::Completed {
                    info!(pax = snapshot.boarding_pax, "boarding completed");
                    self.loading.boarding = Boarding::Done;
                    self.emit(
                        ServiceOperationType::Boarding,
                        ServiceOperationStatus::Completed,
                    );
                }
            }
            _ => {}
        }
        TickAction::Idle
    }
}
