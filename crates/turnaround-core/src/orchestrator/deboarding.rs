//! Deboarding service.

use tracing::{debug, info, warn};

use super::{adoptable, Ground, ServiceOrchestrator, TickAction};
use crate::collaborators::{Io, SimValue};
use crate::events::{ServiceOperationStatus, ServiceOperationType};
use crate::signals::{vars, ServiceState, SimSnapshot};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(super) enum Deboarding {
    #[default]
    NotStarted,
    Running,
    Done,
}

impl ServiceOrchestrator {
    pub fn run_deboarding_service(
        &mut self,
        snapshot: &SimSnapshot,
        ground: &mut Ground<'_>,
        io: &mut Io<'_>,
    ) -> TickAction {
        if self.answer_operator_prompt(io) {
            return TickAction::Acted;
        }
        Self::relay_door_toggles(snapshot, ground, io);

        // A service already finished when first seen still counts as started
        if self.deboarding == Deboarding::NotStarted && adoptable(snapshot.deboarding_state) {
            info!(state = ?snapshot.deboarding_state, "deboarding started");
            self.deboarding = Deboarding::Running;
            self.emit(
                ServiceOperationType::Deboarding,
                ServiceOperationStatus::Started,
            );
        }

        if self.deboarding == Deboarding::Running {
            if let Some(plan) = snapshot.flight_plan.as_ref() {
                if snapshot.ground_pax != plan.planned_pax {
                    debug!(
                        ground = snapshot.ground_pax,
                        planned = plan.planned_pax,
                        "correcting ground-services passenger count"
                    );
                    let planned = SimValue::Int(i64::from(plan.planned_pax));
                    if let Err(e) = io.sim.write(vars::NUM_PASSENGERS, planned) {
                        warn!("passenger count write failed: {e}");
                    }
                }
            }

            let emptied = match io
                .aircraft
                .progress_deboarding(snapshot.deboarding_pax, snapshot.deboarding_cargo_pct)
            {
                Ok(done) => done,
                Err(e) => {
                    debug!("deboarding progress unavailable: {e}");
                    false
                }
            };
            // 1 after a start means the service ended (finished or cancelled)
            let ended = matches!(
                snapshot.deboarding_state,
                ServiceState::Completed | ServiceState::Callable
            );
            if emptied || ended {
                info!(pax = snapshot.deboarding_pax, "deboarding completed");
                self.deboarding = Deboarding::Done;
                self.emit(
                    ServiceOperationType::Deboarding,
                    ServiceOperationStatus::Completed,
                );
            }
        }
        TickAction::Idle
    }
}
