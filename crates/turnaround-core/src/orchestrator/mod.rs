//! Service Orchestrator
//!
//! Sequences ground services per phase: loading and departure while at
//! the departure stand, arrival and deboarding after parking. Every step
//! is a one-way latch cleared only by [`ServiceOrchestrator::reset`]; an
//! unmet precondition returns without acting and is retried next tick.
//!
//! At most one menu action is issued per tick. Entry points report it
//! through [`TickAction`] so the caller can skip later sequences.

mod arrival;
mod deboarding;
mod departure;
mod loading;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::collaborators::{Io, MenuController};
use crate::config::{MenuConfig, ServiceConfig, TaxiConfig, TimingConfig, TurnaroundConfig};
use crate::door::DoorCoordinator;
use crate::equipment::EquipmentCoordinator;
use crate::events::{
    ServiceOperationStatus, ServiceOperationType, SharedSink, TurnaroundEvent,
};
use crate::refueling::{RefuelState, RefuelingProcess};
use crate::signals::{ServiceState, SimSnapshot};

use arrival::ArrivalStep;
use deboarding::Deboarding;
use departure::DepartureState;
use loading::LoadingState;

pub use departure::PushbackState;

/// Whether a sequence issued a menu action this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
    Idle,
    Acted,
}

impl TickAction {
    pub fn acted(self) -> bool {
        self == TickAction::Acted
    }
}

/// Coordinators the orchestrator drives
pub struct Ground<'a> {
    pub doors: &'a mut DoorCoordinator,
    pub equipment: &'a mut EquipmentCoordinator,
    pub refuel: &'a mut RefuelingProcess,
}

/// Ticks left to answer an operator-selection prompt
#[derive(Debug, Default, Clone, Copy)]
struct OperatorPrompt {
    remaining: u32,
}

impl OperatorPrompt {
    fn arm(&mut self, ticks: u32) {
        self.remaining = ticks;
    }

    /// `true` if the prompt was showing and has been answered
    fn answer(&mut self, menu: &mut dyn MenuController, item: u8) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        match menu.is_operator_prompt_active() {
            Ok(true) => match menu.select(item) {
                Ok(()) => {
                    debug!(item, "operator prompt answered");
                    self.remaining = 0;
                    true
                }
                Err(e) => {
                    warn!("operator selection failed: {e}");
                    false
                }
            },
            Ok(false) => false,
            Err(e) => {
                debug!("operator prompt state unavailable: {e}");
                false
            }
        }
    }
}

/// Manually called services show up as requested, running or finished
fn adoptable(state: ServiceState) -> bool {
    state.is_underway() || state == ServiceState::Completed
}

pub struct ServiceOrchestrator {
    services: ServiceConfig,
    timing: TimingConfig,
    taxi: TaxiConfig,
    menu: MenuConfig,
    rng: StdRng,
    events: SharedSink,
    prompt: OperatorPrompt,
    loading: LoadingState,
    departure: DepartureState,
    arrival: ArrivalStep,
    deboarding: Deboarding,
}

impl ServiceOrchestrator {
    pub fn new(config: &TurnaroundConfig, events: SharedSink) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            services: config.services.clone(),
            timing: config.timing.clone(),
            taxi: config.taxi.clone(),
            menu: config.menu.clone(),
            rng,
            events,
            prompt: OperatorPrompt::default(),
            loading: LoadingState::default(),
            departure: DepartureState::default(),
            arrival: ArrivalStep::default(),
            deboarding: Deboarding::default(),
        }
    }

    pub fn boarding_complete(&self) -> bool {
        self.loading.boarding_complete()
    }

    pub fn pushback(&self) -> PushbackState {
        self.departure.pushback
    }

    /// Pushback finished or skipped; the aircraft may taxi
    pub fn ready_to_taxi(&self) -> bool {
        matches!(
            self.departure.pushback,
            PushbackState::Finished | PushbackState::Skipped
        )
    }

    pub fn deboarding_complete(&self) -> bool {
        self.deboarding == Deboarding::Done
    }

    /// Clear every latch
    pub fn reset(&mut self) {
        info!("service orchestrator reset");
        self.prompt = OperatorPrompt::default();
        self.loading = LoadingState::default();
        self.departure = DepartureState::default();
        self.arrival = ArrivalStep::default();
        self.deboarding = Deboarding::default();
    }

    /// Refuel finished, or not wanted: auto refuel is off and nobody
    /// called the truck
    fn refuel_settled(&self, refuel: &RefuelingProcess) -> bool {
        refuel.is_complete() || (!self.services.auto_refuel && refuel.state() == RefuelState::Idle)
    }

    fn answer_operator_prompt(&mut self, io: &mut Io<'_>) -> bool {
        self.prompt.answer(io.menu, self.menu.operator_item)
    }

    fn after_menu_request(&mut self) {
        self.prompt.arm(self.timing.operator_prompt_ticks);
    }

    /// Feed the ground-services door toggles to the door coordinator
    fn relay_door_toggles(snapshot: &SimSnapshot, ground: &mut Ground<'_>, io: &mut Io<'_>) {
        for (toggle, active) in snapshot.toggles {
            ground
                .doors
                .handle_external_toggle(toggle, active, io.aircraft);
        }
    }

    fn emit(&self, operation: ServiceOperationType, status: ServiceOperationStatus) {
        self.events.emit(TurnaroundEvent::service(operation, status));
    }
}
