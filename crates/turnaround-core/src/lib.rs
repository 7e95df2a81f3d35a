//! Turnaround Core
//!
//! Coordinates a simulated aircraft turnaround between an aircraft-systems
//! simulation and a ground-services simulation: a seven-phase flight state
//! machine, service sequencing per phase, and door/equipment reconciliation
//! that keeps both simulations converged without feedback loops.
//!
//! The core is synchronous and tick-driven. A host polls
//! [`Turnaround::tick`] at the interval it returns, lending the external
//! collaborators for the duration of the tick.

pub mod clock;
pub mod collaborators;
pub mod config;
pub mod door;
pub mod equipment;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod phase;
pub mod refueling;
pub mod signals;
pub mod turnaround;

pub use clock::{Clock, ManualClock, SystemClock};
pub use collaborators::{
    AircraftSystems, FlightPlan, Io, LoadedData, LoadsheetKind, LoadsheetSender, MenuController,
    MenuItem, SimValue, SimVariableProvider,
};
pub use config::TurnaroundConfig;
pub use door::{DoorChange, DoorCoordinator, DoorState, DoorType, ExternalToggle};
pub use equipment::{EquipmentChange, EquipmentCoordinator, EquipmentType};
pub use error::{CollaboratorError, ConfigError, InvalidTransition};
pub use events::{
    EventSink, FanoutSink, RecordingSink, ServiceOperationStatus, ServiceOperationType,
    SharedSink, TracingSink, TurnaroundEvent,
};
pub use orchestrator::{PushbackState, ServiceOrchestrator, TickAction};
pub use phase::{FlightPhase, FlightStateMachine};
pub use refueling::{RefuelState, RefuelingProcess};
pub use signals::{ServiceState, SignalReader, SimSnapshot};
pub use turnaround::{
    EquipmentStatus, TickReport, Turnaround, TurnaroundCounters, TurnaroundStatus,
};
