//! Flight Phase State Machine
//!
//! Top-level seven-state machine gating which service sequences may run.
//! Transitions are purely table-driven:
//!
//! ```text
//! Preflight -> Departure -> TaxiOut -> Flight -> TaxiIn -> Arrival -> Turnaround
//!                  ^                                                      |
//!                  +------------------------------------------------------+
//! ```
//!
//! This is the only component allowed to change the current phase.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::PollConfig;
use crate::error::InvalidTransition;
use crate::events::{SharedSink, TurnaroundEvent};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum FlightPhase {
    Preflight,
    Departure,
    TaxiOut,
    Flight,
    TaxiIn,
    Arrival,
    Turnaround,
}

impl FlightPhase {
    pub const ALL: [FlightPhase; 7] = [
        FlightPhase::Preflight,
        FlightPhase::Departure,
        FlightPhase::TaxiOut,
        FlightPhase::Flight,
        FlightPhase::TaxiIn,
        FlightPhase::Arrival,
        FlightPhase::Turnaround,
    ];

    /// The single phase reachable from this one
    pub fn successor(self) -> FlightPhase {
        match self {
            FlightPhase::Preflight => FlightPhase::Departure,
            FlightPhase::Departure => FlightPhase::TaxiOut,
            FlightPhase::TaxiOut => FlightPhase::Flight,
            FlightPhase::Flight => FlightPhase::TaxiIn,
            FlightPhase::TaxiIn => FlightPhase::Arrival,
            FlightPhase::Arrival => FlightPhase::Turnaround,
            FlightPhase::Turnaround => FlightPhase::Departure,
        }
    }

    pub fn can_transition_to(self, target: FlightPhase) -> bool {
        self.successor() == target
    }

    /// Aircraft is parked at a stand and ground services may connect
    pub fn is_at_stand(self) -> bool {
        matches!(
            self,
            FlightPhase::Preflight
                | FlightPhase::Departure
                | FlightPhase::Arrival
                | FlightPhase::Turnaround
        )
    }

    pub fn poll_interval(self, poll: &PollConfig) -> Duration {
        let ms = match self {
            FlightPhase::Preflight
            | FlightPhase::Departure
            | FlightPhase::Arrival
            | FlightPhase::Turnaround => poll.ground_ms,
            FlightPhase::TaxiOut | FlightPhase::TaxiIn => poll.taxi_ms,
            FlightPhase::Flight => poll.cruise_ms,
        };
        Duration::from_millis(ms)
    }
}

impl fmt::Display for FlightPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlightPhase::Preflight => "Preflight",
            FlightPhase::Departure => "Departure",
            FlightPhase::TaxiOut => "TaxiOut",
            FlightPhase::Flight => "Flight",
            FlightPhase::TaxiIn => "TaxiIn",
            FlightPhase::Arrival => "Arrival",
            FlightPhase::Turnaround => "Turnaround",
        };
        f.write_str(name)
    }
}

/// Owner of the current flight phase
pub struct FlightStateMachine {
    current: FlightPhase,
    subscribers: Vec<SharedSink>,
}

impl FlightStateMachine {
    pub fn new(events: SharedSink) -> Self {
        Self {
            current: FlightPhase::Preflight,
            subscribers: vec![events],
        }
    }

    pub fn current(&self) -> FlightPhase {
        self.current
    }

    /// Register another receiver for phase-changed events
    pub fn subscribe(&mut self, sink: SharedSink) {
        self.subscribers.push(sink);
    }

    /// Move to `target` if the table allows it.
    ///
    /// Requesting the current phase is a no-op. On success exactly one
    /// phase-changed event is emitted before returning.
    pub fn request_transition(&mut self, target: FlightPhase) -> Result<(), InvalidTransition> {
        if target == self.current {
            debug!(phase = %target, "transition to current phase ignored");
            return Ok(());
        }
        if !self.current.can_transition_to(target) {
            let err = InvalidTransition {
                from: self.current,
                to: target,
            };
            warn!("{err}");
            return Err(err);
        }
        self.change(target);
        Ok(())
    }

    /// Force the phase back to `Preflight`
    pub fn reset(&mut self) {
        if self.current != FlightPhase::Preflight {
            self.change(FlightPhase::Preflight);
        }
    }

    fn change(&mut self, new: FlightPhase) {
        let previous = self.current;
        self.current = new;
        info!("Flight phase {previous} -> {new}");
        let event = TurnaroundEvent::PhaseChanged { previous, new };
        for sink in &self.subscribers {
            sink.emit(event);
        }
    }
}
