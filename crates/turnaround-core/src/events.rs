//! Events emitted by the core
//!
//! Components receive an [`EventSink`] at construction and publish state
//! changes through it. Sinks must not call back into the core; the host
//! marshals events to UI, log or ACARS consumers.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::door::DoorType;
use crate::equipment::EquipmentType;
use crate::phase::FlightPhase;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ServiceOperationType {
    Boarding,
    Deboarding,
    Refueling,
    Catering,
    GroundEquipment,
    Jetway,
    Stairs,
    Pushback,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ServiceOperationStatus {
    Started,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnaroundEvent {
    PhaseChanged {
        previous: FlightPhase,
        new: FlightPhase,
    },
    ServiceOperationChanged {
        operation: ServiceOperationType,
        status: ServiceOperationStatus,
    },
    DoorStateChanged {
        door: DoorType,
        is_open: bool,
    },
    EquipmentStateChanged {
        equipment: EquipmentType,
        connected: bool,
    },
}

impl TurnaroundEvent {
    pub fn service(operation: ServiceOperationType, status: ServiceOperationStatus) -> Self {
        Self::ServiceOperationChanged { operation, status }
    }
}

impl fmt::Display for TurnaroundEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PhaseChanged { previous, new } => write!(f, "phase {previous} -> {new}"),
            Self::ServiceOperationChanged { operation, status } => {
                write!(f, "{operation:?} {status:?}")
            }
            Self::DoorStateChanged { door, is_open } => {
                write!(f, "door {door:?} {}", if *is_open { "open" } else { "closed" })
            }
            Self::EquipmentStateChanged {
                equipment,
                connected,
            } => write!(
                f,
                "{equipment:?} {}",
                if *connected { "connected" } else { "removed" }
            ),
        }
    }
}

/// Receiver for core events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: TurnaroundEvent);
}

pub type SharedSink = Arc<dyn EventSink>;

/// Logs every event through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: TurnaroundEvent) {
        tracing::info!(target: "turnaround_core::events", "{event}");
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<TurnaroundEvent>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<TurnaroundEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self, predicate: impl Fn(&TurnaroundEvent) -> bool) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| predicate(e))
            .count()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: TurnaroundEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

/// Forwards each event to several sinks in order
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<SharedSink>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<SharedSink>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: SharedSink) {
        self.sinks.push(sink);
    }
}

impl EventSink for FanoutSink {
    fn emit(&self, event: TurnaroundEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fanout_reaches_every_sink() {
        let a = RecordingSink::new();
        let b = RecordingSink::new();
        let fanout = FanoutSink::new(vec![a.clone() as SharedSink, b.clone() as SharedSink]);

        fanout.emit(TurnaroundEvent::DoorStateChanged {
            door: DoorType::ForwardRight,
            is_open: true,
        });

        assert_eq!(a.events().len(), 1);
        assert_eq!(b.events(), a.events());
    }

    #[test]
    fn test_event_serializes_with_kind_tag() {
        let event = TurnaroundEvent::service(
            ServiceOperationType::Refueling,
            ServiceOperationStatus::Started,
        );
        let json = serde_json::to_value(event).unwrap();

        assert_eq!(json["kind"], "service_operation_changed");
        assert_eq!(json["operation"], "Refueling");
        assert_eq!(json["status"], "Started");
    }
}
