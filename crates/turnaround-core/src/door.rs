//! Door Coordinator
//!
//! Owns the authoritative open/closed state of every door. Both
//! simulations are converged to it; nothing they report becomes
//! authoritative without passing through [`DoorCoordinator::request_open`]
//! or [`DoorCoordinator::request_close`].
//!
//! Ground-service toggles are learned onto doors on first activation.
//! A commanded change stays *pending* until the aircraft reports it, so the
//! aircraft echoing an old value is never mistaken for a new request. A
//! per-door circuit breaker stops any remaining feedback loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::collaborators::AircraftSystems;
use crate::config::DoorConfig;
use crate::events::{SharedSink, TurnaroundEvent};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DoorType {
    ForwardRight,
    AftRight,
    ForwardCargo,
    AftCargo,
}

impl DoorType {
    pub const ALL: [DoorType; 4] = [
        DoorType::ForwardRight,
        DoorType::AftRight,
        DoorType::ForwardCargo,
        DoorType::AftCargo,
    ];

    pub const CARGO: [DoorType; 2] = [DoorType::ForwardCargo, DoorType::AftCargo];

    fn index(self) -> usize {
        match self {
            DoorType::ForwardRight => 0,
            DoorType::AftRight => 1,
            DoorType::ForwardCargo => 2,
            DoorType::AftCargo => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DoorState {
    pub door_type: DoorType,
    pub is_open: bool,
}

/// Door-related toggle published by the ground-services simulation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ExternalToggle {
    /// Catering / service door toggle
    Service(u8),
    /// Cargo loading toggle
    Cargo(u8),
}

impl ExternalToggle {
    /// Doors this toggle may drive, forward first
    fn plausible_doors(self) -> [DoorType; 2] {
        match self {
            ExternalToggle::Service(_) => [DoorType::ForwardRight, DoorType::AftRight],
            ExternalToggle::Cargo(_) => [DoorType::ForwardCargo, DoorType::AftCargo],
        }
    }

    fn group(self) -> usize {
        match self {
            ExternalToggle::Service(_) => 0,
            ExternalToggle::Cargo(_) => 1,
        }
    }
}

/// Outcome of a door request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorChange {
    Changed,
    AlreadyInState,
    /// Circuit breaker tripped; the change was dropped
    Suppressed,
}

/// Fixed-window change counter for one door
#[derive(Debug, Default, Clone, Copy)]
struct ChangeBreaker {
    window_start: Option<Instant>,
    count: u32,
    tripped: bool,
}

#[derive(Debug, Default, Clone, Copy)]
struct DoorRecord {
    is_open: bool,
    /// Ticks since a command the aircraft has not confirmed yet
    pending: Option<u32>,
}

pub struct DoorCoordinator {
    doors: [DoorRecord; 4],
    breakers: [ChangeBreaker; 4],
    mapping: HashMap<ExternalToggle, DoorType>,
    last_toggle: HashMap<ExternalToggle, bool>,
    /// Per toggle group: next ambiguous learn picks the forward door
    next_forward: [bool; 2],
    config: DoorConfig,
    clock: Arc<dyn Clock>,
    events: SharedSink,
}

impl DoorCoordinator {
    pub fn new(config: DoorConfig, clock: Arc<dyn Clock>, events: SharedSink) -> Self {
        Self {
            doors: [DoorRecord::default(); 4],
            breakers: [ChangeBreaker::default(); 4],
            mapping: HashMap::new(),
            last_toggle: HashMap::new(),
            next_forward: [true; 2],
            config,
            clock,
            events,
        }
    }

    pub fn is_open(&self, door: DoorType) -> bool {
        self.doors[door.index()].is_open
    }

    pub fn states(&self) -> [DoorState; 4] {
        DoorType::ALL.map(|door_type| DoorState {
            door_type,
            is_open: self.is_open(door_type),
        })
    }

    /// Door learned for `toggle`, if it has been activated yet
    pub fn mapped_door(&self, toggle: ExternalToggle) -> Option<DoorType> {
        self.mapping.get(&toggle).copied()
    }

    pub fn request_open(&mut self, door: DoorType, aircraft: &mut dyn AircraftSystems) -> DoorChange {
        self.request(door, true, aircraft, true)
    }

    pub fn request_close(&mut self, door: DoorType, aircraft: &mut dyn AircraftSystems) -> DoorChange {
        self.request(door, false, aircraft, true)
    }

    /// React to a ground-services toggle. Only edges act: repeating the
    /// last observed value does nothing. Returns `None` when nothing was
    /// requested.
    pub fn handle_external_toggle(
        &mut self,
        toggle: ExternalToggle,
        active: bool,
        aircraft: &mut dyn AircraftSystems,
    ) -> Option<DoorChange> {
        let previous = self.last_toggle.insert(toggle, active).unwrap_or(false);
        if previous == active {
            return None;
        }
        let door = match self.mapping.get(&toggle) {
            Some(door) => *door,
            None if active => self.learn(toggle),
            None => return None,
        };
        debug!(?toggle, ?door, active, "ground-services door toggle");
        Some(self.request(door, active, aircraft, true))
    }

    /// Converge the aircraft side to the authoritative door state.
    ///
    /// A mismatch while a command is pending is echo lag; the command is
    /// re-sent once it has gone unconfirmed for `settle_ticks`. A mismatch
    /// with nothing pending is a request originating on the aircraft side.
    pub fn reconcile(&mut self, aircraft: &mut dyn AircraftSystems) {
        for door in DoorType::ALL {
            let observed = match aircraft.door_open(door) {
                Ok(open) => open,
                Err(e) => {
                    debug!(?door, "door state unavailable: {e}");
                    continue;
                }
            };
            let record = self.doors[door.index()];
            match record.pending {
                Some(_) if observed == record.is_open => self.doors[door.index()].pending = None,
                Some(ticks) if ticks + 1 >= self.config.settle_ticks => {
                    debug!(?door, "door command unconfirmed, re-sending");
                    self.command(door, aircraft);
                }
                Some(ticks) => self.doors[door.index()].pending = Some(ticks + 1),
                None if observed != record.is_open => {
                    debug!(?door, open = observed, "aircraft-side door request");
                    if self.request(door, observed, aircraft, false) == DoorChange::Suppressed {
                        self.command(door, aircraft);
                    }
                }
                None => {}
            }
        }
    }

    /// Close every door, bypassing the breaker. Learned toggles are kept.
    pub fn close_all(&mut self, aircraft: &mut dyn AircraftSystems) {
        self.breakers = [ChangeBreaker::default(); 4];
        for door in DoorType::ALL {
            let was_open = self.doors[door.index()].is_open;
            self.doors[door.index()] = DoorRecord::default();
            if was_open {
                self.command(door, aircraft);
                self.events.emit(TurnaroundEvent::DoorStateChanged {
                    door,
                    is_open: false,
                });
            }
        }
    }

    fn request(
        &mut self,
        door: DoorType,
        open: bool,
        aircraft: &mut dyn AircraftSystems,
        write: bool,
    ) -> DoorChange {
        if self.doors[door.index()].is_open == open {
            return DoorChange::AlreadyInState;
        }
        if !self.allow_change(door) {
            return DoorChange::Suppressed;
        }
        self.doors[door.index()].is_open = open;
        if write {
            self.command(door, aircraft);
        }
        info!(?door, open, "door state changed");
        self.events
            .emit(TurnaroundEvent::DoorStateChanged { door, is_open: open });
        DoorChange::Changed
    }

    /// Write the authoritative state to the aircraft and wait for confirmation
    fn command(&mut self, door: DoorType, aircraft: &mut dyn AircraftSystems) {
        let record = &mut self.doors[door.index()];
        record.pending = Some(0);
        if let Err(e) = aircraft.set_door(door, record.is_open) {
            warn!(?door, "door write failed, will retry: {e}");
        }
    }

    fn allow_change(&mut self, door: DoorType) -> bool {
        let now = self.clock.now();
        let window = self.config.breaker_window();
        let breaker = &mut self.breakers[door.index()];
        match breaker.window_start {
            Some(start) if now.duration_since(start) < window => {}
            _ => *breaker = ChangeBreaker {
                window_start: Some(now),
                count: 0,
                tripped: false,
            },
        }
        if breaker.count >= self.config.breaker_max_changes {
            if !breaker.tripped {
                breaker.tripped = true;
                warn!(
                    ?door,
                    changes = breaker.count,
                    window_ms = self.config.breaker_window_ms,
                    "door oscillation detected, suppressing further changes"
                );
            }
            return false;
        }
        breaker.count += 1;
        true
    }

    fn learn(&mut self, toggle: ExternalToggle) -> DoorType {
        let [forward, aft] = toggle.plausible_doors();
        let taken = |door: DoorType| self.mapping.values().any(|mapped| *mapped == door);
        let door = match (taken(forward), taken(aft)) {
            (false, true) => forward,
            (true, false) => aft,
            _ => {
                let next = &mut self.next_forward[toggle.group()];
                let door = if *next { forward } else { aft };
                *next = !*next;
                door
            }
        };
        info!(?toggle, ?door, "learned toggle mapping");
        self.mapping.insert(toggle, door);
        door
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::collaborators::memory::MemoryAircraft;
    use crate::events::RecordingSink;
    use std::time::Duration;

    fn coordinator() -> (DoorCoordinator, ManualClock, Arc<RecordingSink>) {
        let clock = ManualClock::new();
        let sink = RecordingSink::new();
        let doors = DoorCoordinator::new(DoorConfig::default(), Arc::new(clock.clone()), sink.clone());
        (doors, clock, sink)
    }

    fn door_events(sink: &RecordingSink) -> usize {
        sink.count(|e| matches!(e, TurnaroundEvent::DoorStateChanged { .. }))
    }

    #[test]
    fn test_repeated_open_is_idempotent() {
        let (mut doors, _, sink) = coordinator();
        let mut aircraft = MemoryAircraft::new();

        assert_eq!(doors.request_open(DoorType::ForwardRight, &mut aircraft), DoorChange::Changed);
        assert_eq!(
            doors.request_open(DoorType::ForwardRight, &mut aircraft),
            DoorChange::AlreadyInState
        );

        assert_eq!(door_events(&sink), 1);
        assert_eq!(aircraft.door_writes, vec![(DoorType::ForwardRight, true)]);
        assert!(doors.is_open(DoorType::ForwardRight));
    }

    #[test]
    fn test_breaker_suppresses_sixth_change_in_window() {
        let (mut doors, clock, sink) = coordinator();
        let mut aircraft = MemoryAircraft::new();
        let toggle = ExternalToggle::Service(1);

        let mut results = Vec::new();
        for i in 0..6 {
            clock.advance(Duration::from_millis(500));
            results.push(doors.handle_external_toggle(toggle, i % 2 == 0, &mut aircraft));
        }

        assert!(results[..5].iter().all(|r| *r == Some(DoorChange::Changed)));
        assert_eq!(results[5], Some(DoorChange::Suppressed));
        assert_eq!(door_events(&sink), 5);
        assert!(doors.is_open(DoorType::ForwardRight));

        clock.advance(Duration::from_secs(5));
        assert_eq!(
            doors.request_close(DoorType::ForwardRight, &mut aircraft),
            DoorChange::Changed
        );
    }

    #[test]
    fn test_breaker_is_per_door() {
        let (mut doors, _, _) = coordinator();
        let mut aircraft = MemoryAircraft::new();
        for i in 0..5 {
            if i % 2 == 0 {
                doors.request_open(DoorType::AftRight, &mut aircraft);
            } else {
                doors.request_close(DoorType::AftRight, &mut aircraft);
            }
        }
        assert_eq!(doors.request_close(DoorType::AftRight, &mut aircraft), DoorChange::Suppressed);
        assert_eq!(
            doors.request_open(DoorType::ForwardCargo, &mut aircraft),
            DoorChange::Changed
        );
    }

    #[test]
    fn test_toggle_mapping_learned_and_fixed() {
        let (mut doors, _, _) = coordinator();
        let mut aircraft = MemoryAircraft::new();

        doors.handle_external_toggle(ExternalToggle::Cargo(2), true, &mut aircraft);
        doors.handle_external_toggle(ExternalToggle::Cargo(1), true, &mut aircraft);
        doors.handle_external_toggle(ExternalToggle::Service(1), true, &mut aircraft);

        assert_eq!(doors.mapped_door(ExternalToggle::Cargo(2)), Some(DoorType::ForwardCargo));
        assert_eq!(doors.mapped_door(ExternalToggle::Cargo(1)), Some(DoorType::AftCargo));
        assert_eq!(doors.mapped_door(ExternalToggle::Service(1)), Some(DoorType::ForwardRight));
        assert_eq!(doors.mapped_door(ExternalToggle::Service(2)), None);

        doors.handle_external_toggle(ExternalToggle::Cargo(2), false, &mut aircraft);
        assert!(!doors.is_open(DoorType::ForwardCargo));
        assert!(doors.is_open(DoorType::AftCargo));
        assert_eq!(doors.mapped_door(ExternalToggle::Cargo(2)), Some(DoorType::ForwardCargo));
    }

    #[test]
    fn test_toggle_acts_on_edges_only() {
        let (mut doors, _, sink) = coordinator();
        let mut aircraft = MemoryAircraft::new();
        let toggle = ExternalToggle::Service(2);

        assert_eq!(doors.handle_external_toggle(toggle, false, &mut aircraft), None);
        assert!(doors.handle_external_toggle(toggle, true, &mut aircraft).is_some());
        assert_eq!(doors.handle_external_toggle(toggle, true, &mut aircraft), None);
        assert_eq!(doors.handle_external_toggle(toggle, true, &mut aircraft), None);

        assert_eq!(door_events(&sink), 1);
    }

    #[test]
    fn test_echo_lag_does_not_reverse_command() {
        let (mut doors, _, sink) = coordinator();
        let mut aircraft = MemoryAircraft::new();
        aircraft.door_lag = true;

        doors.request_open(DoorType::ForwardRight, &mut aircraft);
        for _ in 0..3 {
            doors.reconcile(&mut aircraft);
        }
        assert!(doors.is_open(DoorType::ForwardRight));

        aircraft.apply_door_lag();
        doors.reconcile(&mut aircraft);
        doors.reconcile(&mut aircraft);

        assert!(doors.is_open(DoorType::ForwardRight));
        assert_eq!(door_events(&sink), 1);
        assert_eq!(aircraft.door_writes.len(), 1);
    }

    #[test]
    fn test_unconfirmed_command_is_resent() {
        let (mut doors, _, _) = coordinator();
        let mut aircraft = MemoryAircraft::new();
        aircraft.door_lag = true;

        doors.request_open(DoorType::AftCargo, &mut aircraft);
        let settle = DoorConfig::default().settle_ticks;
        for _ in 0..settle {
            doors.reconcile(&mut aircraft);
        }

        assert_eq!(
            aircraft.door_writes,
            vec![(DoorType::AftCargo, true), (DoorType::AftCargo, true)]
        );
    }

    #[test]
    fn test_aircraft_side_change_is_arbitrated() {
        let (mut doors, _, sink) = coordinator();
        let mut aircraft = MemoryAircraft::new();
        aircraft.doors.insert(DoorType::ForwardRight, true);

        doors.reconcile(&mut aircraft);

        assert!(doors.is_open(DoorType::ForwardRight));
        assert_eq!(door_events(&sink), 1);
        assert!(aircraft.door_writes.is_empty());
    }

    #[test]
    fn test_suppressed_aircraft_change_is_reverted() {
        let (mut doors, _, _) = coordinator();
        let mut aircraft = MemoryAircraft::new();
        for i in 0..5 {
            if i % 2 == 0 {
                doors.request_open(DoorType::ForwardRight, &mut aircraft);
            } else {
                doors.request_close(DoorType::ForwardRight, &mut aircraft);
            }
        }
        doors.reconcile(&mut aircraft);
        aircraft.door_writes.clear();

        aircraft.doors.insert(DoorType::ForwardRight, false);
        doors.reconcile(&mut aircraft);

        assert!(doors.is_open(DoorType::ForwardRight));
        assert_eq!(aircraft.door_writes, vec![(DoorType::ForwardRight, true)]);
    }

    #[test]
    fn test_close_all_keeps_mapping() {
        let (mut doors, _, sink) = coordinator();
        let mut aircraft = MemoryAircraft::new();
        doors.handle_external_toggle(ExternalToggle::Service(1), true, &mut aircraft);
        doors.request_open(DoorType::AftCargo, &mut aircraft);
        sink.clear();

        doors.close_all(&mut aircraft);

        assert!(doors.states().iter().all(|s| !s.is_open));
        assert_eq!(door_events(&sink), 2);
        assert_eq!(doors.mapped_door(ExternalToggle::Service(1)), Some(DoorType::ForwardRight));
    }
}
