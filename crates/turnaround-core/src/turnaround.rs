//! Turnaround driver
//!
//! Owns every component and runs one synchronous pass per poll tick:
//! read the snapshot, propose a phase transition from it, reconcile doors
//! and equipment, then dispatch the current phase's service sequences.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::collaborators::{AircraftSystems, Io};
use crate::config::TurnaroundConfig;
use crate::door::{DoorCoordinator, DoorState};
use crate::equipment::{EquipmentCoordinator, EquipmentType, JetwayStairsSignals};
use crate::events::SharedSink;
use crate::orchestrator::{Ground, PushbackState, ServiceOrchestrator};
use crate::phase::{FlightPhase, FlightStateMachine};
use crate::refueling::{RefuelState, RefuelingProcess};
use crate::signals::{SignalReader, SimSnapshot};

/// Passenger and cargo figures for the current leg
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnaroundCounters {
    pub planned_pax: u32,
    pub current_pax: u32,
    pub boarding_pax: u32,
    pub deboarding_pax: u32,
    /// 0-100
    pub cargo_pct: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentStatus {
    pub equipment: EquipmentType,
    pub connected: bool,
}

/// Point-in-time view for status consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnaroundStatus {
    pub phase: FlightPhase,
    pub flight_number: Option<String>,
    pub doors: Vec<DoorState>,
    pub equipment: Vec<EquipmentStatus>,
    pub refuel: RefuelState,
    pub pushback: PushbackState,
    pub boarding_complete: bool,
    pub deboarding_complete: bool,
    pub counters: TurnaroundCounters,
}

/// Result of one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub phase: FlightPhase,
    /// When the caller should tick again
    pub next_poll: Duration,
    /// A menu action was issued this tick
    pub acted: bool,
}

pub struct Turnaround {
    config: TurnaroundConfig,
    reader: SignalReader,
    fsm: FlightStateMachine,
    doors: DoorCoordinator,
    equipment: EquipmentCoordinator,
    refuel: RefuelingProcess,
    orchestrator: ServiceOrchestrator,
    counters: TurnaroundCounters,
    /// Flight plan id the current leg was started with
    leg: Option<String>,
}

impl Turnaround {
    pub fn new(config: TurnaroundConfig, clock: Arc<dyn Clock>, events: SharedSink) -> Self {
        Self {
            reader: SignalReader::new(),
            fsm: FlightStateMachine::new(events.clone()),
            doors: DoorCoordinator::new(config.doors.clone(), clock, events.clone()),
            equipment: EquipmentCoordinator::new(config.timing.stairs_wait_ticks, events.clone()),
            refuel: RefuelingProcess::new(config.refuel.rate_kg_per_tick, events.clone()),
            orchestrator: ServiceOrchestrator::new(&config, events),
            counters: TurnaroundCounters::default(),
            leg: None,
            config,
        }
    }

    pub fn phase(&self) -> FlightPhase {
        self.fsm.current()
    }

    pub fn config(&self) -> &TurnaroundConfig {
        &self.config
    }

    pub fn counters(&self) -> TurnaroundCounters {
        self.counters
    }

    /// Last snapshot read from the collaborators
    pub fn snapshot(&self) -> &SimSnapshot {
        self.reader.last()
    }

    /// Register another receiver for phase changes
    pub fn subscribe(&mut self, sink: SharedSink) {
        self.fsm.subscribe(sink);
    }

    pub fn status(&self) -> TurnaroundStatus {
        TurnaroundStatus {
            phase: self.phase(),
            flight_number: self
                .reader
                .last()
                .flight_plan
                .as_ref()
                .map(|plan| plan.flight_number.clone()),
            doors: self.doors.states().to_vec(),
            equipment: self
                .equipment
                .states()
                .iter()
                .map(|&(equipment, connected)| EquipmentStatus {
                    equipment,
                    connected,
                })
                .collect(),
            refuel: self.refuel.state(),
            pushback: self.orchestrator.pushback(),
            boarding_complete: self.orchestrator.boarding_complete(),
            deboarding_complete: self.orchestrator.deboarding_complete(),
            counters: self.counters,
        }
    }

    pub fn tick(&mut self, io: &mut Io<'_>) -> TickReport {
        let snapshot = self.reader.poll(io.sim, io.aircraft).clone();
        if let Some(target) = self.propose(&snapshot) {
            self.advance(target, &snapshot);
        }
        self.update_counters(&snapshot);

        self.doors.reconcile(io.aircraft);
        self.equipment
            .observe(&JetwayStairsSignals::from(&snapshot), io.aircraft);

        let acted = self.dispatch(&snapshot, io);
        let phase = self.phase();
        TickReport {
            phase,
            next_poll: phase.poll_interval(&self.config.poll),
            acted,
        }
    }

    /// Next phase the signals call for, if any
    pub fn propose(&self, snapshot: &SimSnapshot) -> Option<FlightPhase> {
        let next = match self.phase() {
            FlightPhase::Preflight => snapshot.flight_plan.is_some(),
            FlightPhase::Departure => self.orchestrator.ready_to_taxi(),
            FlightPhase::TaxiOut => !snapshot.on_ground,
            FlightPhase::Flight => snapshot.on_ground,
            FlightPhase::TaxiIn => {
                snapshot.parking_brake_set
                    && !snapshot.engines_running
                    && snapshot.ground_speed_kts < self.config.taxi.taxi_speed_kts
            }
            FlightPhase::Arrival => self.orchestrator.deboarding_complete(),
            FlightPhase::Turnaround => snapshot
                .flight_plan
                .as_ref()
                .is_some_and(|plan| self.leg.as_deref() != Some(plan.id.as_str())),
        };
        next.then(|| self.phase().successor())
    }

    /// Back to `Preflight` with every latch cleared and every door closed
    pub fn reset(&mut self, aircraft: &mut dyn AircraftSystems) {
        info!("turnaround reset");
        self.fsm.reset();
        self.orchestrator.reset();
        self.refuel.reset();
        self.equipment.reset();
        self.equipment.set_phase(FlightPhase::Preflight);
        self.doors.close_all(aircraft);
        self.counters = TurnaroundCounters::default();
        self.leg = None;
    }

    fn advance(&mut self, target: FlightPhase, snapshot: &SimSnapshot) {
        let previous = self.phase();
        if self.fsm.request_transition(target).is_err() {
            return;
        }
        self.equipment.set_phase(target);
        if target == FlightPhase::Departure {
            if previous == FlightPhase::Turnaround {
                debug!("new leg, clearing service state");
                self.orchestrator.reset();
                self.refuel.reset();
                self.equipment.reset();
                self.counters = TurnaroundCounters::default();
            }
            self.leg = snapshot.flight_plan.as_ref().map(|plan| plan.id.clone());
        }
    }

    fn update_counters(&mut self, snapshot: &SimSnapshot) {
        let c = &mut self.counters;
        if let Some(plan) = &snapshot.flight_plan {
            c.planned_pax = plan.planned_pax;
        }
        c.current_pax = snapshot.passengers_onboard;
        c.cargo_pct = snapshot.cargo_pct.min(100);
        match self.fsm.current() {
            FlightPhase::Departure => c.boarding_pax = snapshot.boarding_pax,
            FlightPhase::Arrival => c.deboarding_pax = snapshot.deboarding_pax,
            _ => {}
        }
    }

    fn dispatch(&mut self, snapshot: &SimSnapshot, io: &mut Io<'_>) -> bool {
        let mut ground = Ground {
            doors: &mut self.doors,
            equipment: &mut self.equipment,
            refuel: &mut self.refuel,
        };
        let orchestrator = &mut self.orchestrator;
        match self.fsm.current() {
            FlightPhase::Departure => {
                orchestrator
                    .run_loading_services(snapshot, &mut ground, io)
                    .acted()
                    || orchestrator
                        .run_departure_services(snapshot, &mut ground, io)
                        .acted()
            }
            FlightPhase::Arrival => {
                orchestrator
                    .run_arrival_services(snapshot, &mut ground, io)
                    .acted()
                    || orchestrator
                        .run_deboarding_service(snapshot, &mut ground, io)
                        .acted()
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::collaborators::memory::MemoryEnvironment;
    use crate::collaborators::{FlightPlan, SimValue};
    use crate::door::DoorType;
    use crate::events::{RecordingSink, TurnaroundEvent};
    use crate::signals::vars;

    fn plan(id: &str) -> FlightPlan {
        FlightPlan {
            id: id.into(),
            flight_number: format!("TST{id}"),
            planned_pax: 120,
            target_fuel_kg: 60.0,
        }
    }

    fn setup() -> (Turnaround, MemoryEnvironment, Arc<RecordingSink>) {
        let sink = RecordingSink::new();
        let config = TurnaroundConfig {
            seed: Some(1),
            ..TurnaroundConfig::default()
        };
        let turnaround = Turnaround::new(config, Arc::new(ManualClock::new()), sink.clone());
        (turnaround, MemoryEnvironment::new(), sink)
    }

    fn tick(turnaround: &mut Turnaround, env: &mut MemoryEnvironment) -> TickReport {
        let mut io = env.io();
        turnaround.tick(&mut io)
    }

    fn run_until(
        turnaround: &mut Turnaround,
        env: &mut MemoryEnvironment,
        phase: FlightPhase,
        max_ticks: usize,
    ) -> bool {
        for _ in 0..max_ticks {
            if tick(turnaround, env).phase == phase {
                return true;
            }
        }
        false
    }

    fn phase_changes(sink: &RecordingSink) -> Vec<(FlightPhase, FlightPhase)> {
        sink.events()
            .into_iter()
            .filter_map(|e| match e {
                TurnaroundEvent::PhaseChanged { previous, new } => Some((previous, new)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_plan_loaded_enters_departure_once() {
        let (mut turnaround, mut env, sink) = setup();
        tick(&mut turnaround, &mut env);
        assert_eq!(turnaround.phase(), FlightPhase::Preflight);

        env.aircraft.plan = Some(plan("A"));
        for _ in 0..5 {
            tick(&mut turnaround, &mut env);
        }

        assert_eq!(turnaround.phase(), FlightPhase::Departure);
        assert_eq!(
            phase_changes(&sink),
            vec![(FlightPhase::Preflight, FlightPhase::Departure)]
        );
    }

    #[test]
    fn test_full_cycle() {
        let (mut turnaround, mut env, sink) = setup();
        env.aircraft.plan = Some(plan("A"));
        assert!(run_until(&mut turnaround, &mut env, FlightPhase::Departure, 2));

        env.sim.set(vars::GROUND_SPEED, SimValue::Float(10.0));
        env.sim.set(vars::THROTTLE, SimValue::Float(0.4));
        env.sim.set(vars::ENGINES_RUNNING, SimValue::Bool(true));
        env.sim.set(vars::PARKING_BRAKE, SimValue::Bool(false));
        assert!(run_until(&mut turnaround, &mut env, FlightPhase::TaxiOut, 10));

        env.sim.set(vars::ON_GROUND, SimValue::Bool(false));
        assert!(run_until(&mut turnaround, &mut env, FlightPhase::Flight, 2));
        assert_eq!(
            tick(&mut turnaround, &mut env).next_poll,
            Duration::from_millis(turnaround.config().poll.cruise_ms)
        );

        env.sim.set(vars::ON_GROUND, SimValue::Bool(true));
        assert!(run_until(&mut turnaround, &mut env, FlightPhase::TaxiIn, 2));

        env.sim.set(vars::GROUND_SPEED, SimValue::Float(0.0));
        env.sim.set(vars::THROTTLE, SimValue::Float(0.0));
        env.sim.set(vars::ENGINES_RUNNING, SimValue::Bool(false));
        env.sim.set(vars::PARKING_BRAKE, SimValue::Bool(true));
        assert!(run_until(&mut turnaround, &mut env, FlightPhase::Arrival, 2));

        env.sim.set(vars::COUATL_STARTED, SimValue::Bool(true));
        env.sim.set(vars::DEBOARDING_STATE, SimValue::Int(5));
        for _ in 0..10 {
            tick(&mut turnaround, &mut env);
        }
        assert_eq!(turnaround.phase(), FlightPhase::Arrival);

        env.sim.set(vars::DEBOARDING_STATE, SimValue::Int(6));
        assert!(run_until(&mut turnaround, &mut env, FlightPhase::Turnaround, 3));

        for _ in 0..3 {
            tick(&mut turnaround, &mut env);
        }
        assert_eq!(turnaround.phase(), FlightPhase::Turnaround);

        env.aircraft.plan = Some(plan("B"));
        assert!(run_until(&mut turnaround, &mut env, FlightPhase::Departure, 2));

        let phases: Vec<FlightPhase> = phase_changes(&sink).into_iter().map(|(_, new)| new).collect();
        assert_eq!(
            phases,
            vec![
                FlightPhase::Departure,
                FlightPhase::TaxiOut,
                FlightPhase::Flight,
                FlightPhase::TaxiIn,
                FlightPhase::Arrival,
                FlightPhase::Turnaround,
                FlightPhase::Departure,
            ]
        );
        assert!(!turnaround.status().deboarding_complete);
        assert_eq!(turnaround.status().pushback, PushbackState::Waiting);
    }

    #[test]
    fn test_new_leg_resets_counters() {
        let (mut turnaround, mut env, _) = setup();
        env.aircraft.plan = Some(plan("A"));
        env.sim.set(vars::BOARDING_PAX, SimValue::Int(80));
        tick(&mut turnaround, &mut env);
        assert_eq!(turnaround.counters().boarding_pax, 80);
        assert_eq!(turnaround.counters().planned_pax, 120);

        turnaround.counters.deboarding_pax = 97;
        for phase in [
            FlightPhase::TaxiOut,
            FlightPhase::Flight,
            FlightPhase::TaxiIn,
            FlightPhase::Arrival,
            FlightPhase::Turnaround,
        ] {
            turnaround.fsm.request_transition(phase).unwrap();
        }
        env.sim.set(vars::BOARDING_PAX, SimValue::Int(0));
        env.aircraft.plan = Some(plan("B"));
        tick(&mut turnaround, &mut env);

        assert_eq!(turnaround.phase(), FlightPhase::Departure);
        assert_eq!(turnaround.counters().boarding_pax, 0);
        assert_eq!(turnaround.counters().deboarding_pax, 0);
    }

    #[test]
    fn test_same_plan_does_not_restart_leg() {
        let (mut turnaround, mut env, _) = setup();
        env.aircraft.plan = Some(plan("A"));
        tick(&mut turnaround, &mut env);
        for phase in [
            FlightPhase::TaxiOut,
            FlightPhase::Flight,
            FlightPhase::TaxiIn,
            FlightPhase::Arrival,
            FlightPhase::Turnaround,
        ] {
            turnaround.fsm.request_transition(phase).unwrap();
        }

        for _ in 0..3 {
            tick(&mut turnaround, &mut env);
        }

        assert_eq!(turnaround.phase(), FlightPhase::Turnaround);
    }

    #[test]
    fn test_reset_cascades() {
        let (mut turnaround, mut env, _) = setup();
        env.aircraft.plan = Some(plan("A"));
        tick(&mut turnaround, &mut env);
        turnaround
            .doors
            .request_open(DoorType::ForwardRight, &mut env.aircraft);
        assert!(env.aircraft.doors[&DoorType::ForwardRight]);

        turnaround.reset(&mut env.aircraft);

        assert_eq!(turnaround.phase(), FlightPhase::Preflight);
        assert!(!turnaround.doors.is_open(DoorType::ForwardRight));
        assert!(!env.aircraft.doors[&DoorType::ForwardRight]);
        assert_eq!(turnaround.status().refuel, RefuelState::Idle);
        assert_eq!(turnaround.counters(), TurnaroundCounters::default());
    }

    #[test]
    fn test_unavailable_collaborators_keep_last_values() {
        let (mut turnaround, mut env, _) = setup();
        env.aircraft.plan = Some(plan("A"));
        tick(&mut turnaround, &mut env);

        env.sim.unavailable = true;
        env.aircraft.unavailable = true;
        let report = tick(&mut turnaround, &mut env);

        assert_eq!(report.phase, FlightPhase::Departure);
        assert!(turnaround.snapshot().flight_plan.is_some());
    }

    #[test]
    fn test_aircraft_door_request_becomes_authoritative() {
        let (mut turnaround, mut env, sink) = setup();
        env.aircraft.doors.insert(DoorType::AftRight, true);

        tick(&mut turnaround, &mut env);

        assert!(turnaround.status().doors.iter().any(|d| d.door_type == DoorType::AftRight && d.is_open));
        assert_eq!(
            sink.count(|e| matches!(e, TurnaroundEvent::DoorStateChanged { .. })),
            1
        );
    }
}
