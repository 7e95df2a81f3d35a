//! Poll loop
//!
//! One task owns the [`Turnaround`] and the scripted world. Status goes out
//! through a `watch` channel, events through a `broadcast` channel, and
//! commands come back in over `mpsc`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use turnaround_core::{
    EventSink, FanoutSink, SharedSink, SystemClock, TickReport, TracingSink, Turnaround, TurnaroundConfig,
    TurnaroundEvent, TurnaroundStatus,
};

use crate::sim::ScriptedWorld;

const RECENT_EVENTS: usize = 256;

/// Event as published to API clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: Uuid,
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: TurnaroundEvent,
}

/// Publishes events on a broadcast channel and keeps the most recent ones
pub struct BroadcastSink {
    tx: broadcast::Sender<EventEnvelope>,
    recent: Mutex<VecDeque<EventEnvelope>>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            recent: Mutex::new(VecDeque::with_capacity(RECENT_EVENTS)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }

    /// Most recent events, oldest first
    pub fn recent(&self, limit: usize) -> Vec<EventEnvelope> {
        let Ok(recent) = self.recent.lock() else {
            return Vec::new();
        };
        let skip = recent.len().saturating_sub(limit);
        recent.iter().skip(skip).cloned().collect()
    }
}

impl EventSink for BroadcastSink {
    fn emit(&self, event: TurnaroundEvent) {
        let envelope = EventEnvelope {
            id: Uuid::new_v4(),
            at: Utc::now(),
            event,
        };
        if let Ok(mut recent) = self.recent.lock() {
            if recent.len() == RECENT_EVENTS {
                recent.pop_front();
            }
            recent.push_back(envelope.clone());
        }
        // No subscribers is fine
        let _ = self.tx.send(envelope);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Reset,
}

/// Handles held by the API side
#[derive(Clone)]
pub struct RunnerHandle {
    pub status: watch::Receiver<TurnaroundStatus>,
    pub commands: mpsc::Sender<Command>,
    pub events: Arc<BroadcastSink>,
}

/// One poll: the world moves, then the core reacts
pub fn poll_once(turnaround: &mut Turnaround, world: &mut ScriptedWorld) -> TickReport {
    world.step();
    let mut io = world.env.io();
    turnaround.tick(&mut io)
}

/// Start the poll loop on its own task
///
/// `tick_override` replaces the per-phase poll interval, which is how the
/// demo runs faster than real time.
pub fn spawn(config: TurnaroundConfig, tick_override: Option<Duration>) -> RunnerHandle {
    let events = Arc::new(BroadcastSink::new(64));
    let sinks: Vec<SharedSink> = vec![Arc::new(TracingSink), events.clone()];
    let sink = FanoutSink::new(sinks);
    let turnaround = Turnaround::new(config, Arc::new(SystemClock), Arc::new(sink));

    let (status_tx, status_rx) = watch::channel(turnaround.status());
    let (command_tx, command_rx) = mpsc::channel(8);

    tokio::spawn(run(
        turnaround,
        ScriptedWorld::new(),
        status_tx,
        command_rx,
        tick_override,
    ));

    RunnerHandle {
        status: status_rx,
        commands: command_tx,
        events,
    }
}

async fn run(
    mut turnaround: Turnaround,
    mut world: ScriptedWorld,
    status: watch::Sender<TurnaroundStatus>,
    mut commands: mpsc::Receiver<Command>,
    tick_override: Option<Duration>,
) {
    info!("turnaround poll loop started");
    let mut next_poll = Duration::ZERO;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(next_poll) => {
                let report = poll_once(&mut turnaround, &mut world);
                debug!(leg = world.leg(), phase = %report.phase, acted = report.acted, "tick");
                status.send_replace(turnaround.status());
                next_poll = tick_override.unwrap_or(report.next_poll);
            }
            command = commands.recv() => match command {
                Some(Command::Reset) => {
                    warn!("reset requested, restarting from preflight");
                    turnaround.reset(&mut world.env.aircraft);
                    world.restart();
                    status.send_replace(turnaround.status());
                }
                None => {
                    info!("command channel closed, stopping poll loop");
                    break;
                }
            },
        }
    }
}
