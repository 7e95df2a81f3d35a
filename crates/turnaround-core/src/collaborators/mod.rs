//! External collaborator interfaces
//!
//! The core never owns a transport. Everything it reads or writes goes
//! through these traits, bundled per tick into an [`Io`]. Every call is
//! best-effort and must return immediately.

pub mod memory;

use serde::{Deserialize, Serialize};

use crate::door::DoorType;
use crate::equipment::EquipmentType;
use crate::error::Result;

/// Value of a named simulator variable
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SimValue {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl SimValue {
    pub fn as_bool(self) -> bool {
        match self {
            SimValue::Bool(b) => b,
            SimValue::Int(i) => i != 0,
            SimValue::Float(f) => f != 0.0,
        }
    }

    pub fn as_int(self) -> i64 {
        match self {
            SimValue::Bool(b) => i64::from(b),
            SimValue::Int(i) => i,
            SimValue::Float(f) => f.round() as i64,
        }
    }

    pub fn as_float(self) -> f64 {
        match self {
            SimValue::Bool(b) => f64::from(u8::from(b)),
            SimValue::Int(i) => i as f64,
            SimValue::Float(f) => f,
        }
    }
}

/// Named simulator variables (ground services and aircraft lights/power)
pub trait SimVariableProvider {
    fn read(&mut self, name: &str) -> Result<SimValue>;
    fn write(&mut self, name: &str, value: SimValue) -> Result<()>;
}

/// Ground-services menu
pub trait MenuController {
    fn open(&mut self) -> Result<()>;
    fn select(&mut self, item: u8) -> Result<()>;
    fn is_operator_prompt_active(&mut self) -> Result<bool>;
}

/// Ground-services menu items, stable per release
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MenuItem {
    Deboard,
    Catering,
    Refuel,
    Boarding,
    Jetway,
    Stairs,
    Reposition,
}

impl MenuItem {
    pub fn index(self) -> u8 {
        match self {
            MenuItem::Deboard => 1,
            MenuItem::Catering => 2,
            MenuItem::Refuel => 3,
            MenuItem::Boarding => 4,
            MenuItem::Jetway => 6,
            MenuItem::Stairs => 7,
            MenuItem::Reposition => 10,
        }
    }
}

/// Flight plan as loaded on the aircraft side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightPlan {
    /// Identifies the leg; a different id starts a new turnaround
    pub id: String,
    pub flight_number: String,
    pub planned_pax: u32,
    pub target_fuel_kg: f64,
}

/// Aircraft-systems side of the simulation
pub trait AircraftSystems {
    fn door_open(&mut self, door: DoorType) -> Result<bool>;
    fn set_door(&mut self, door: DoorType, open: bool) -> Result<()>;
    fn set_equipment(&mut self, equipment: EquipmentType, connected: bool) -> Result<()>;
    fn fuel_kg(&mut self) -> Result<f64>;
    fn set_fuel_kg(&mut self, kg: f64) -> Result<()>;
    fn passengers(&mut self) -> Result<u32>;
    fn cargo_percent(&mut self) -> Result<u8>;
    /// Apply boarding progress; `true` once pax and cargo targets are reached
    fn progress_boarding(&mut self, pax: u32, cargo_pct: u8) -> Result<bool>;
    /// Apply deboarding progress; `true` once the aircraft is empty
    fn progress_deboarding(&mut self, pax: u32, cargo_pct: u8) -> Result<bool>;
    /// Center of gravity in percent MAC
    fn center_of_gravity(&mut self) -> Result<f64>;
    fn flight_plan(&mut self) -> Result<Option<FlightPlan>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadsheetKind {
    Preliminary,
    Final,
}

/// Figures handed to the loadsheet collaborator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadedData {
    pub pax: u32,
    pub cargo_pct: u8,
    pub fuel_kg: f64,
    pub cg_percent_mac: f64,
}

/// Loadsheet formatting and transmission
pub trait LoadsheetSender {
    fn send(&mut self, kind: LoadsheetKind, flight_number: &str, data: &LoadedData) -> Result<()>;
}

/// Collaborators lent to the core for one tick
pub struct Io<'a> {
    pub sim: &'a mut dyn SimVariableProvider,
    pub aircraft: &'a mut dyn AircraftSystems,
    pub menu: &'a mut dyn MenuController,
    pub loadsheet: &'a mut dyn LoadsheetSender,
}
