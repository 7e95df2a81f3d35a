//! In-memory collaborators
//!
//! Plain-data stand-ins for the two simulations. Tests poke the public
//! fields directly; the gateway drives them from its scripted scenario.

use std::collections::HashMap;

use super::{
    AircraftSystems, FlightPlan, Io, LoadedData, LoadsheetKind, LoadsheetSender, MenuController,
    SimValue, SimVariableProvider,
};
use crate::door::DoorType;
use crate::equipment::EquipmentType;
use crate::error::{CollaboratorError, Result};

fn unavailable(what: &str) -> CollaboratorError {
    CollaboratorError::Unavailable(what.to_string())
}

/// Named variables in a map. Unset names read as unknown.
#[derive(Debug, Default, Clone)]
pub struct MemorySim {
    pub values: HashMap<String, SimValue>,
    pub writes: Vec<(String, SimValue)>,
    pub unavailable: bool,
}

impl MemorySim {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: SimValue) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<SimValue> {
        self.values.get(name).copied()
    }

    /// Values written by the core to `name`, oldest first
    pub fn writes_to(&self, name: &str) -> Vec<SimValue> {
        self.writes
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| *v)
            .collect()
    }
}

impl SimVariableProvider for MemorySim {
    fn read(&mut self, name: &str) -> Result<SimValue> {
        if self.unavailable {
            return Err(unavailable("sim variables"));
        }
        self.get(name)
            .ok_or_else(|| CollaboratorError::UnknownVariable(name.to_string()))
    }

    fn write(&mut self, name: &str, value: SimValue) -> Result<()> {
        if self.unavailable {
            return Err(unavailable("sim variables"));
        }
        self.writes.push((name.to_string(), value));
        self.set(name, value);
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryMenu {
    pub opened: u32,
    pub selections: Vec<u8>,
    pub operator_prompt: bool,
    pub fail: bool,
}

impl MemoryMenu {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MenuController for MemoryMenu {
    fn open(&mut self) -> Result<()> {
        if self.fail {
            return Err(unavailable("menu"));
        }
        self.opened += 1;
        Ok(())
    }

    fn select(&mut self, item: u8) -> Result<()> {
        if self.fail {
            return Err(unavailable("menu"));
        }
        self.selections.push(item);
        Ok(())
    }

    fn is_operator_prompt_active(&mut self) -> Result<bool> {
        if self.fail {
            return Err(unavailable("menu"));
        }
        Ok(self.operator_prompt)
    }
}

/// Aircraft systems backed by fields.
///
/// With `door_lag` set, door writes are recorded but only reach `doors`
/// on [`MemoryAircraft::apply_door_lag`].
#[derive(Debug, Default, Clone)]
pub struct MemoryAircraft {
    pub doors: HashMap<DoorType, bool>,
    pub door_writes: Vec<(DoorType, bool)>,
    pub door_lag: bool,
    lagged: Vec<(DoorType, bool)>,
    pub equipment: HashMap<EquipmentType, bool>,
    pub equipment_writes: Vec<(EquipmentType, bool)>,
    pub fuel_kg: f64,
    pub fuel_writes: Vec<f64>,
    pub passengers: u32,
    pub cargo_pct: u8,
    pub center_of_gravity: f64,
    pub plan: Option<FlightPlan>,
    deboard_from: Option<u32>,
    pub unavailable: bool,
}

impl MemoryAircraft {
    pub fn new() -> Self {
        Self {
            center_of_gravity: 27.5,
            ..Self::default()
        }
    }

    pub fn with_plan(plan: FlightPlan) -> Self {
        Self {
            plan: Some(plan),
            ..Self::new()
        }
    }

    pub fn apply_door_lag(&mut self) {
        for (door, open) in self.lagged.drain(..) {
            self.doors.insert(door, open);
        }
    }

    fn check(&self) -> Result<()> {
        if self.unavailable {
            return Err(unavailable("aircraft"));
        }
        Ok(())
    }
}

impl AircraftSystems for MemoryAircraft {
    fn door_open(&mut self, door: DoorType) -> Result<bool> {
        self.check()?;
        Ok(self.doors.get(&door).copied().unwrap_or(false))
    }

    fn set_door(&mut self, door: DoorType, open: bool) -> Result<()> {
        self.check()?;
        self.door_writes.push((door, open));
        if self.door_lag {
            self.lagged.push((door, open));
        } else {
            self.doors.insert(door, open);
        }
        Ok(())
    }

    fn set_equipment(&mut self, equipment: EquipmentType, connected: bool) -> Result<()> {
        self.check()?;
        self.equipment_writes.push((equipment, connected));
        self.equipment.insert(equipment, connected);
        Ok(())
    }

    fn fuel_kg(&mut self) -> Result<f64> {
        self.check()?;
        Ok(self.fuel_kg)
    }

    fn set_fuel_kg(&mut self, kg: f64) -> Result<()> {
        self.check()?;
        self.fuel_writes.push(kg);
        self.fuel_kg = kg;
        Ok(())
    }

    fn passengers(&mut self) -> Result<u32> {
        self.check()?;
        Ok(self.passengers)
    }

    fn cargo_percent(&mut self) -> Result<u8> {
        self.check()?;
        Ok(self.cargo_pct)
    }

    fn progress_boarding(&mut self, pax: u32, cargo_pct: u8) -> Result<bool> {
        self.check()?;
        self.deboard_from = None;
        let target = self.plan.as_ref().map_or(0, |plan| plan.planned_pax);
        self.passengers = pax;
        self.cargo_pct = cargo_pct.min(100);
        Ok(pax >= target && cargo_pct >= 100)
    }

    fn progress_deboarding(&mut self, pax: u32, cargo_pct: u8) -> Result<bool> {
        self.check()?;
        let onboard = self.passengers;
        let start = *self.deboard_from.get_or_insert(onboard);
        self.passengers = start.saturating_sub(pax);
        self.cargo_pct = 100u8.saturating_sub(cargo_pct.min(100));
        Ok(self.passengers == 0 && cargo_pct >= 100)
    }

    fn center_of_gravity(&mut self) -> Result<f64> {
        self.check()?;
        Ok(self.center_of_gravity)
    }

    fn flight_plan(&mut self) -> Result<Option<FlightPlan>> {
        self.check()?;
        Ok(self.plan.clone())
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryLoadsheet {
    pub sent: Vec<(LoadsheetKind, String, LoadedData)>,
    pub fail: bool,
}

impl MemoryLoadsheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, kind: LoadsheetKind) -> usize {
        self.sent.iter().filter(|(k, _, _)| *k == kind).count()
    }
}

impl LoadsheetSender for MemoryLoadsheet {
    fn send(&mut self, kind: LoadsheetKind, flight_number: &str, data: &LoadedData) -> Result<()> {
        if self.fail {
            return Err(unavailable("loadsheet"));
        }
        self.sent.push((kind, flight_number.to_string(), *data));
        Ok(())
    }
}

/// All four collaborators together
#[derive(Debug, Default, Clone)]
pub struct MemoryEnvironment {
    pub sim: MemorySim,
    pub aircraft: MemoryAircraft,
    pub menu: MemoryMenu,
    pub loadsheet: MemoryLoadsheet,
}

impl MemoryEnvironment {
    pub fn new() -> Self {
        Self {
            aircraft: MemoryAircraft::new(),
            ..Self::default()
        }
    }

    pub fn io(&mut self) -> Io<'_> {
        Io {
            sim: &mut self.sim,
            aircraft: &mut self.aircraft,
            menu: &mut self.menu,
            loadsheet: &mut self.loadsheet,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_variable_is_unknown() {
        let mut sim = MemorySim::new();
        assert_eq!(
            sim.read("NOPE"),
            Err(CollaboratorError::UnknownVariable("NOPE".into()))
        );
    }

    #[test]
    fn test_sim_write_is_visible_to_reads() {
        let mut sim = MemorySim::new();
        sim.write("X", SimValue::Int(3)).unwrap();
        assert_eq!(sim.read("X"), Ok(SimValue::Int(3)));
        assert_eq!(sim.writes_to("X"), vec![SimValue::Int(3)]);
    }

    #[test]
    fn test_door_lag_delays_state() {
        let mut aircraft = MemoryAircraft::new();
        aircraft.door_lag = true;
        aircraft.set_door(DoorType::AftRight, true).unwrap();
        assert_eq!(aircraft.door_open(DoorType::AftRight), Ok(false));

        aircraft.apply_door_lag();
        assert_eq!(aircraft.door_open(DoorType::AftRight), Ok(true));
    }

    #[test]
    fn test_deboarding_empties_aircraft() {
        let mut aircraft = MemoryAircraft::new();
        aircraft.passengers = 120;
        aircraft.cargo_pct = 100;

        assert_eq!(aircraft.progress_deboarding(60, 50), Ok(false));
        assert_eq!(aircraft.passengers, 60);
        assert_eq!(aircraft.progress_deboarding(120, 100), Ok(true));
        assert_eq!(aircraft.passengers, 0);
        assert_eq!(aircraft.cargo_pct, 0);
    }
}
