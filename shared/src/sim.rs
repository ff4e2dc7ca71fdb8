//! # Simulated Car API
//!
//! An in-memory capability set for exercising the prober without a vehicle.
//! Registry constants, property values and the property list are configured
//! with a builder; any discovery step can be made to answer null or fail.
//!
//! ```ignore
//! let car = SimulatedCar::new()
//!     .with_constant("PARK_STATUS", 1)
//!     .with_value(1, PropertyValue::Bool(true))
//!     .with_fault(Stage::GlobalArea, Fault::Fail);
//!
//! let prober = CapabilityProber::new(car.clone());
//! prober.probe_park_state();
//! assert_eq!(car.disconnects(), 1);
//! ```
//!
//! Clones share their call counters, so a test can keep one handle while the
//! prober owns another.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use crate::model::{PropertyId, PropertyValue, RegistryConstant};
use crate::traits::{
    Capability, CapabilityProvider, CarApi, CarConnection, CarProperty, ProbeError, ProbeResult,
    PropertyConfig, PropertyManager, Required, Stage,
};

/// Type name reported for simulated property configs
pub const SIM_CONFIG_TYPE: &str = "sim.PropertyConfig";

const NO_AREA: i64 = i64::MIN;

/// How a faulty step misbehaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The step answers with null
    Null,
    /// The step raises
    Fail,
    /// The step panics
    Panic,
}

#[derive(Debug, Clone)]
enum SimValue {
    Attribute(Option<PropertyValue>),
    Getter(PropertyValue),
    ReadFailure,
}

/// One simulated entry of the property list
#[derive(Debug, Clone)]
pub struct SimConfig {
    id: Option<PropertyId>,
    area_type: Option<String>,
}

impl SimConfig {
    pub fn new(id: PropertyId) -> Self {
        Self {
            id: Some(id),
            area_type: None,
        }
    }

    /// An entry whose id cannot be read
    pub fn malformed() -> Self {
        Self {
            id: None,
            area_type: None,
        }
    }

    pub fn area_type(mut self, area_type: impl Into<String>) -> Self {
        self.area_type = Some(area_type.into());
        self
    }
}

#[derive(Debug)]
struct Counters {
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    reads: AtomicUsize,
    last_area: AtomicI64,
}

impl Default for Counters {
    fn default() -> Self {
        Self {
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
            last_area: AtomicI64::new(NO_AREA),
        }
    }
}

/// Builder-configured stand-in for the Car API
#[derive(Debug, Clone)]
pub struct SimulatedCar {
    available: bool,
    service_name: String,
    global_area: i32,
    faults: BTreeMap<Stage, Fault>,
    constants: Vec<RegistryConstant>,
    values: BTreeMap<PropertyId, SimValue>,
    configs: Vec<SimConfig>,
    counters: Arc<Counters>,
}

impl Default for SimulatedCar {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedCar {
    /// A reachable Car API with an empty registry
    pub fn new() -> Self {
        Self {
            available: true,
            service_name: String::from("property"),
            global_area: 0,
            faults: BTreeMap::new(),
            constants: Vec::new(),
            values: BTreeMap::new(),
            configs: Vec::new(),
            counters: Arc::new(Counters::default()),
        }
    }

    /// A system without the Car API at all
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    pub fn with_fault(mut self, stage: Stage, fault: Fault) -> Self {
        self.faults.insert(stage, fault);
        self
    }

    pub fn with_global_area(mut self, area: i32) -> Self {
        self.global_area = area;
        self
    }

    /// Append a registry constant; enumeration follows insertion order
    pub fn with_constant(mut self, name: &str, id: PropertyId) -> Self {
        self.constants.push(RegistryConstant::new(name, id));
        self
    }

    /// Property whose value is exposed as an attribute
    pub fn with_value(mut self, id: PropertyId, value: PropertyValue) -> Self {
        self.values.insert(id, SimValue::Attribute(Some(value)));
        self
    }

    /// Property whose value is only reachable through its getter
    pub fn with_getter_value(mut self, id: PropertyId, value: PropertyValue) -> Self {
        self.values.insert(id, SimValue::Getter(value));
        self
    }

    /// Property object that exists but carries a null value
    pub fn with_null_value(mut self, id: PropertyId) -> Self {
        self.values.insert(id, SimValue::Attribute(None));
        self
    }

    /// Property whose read raises
    pub fn with_read_failure(mut self, id: PropertyId) -> Self {
        self.values.insert(id, SimValue::ReadFailure);
        self
    }

    pub fn with_config(mut self, config: SimConfig) -> Self {
        self.configs.push(config);
        self
    }

    /// Number of connection attempts
    pub fn connects(&self) -> usize {
        self.counters.connects.load(Ordering::SeqCst)
    }

    /// Number of disconnect calls, including failed ones
    pub fn disconnects(&self) -> usize {
        self.counters.disconnects.load(Ordering::SeqCst)
    }

    /// Number of property reads
    pub fn reads(&self) -> usize {
        self.counters.reads.load(Ordering::SeqCst)
    }

    /// Area id passed to the most recent property read
    pub fn last_area(&self) -> Option<i32> {
        match self.counters.last_area.load(Ordering::SeqCst) {
            NO_AREA => None,
            area => i32::try_from(area).ok(),
        }
    }

    fn step<T>(&self, stage: Stage, value: T) -> ProbeResult<Option<T>> {
        match self.faults.get(&stage) {
            None => Ok(Some(value)),
            Some(Fault::Null) => Ok(None),
            Some(Fault::Fail) => Err(ProbeError::failed(stage, "simulated failure")),
            Some(Fault::Panic) => panic!("simulated panic at {stage}"),
        }
    }
}

impl CapabilityProvider for SimulatedCar {
    type Api = SimulatedApi;

    fn resolve(&self) -> Capability<SimulatedApi> {
        if self.available {
            Capability::Available(SimulatedApi(Arc::new(self.clone())))
        } else {
            Capability::Unavailable
        }
    }
}

/// Resolved entry point of a [`SimulatedCar`]
#[derive(Debug, Clone)]
pub struct SimulatedApi(Arc<SimulatedCar>);

impl CarApi for SimulatedApi {
    type Connection = SimulatedConnection;

    fn connect(&self) -> ProbeResult<Option<SimulatedConnection>> {
        self.0.counters.connects.fetch_add(1, Ordering::SeqCst);
        self.0.step(Stage::Connect, SimulatedConnection(self.0.clone()))
    }

    fn property_service_name(&self) -> ProbeResult<Option<String>> {
        self.0.step(Stage::ServiceName, self.0.service_name.clone())
    }

    fn registry(&self) -> ProbeResult<Vec<RegistryConstant>> {
        Ok(self
            .0
            .step(Stage::Registry, self.0.constants.clone())?
            .unwrap_or_default())
    }

    fn global_area(&self) -> ProbeResult<i32> {
        self.0
            .step(Stage::GlobalArea, self.0.global_area)?
            .required(Stage::GlobalArea)
    }
}

#[derive(Debug)]
pub struct SimulatedConnection(Arc<SimulatedCar>);

impl CarConnection for SimulatedConnection {
    type Manager = SimulatedManager;

    fn property_manager(&mut self, service: &str) -> ProbeResult<Option<SimulatedManager>> {
        if service != self.0.service_name {
            return Ok(None);
        }
        self.0
            .step(Stage::PropertyManager, SimulatedManager(self.0.clone()))
    }

    fn disconnect(&mut self) -> ProbeResult<()> {
        self.0.counters.disconnects.fetch_add(1, Ordering::SeqCst);
        self.0.step(Stage::Disconnect, ()).map(|_| ())
    }
}

#[derive(Debug)]
pub struct SimulatedManager(Arc<SimulatedCar>);

impl PropertyManager for SimulatedManager {
    type Property = SimulatedProperty;
    type Config = SimConfig;

    fn get_property(&self, id: PropertyId, area: i32) -> ProbeResult<Option<SimulatedProperty>> {
        let counters = &self.0.counters;
        counters.reads.fetch_add(1, Ordering::SeqCst);
        counters.last_area.store(i64::from(area), Ordering::SeqCst);

        if self.0.step(Stage::ReadProperty, ())?.is_none() {
            return Ok(None);
        }
        match self.0.values.get(&id) {
            None => Ok(None),
            Some(SimValue::ReadFailure) => {
                Err(ProbeError::failed(Stage::ReadProperty, "simulated failure"))
            }
            Some(value) => Ok(Some(SimulatedProperty(value.clone()))),
        }
    }

    fn property_list(&self) -> ProbeResult<Vec<SimConfig>> {
        Ok(self
            .0
            .step(Stage::PropertyList, self.0.configs.clone())?
            .unwrap_or_default())
    }
}

#[derive(Debug)]
pub struct SimulatedProperty(SimValue);

impl CarProperty for SimulatedProperty {
    fn value_attribute(&self) -> ProbeResult<Option<PropertyValue>> {
        match &self.0 {
            SimValue::Attribute(value) => Ok(value.clone()),
            _ => Err(ProbeError::failed(Stage::ReadValue, "no value attribute")),
        }
    }

    fn value_getter(&self) -> ProbeResult<Option<PropertyValue>> {
        match &self.0 {
            SimValue::Attribute(value) => Ok(value.clone()),
            SimValue::Getter(value) => Ok(Some(value.clone())),
            SimValue::ReadFailure => Err(ProbeError::failed(Stage::ReadValue, "simulated failure")),
        }
    }
}

impl PropertyConfig for SimConfig {
    fn property_id(&self) -> ProbeResult<PropertyId> {
        self.id
            .ok_or_else(|| ProbeError::failed(Stage::ConfigEntry, "no property id"))
    }

    fn area_type(&self) -> ProbeResult<Option<String>> {
        Ok(self.area_type.clone())
    }

    fn type_name(&self) -> Option<String> {
        Some(String::from(SIM_CONFIG_TYPE))
    }
}
