//! # Capability Prober
//!
//! Runs the three operations exposed to the UI on top of an injected
//! [`CapabilityProvider`]. Each operation resolves the API, opens a session and
//! walks the steps as a `?` pipeline; the first failure selects the operation's
//! fallback:
//!
//! | Operation | Fallback |
//! |---|---|
//! | [`CapabilityProber::probe_park_state`] | [`ParkStateResult::fail_safe`] |
//! | [`CapabilityProber::list_capabilities`] | empty list |
//! | [`CapabilityProber::read_capability_by_id`] | result with `error` set |
//!
//! The connection lives in a [`ConnectionGuard`], so it is released exactly
//! once on every exit path.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::ops::{Deref, DerefMut};
use log::{debug, info, warn};

use crate::intent::Intent;
use crate::model::{ParkStateResult, PropertyDescriptor, PropertyId, PropertyReadResult};
use crate::traits::{
    CapabilityProvider, CarApi, CarConnection, CarProperty, ProbeResult, PropertyConfig,
    PropertyManager, Required, Stage,
};

/// Area id used when the global area marker cannot be resolved
pub const GLOBAL_AREA_FALLBACK: i32 = 0;

/// Owns an open connection and disconnects it on drop
///
/// Disconnect failures are logged and swallowed.
pub struct ConnectionGuard<C: CarConnection> {
    connection: C,
}

impl<C: CarConnection> ConnectionGuard<C> {
    pub fn new(connection: C) -> Self {
        Self { connection }
    }
}

impl<C: CarConnection> Deref for ConnectionGuard<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.connection
    }
}

impl<C: CarConnection> DerefMut for ConnectionGuard<C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.connection
    }
}

impl<C: CarConnection> Drop for ConnectionGuard<C> {
    fn drop(&mut self) {
        if let Err(e) = self.connection.disconnect() {
            warn!("Ignoring disconnect failure: {e}");
        }
    }
}

type ManagerOf<A> = <<A as CarApi>::Connection as CarConnection>::Manager;

/// A connected property manager plus the guard that keeps it open
struct Session<A: CarApi> {
    manager: ManagerOf<A>,
    // Declared last: dropped after the manager
    _connection: ConnectionGuard<A::Connection>,
}

impl<A: CarApi> Session<A> {
    /// Connect, read the service name and acquire the property manager
    fn open(api: &A) -> ProbeResult<Self> {
        let connection = api.connect()?.required(Stage::Connect)?;
        let mut connection = ConnectionGuard::new(connection);

        let service = api.property_service_name()?.required(Stage::ServiceName)?;
        let manager = connection
            .property_manager(&service)?
            .required(Stage::PropertyManager)?;

        Ok(Self {
            manager,
            _connection: connection,
        })
    }
}

fn global_area<A: CarApi>(api: &A) -> i32 {
    api.global_area().unwrap_or_else(|e| {
        warn!("Global area not resolved, using {GLOBAL_AREA_FALLBACK}: {e}");
        GLOBAL_AREA_FALLBACK
    })
}

/// Probes the optional Car API through an injected provider
///
/// Holds no state besides the provider; every call starts from scratch.
#[derive(Debug, Clone)]
pub struct CapabilityProber<P> {
    provider: P,
}

impl<P: CapabilityProvider> CapabilityProber<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Find a gear/park property and report whether the vehicle is parked
    ///
    /// Never fails: anything unexpected yields [`ParkStateResult::fail_safe`].
    pub fn probe_park_state(&self) -> ParkStateResult {
        self.try_probe_park_state().unwrap_or_else(|e| {
            warn!("Park state probe fell back to default: {e}");
            ParkStateResult::fail_safe()
        })
    }

    fn try_probe_park_state(&self) -> ProbeResult<ParkStateResult> {
        let intent = Intent::ParkState;
        let api = self.provider.resolve().into_result()?;
        let session = Session::open(&api)?;

        let candidates = intent.candidates(api.registry()?);
        info!(
            "Park state candidates: {:?}",
            candidates.iter().map(|c| c.name.as_str()).collect::<Vec<_>>()
        );

        let area = global_area(&api);

        for candidate in &candidates {
            let property = match session.manager.get_property(candidate.id, area) {
                Ok(Some(property)) => property,
                Ok(None) => {
                    info!("Property {} returned null", candidate.name);
                    continue;
                }
                Err(e) => {
                    warn!("Reading {}({}) failed: {e}", candidate.name, candidate.id);
                    continue;
                }
            };

            let Some(value) = property.value() else {
                info!("Property {} has no value", candidate.name);
                continue;
            };

            info!("Found {} (id={}) -> {value:?}", candidate.name, candidate.id);
            let parked = intent.interpret(&candidate.name, &value);
            return Ok(ParkStateResult::found(parked, candidate.name.as_str(), value.to_string()));
        }

        warn!("No gear/park property found among {} candidates", candidates.len());
        Ok(ParkStateResult::fail_safe())
    }

    /// Describe every property the service reports as supported
    ///
    /// Never fails: an unreachable service yields an empty list and a
    /// malformed entry is skipped.
    pub fn list_capabilities(&self) -> Vec<PropertyDescriptor> {
        self.try_list_capabilities().unwrap_or_else(|e| {
            warn!("Property listing fell back to empty: {e}");
            Vec::new()
        })
    }

    fn try_list_capabilities(&self) -> ProbeResult<Vec<PropertyDescriptor>> {
        let api = self.provider.resolve().into_result()?;
        let session = Session::open(&api)?;

        let names: BTreeMap<PropertyId, String> = match api.registry() {
            Ok(constants) => constants.into_iter().map(|c| (c.id, c.name)).collect(),
            Err(e) => {
                warn!("Property names unavailable: {e}");
                BTreeMap::new()
            }
        };

        let configs = session.manager.property_list()?;
        let mut descriptors = Vec::with_capacity(configs.len());
        for config in &configs {
            let id = match config.property_id() {
                Ok(id) => id,
                Err(e) => {
                    debug!("Skipping property config: {e}");
                    continue;
                }
            };
            descriptors.push(PropertyDescriptor {
                id,
                name: names.get(&id).cloned(),
                area_hint: config.area_type().ok().flatten(),
                source_type_name: config.type_name(),
            });
        }

        info!("Listed {} of {} property configs", descriptors.len(), configs.len());
        Ok(descriptors)
    }

    /// Read one property by id
    ///
    /// Failures are reported in [`PropertyReadResult::error`], never raised.
    pub fn read_capability_by_id(&self, id: PropertyId) -> PropertyReadResult {
        self.try_read_capability_by_id(id).unwrap_or_else(|e| {
            warn!("Reading property {id} failed: {e}");
            PropertyReadResult::failed(id, e.to_string())
        })
    }

    fn try_read_capability_by_id(&self, id: PropertyId) -> ProbeResult<PropertyReadResult> {
        let api = self.provider.resolve().into_result()?;
        let session = Session::open(&api)?;
        let area = global_area(&api);

        let raw_value = session
            .manager
            .get_property(id, area)?
            .and_then(|property| property.value())
            .map(|value| value.to_string());

        Ok(PropertyReadResult::value(id, raw_value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PropertyValue;
    use crate::sim::{Fault, SimConfig, SimulatedCar};

    const GEAR_SELECTION: PropertyId = 289408000;
    const PARKING_BRAKE_ON: PropertyId = 287310850;
    const PARK_STATUS: PropertyId = 287310900;

    fn prober(car: &SimulatedCar) -> CapabilityProber<SimulatedCar> {
        CapabilityProber::new(car.clone())
    }

    #[test]
    fn test_park_state_without_car_api() {
        let car = SimulatedCar::unavailable();
        let result = prober(&car).probe_park_state();
        assert_eq!(result, ParkStateResult::fail_safe());
        assert_eq!(car.connects(), 0);
        assert_eq!(car.disconnects(), 0);
    }

    #[test]
    fn test_park_state_boolean_park_property() {
        let car = SimulatedCar::new()
            .with_constant("PARKING_BRAKE_ON", PARKING_BRAKE_ON)
            .with_value(PARKING_BRAKE_ON, PropertyValue::Bool(true));
        let result = prober(&car).probe_park_state();
        assert!(result.parked());
        assert_eq!(result.property_name(), Some("PARKING_BRAKE_ON"));
        assert_eq!(result.raw_value(), Some("true"));
        assert_eq!(car.disconnects(), 1);
    }

    #[test]
    fn test_park_state_false_is_trusted_for_park_names() {
        let car = SimulatedCar::new()
            .with_constant("PARK_BRAKE_ON", PARKING_BRAKE_ON)
            .with_value(PARKING_BRAKE_ON, PropertyValue::Bool(false));
        let result = prober(&car).probe_park_state();
        assert!(!result.parked());
        assert_eq!(result.raw_value(), Some("false"));
    }

    #[test]
    fn test_park_state_gear_property_keeps_default() {
        let car = SimulatedCar::new()
            .with_constant("GEAR_SELECTION", GEAR_SELECTION)
            .with_value(GEAR_SELECTION, PropertyValue::Int(8));
        let result = prober(&car).probe_park_state();
        assert!(result.parked());
        assert_eq!(result.property_name(), Some("GEAR_SELECTION"));
        assert_eq!(result.raw_value(), Some("8"));
    }

    #[test]
    fn test_park_state_gear_boolean_is_not_interpreted() {
        let car = SimulatedCar::new()
            .with_constant("SHIFT_LOCKED", GEAR_SELECTION)
            .with_value(GEAR_SELECTION, PropertyValue::Bool(false));
        let result = prober(&car).probe_park_state();
        assert!(result.parked());
        assert_eq!(result.raw_value(), Some("false"));
    }

    #[test]
    fn test_park_state_skips_null_candidate() {
        let car = SimulatedCar::new()
            .with_constant("GEAR_SELECTION", GEAR_SELECTION)
            .with_null_value(GEAR_SELECTION)
            .with_constant("PARK_STATUS", PARK_STATUS)
            .with_value(PARK_STATUS, PropertyValue::Bool(true));
        let result = prober(&car).probe_park_state();
        assert_eq!(result.property_name(), Some("PARK_STATUS"));
        assert_eq!(result.raw_value(), Some("true"));
        assert_eq!(car.disconnects(), 1);
    }

    #[test]
    fn test_park_state_skips_failing_and_absent_candidates() {
        let car = SimulatedCar::new()
            .with_constant("GEAR_SELECTION", GEAR_SELECTION)
            .with_read_failure(GEAR_SELECTION)
            .with_constant("CURRENT_GEAR", 289408001)
            .with_constant("PARKING_BRAKE_ON", PARKING_BRAKE_ON)
            .with_getter_value(PARKING_BRAKE_ON, PropertyValue::Bool(false));
        let result = prober(&car).probe_park_state();
        assert_eq!(result.property_name(), Some("PARKING_BRAKE_ON"));
        assert!(!result.parked());
    }

    #[test]
    fn test_park_state_first_candidate_wins() {
        let car = SimulatedCar::new()
            .with_constant("GEAR_SELECTION", GEAR_SELECTION)
            .with_value(GEAR_SELECTION, PropertyValue::Int(4))
            .with_constant("PARKING_BRAKE_ON", PARKING_BRAKE_ON)
            .with_value(PARKING_BRAKE_ON, PropertyValue::Bool(false));
        let result = prober(&car).probe_park_state();
        assert_eq!(result.property_name(), Some("GEAR_SELECTION"));
        assert!(result.parked());
        assert_eq!(car.reads(), 1);
    }

    #[test]
    fn test_park_state_ignores_non_matching_constants() {
        let car = SimulatedCar::new()
            .with_constant("PERF_VEHICLE_SPEED", 291504647)
            .with_value(291504647, PropertyValue::Decimal("12.5".into()));
        let result = prober(&car).probe_park_state();
        assert!(result.is_fail_safe());
        assert_eq!(car.reads(), 0);
        assert_eq!(car.disconnects(), 1);
    }

    #[test]
    fn test_park_state_uses_global_area_fallback() {
        let car = SimulatedCar::new()
            .with_fault(Stage::GlobalArea, Fault::Fail)
            .with_constant("PARK_STATUS", PARK_STATUS)
            .with_value(PARK_STATUS, PropertyValue::Bool(true));
        let result = prober(&car).probe_park_state();
        assert_eq!(result.property_name(), Some("PARK_STATUS"));
        assert_eq!(car.last_area(), Some(GLOBAL_AREA_FALLBACK));
    }

    #[test]
    fn test_park_state_reads_with_global_area() {
        let car = SimulatedCar::new()
            .with_global_area(7)
            .with_constant("PARK_STATUS", PARK_STATUS)
            .with_value(PARK_STATUS, PropertyValue::Bool(true));
        prober(&car).probe_park_state();
        assert_eq!(car.last_area(), Some(7));
    }

    #[test]
    fn test_park_state_fault_at_every_stage_is_fail_safe() {
        let stages = [
            (Stage::Connect, 0),
            (Stage::ServiceName, 1),
            (Stage::PropertyManager, 1),
            (Stage::Registry, 1),
        ];
        for (stage, releases) in stages {
            for fault in [Fault::Null, Fault::Fail] {
                let car = SimulatedCar::new()
                    .with_fault(stage, fault)
                    .with_constant("PARK_STATUS", PARK_STATUS)
                    .with_value(PARK_STATUS, PropertyValue::Bool(false));
                let result = prober(&car).probe_park_state();
                assert!(result.is_fail_safe(), "{stage:?} {fault:?}");
                assert_eq!(car.disconnects(), releases, "{stage:?} {fault:?}");
            }
        }
    }

    #[test]
    fn test_disconnect_failure_is_swallowed() {
        let car = SimulatedCar::new()
            .with_fault(Stage::Disconnect, Fault::Fail)
            .with_constant("PARK_STATUS", PARK_STATUS)
            .with_value(PARK_STATUS, PropertyValue::Bool(false));
        let result = prober(&car).probe_park_state();
        assert!(!result.parked());
        assert_eq!(car.disconnects(), 1);
    }

    #[test]
    fn test_every_call_starts_fresh() {
        let car = SimulatedCar::new()
            .with_constant("PARK_STATUS", PARK_STATUS)
            .with_value(PARK_STATUS, PropertyValue::Bool(true));
        let prober = prober(&car);
        prober.probe_park_state();
        prober.list_capabilities();
        prober.read_capability_by_id(PARK_STATUS);
        assert_eq!(car.connects(), 3);
        assert_eq!(car.disconnects(), 3);
    }

    #[test]
    fn test_list_without_car_api() {
        let car = SimulatedCar::unavailable();
        assert!(prober(&car).list_capabilities().is_empty());
    }

    #[test]
    fn test_list_with_unreachable_service() {
        let car = SimulatedCar::new()
            .with_fault(Stage::PropertyManager, Fault::Null)
            .with_config(SimConfig::new(PARK_STATUS));
        assert!(prober(&car).list_capabilities().is_empty());
        assert_eq!(car.disconnects(), 1);
    }

    #[test]
    fn test_list_resolves_names_and_skips_malformed() {
        let car = SimulatedCar::new()
            .with_constant("GEAR_SELECTION", GEAR_SELECTION)
            .with_config(SimConfig::new(GEAR_SELECTION).area_type("0"))
            .with_config(SimConfig::malformed())
            .with_config(SimConfig::new(554_696_960));
        let descriptors = prober(&car).list_capabilities();
        assert_eq!(descriptors.len(), 2);

        assert_eq!(descriptors[0].id, GEAR_SELECTION);
        assert_eq!(descriptors[0].name.as_deref(), Some("GEAR_SELECTION"));
        assert_eq!(descriptors[0].area_hint.as_deref(), Some("0"));
        assert_eq!(
            descriptors[0].source_type_name.as_deref(),
            Some(crate::sim::SIM_CONFIG_TYPE)
        );

        assert_eq!(descriptors[1].id, 554_696_960);
        assert!(descriptors[1].name.is_none());
        assert_eq!(car.disconnects(), 1);
    }

    #[test]
    fn test_list_later_registry_duplicates_win() {
        let car = SimulatedCar::new()
            .with_constant("OLD_NAME", GEAR_SELECTION)
            .with_constant("GEAR_SELECTION", GEAR_SELECTION)
            .with_config(SimConfig::new(GEAR_SELECTION));
        let descriptors = prober(&car).list_capabilities();
        assert_eq!(descriptors[0].name.as_deref(), Some("GEAR_SELECTION"));
    }

    #[test]
    fn test_list_survives_missing_registry() {
        let car = SimulatedCar::new()
            .with_fault(Stage::Registry, Fault::Fail)
            .with_config(SimConfig::new(GEAR_SELECTION));
        let descriptors = prober(&car).list_capabilities();
        assert_eq!(descriptors.len(), 1);
        assert!(descriptors[0].name.is_none());
    }

    #[test]
    fn test_list_property_list_failure() {
        let car = SimulatedCar::new()
            .with_fault(Stage::PropertyList, Fault::Fail)
            .with_config(SimConfig::new(GEAR_SELECTION));
        assert!(prober(&car).list_capabilities().is_empty());
        assert_eq!(car.disconnects(), 1);
    }

    #[test]
    fn test_read_by_id_value() {
        let car = SimulatedCar::new().with_value(GEAR_SELECTION, PropertyValue::Int(4));
        let result = prober(&car).read_capability_by_id(GEAR_SELECTION);
        assert_eq!(result, PropertyReadResult::value(GEAR_SELECTION, Some("4".into())));
        assert_eq!(car.disconnects(), 1);
    }

    #[test]
    fn test_read_by_id_null_property() {
        let car = SimulatedCar::new();
        let result = prober(&car).read_capability_by_id(42);
        assert_eq!(result.id(), 42);
        assert!(result.raw_value().is_none());
        assert!(result.error().is_none());
        assert_eq!(car.disconnects(), 1);
    }

    #[test]
    fn test_read_by_id_without_car_api() {
        let car = SimulatedCar::unavailable();
        let result = prober(&car).read_capability_by_id(42);
        assert!(result.raw_value().is_none());
        assert_eq!(result.error(), Some("car api not found"));
    }

    #[test]
    fn test_read_by_id_unreachable_service() {
        let car = SimulatedCar::new().with_fault(Stage::PropertyManager, Fault::Null);
        let result = prober(&car).read_capability_by_id(42);
        assert!(result.raw_value().is_none());
        assert_eq!(result.error(), Some("property manager unavailable"));
        assert_eq!(car.disconnects(), 1);
    }

    #[test]
    fn test_read_by_id_read_failure() {
        let car = SimulatedCar::new().with_read_failure(42);
        let result = prober(&car).read_capability_by_id(42);
        assert!(result.raw_value().is_none());
        assert!(result.error().unwrap().starts_with("property read failed"));
        assert_eq!(car.disconnects(), 1);
    }

    #[test]
    fn test_read_by_id_keeps_decimal_text() {
        let car = SimulatedCar::new().with_value(42, PropertyValue::Decimal("1.0E10".into()));
        let result = prober(&car).read_capability_by_id(42);
        assert_eq!(result.raw_value(), Some("1.0E10"));
        assert!(result.error().is_none());
    }
}
