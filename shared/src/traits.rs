//! # Capability Traits & Probe Errors
//!
//! The optional Car API is never touched directly. The prober walks a chain of
//! traits, one per step of the discovery:
//!
//! ```text
//! CapabilityProvider ──resolve──► CarApi ──connect──► CarConnection
//!                                    │                     │
//!                         registry / global_area   property_manager
//!                                                          │
//!                                                          ▼
//!                              CarProperty ◄──get_property── PropertyManager
//!                                                          │
//!                                              property_list
//!                                                          ▼
//!                                                   PropertyConfig
//! ```
//!
//! Every step returns `ProbeResult`, and steps that may legitimately hand back
//! nothing return `Option` inside it. The Android library implements these
//! traits over JNI; tests use the simulated set in [`crate::sim`].

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use thiserror::Error;

use crate::model::{PropertyId, PropertyValue, RegistryConstant};

/// A step of the discovery, used to tag probe errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    EntryPoint,
    Connect,
    ServiceName,
    PropertyManager,
    Registry,
    GlobalArea,
    PropertyList,
    ReadProperty,
    ReadValue,
    ConfigEntry,
    Disconnect,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::EntryPoint => "car api lookup",
            Self::Connect => "car connection",
            Self::ServiceName => "property service name",
            Self::PropertyManager => "property manager",
            Self::Registry => "property id registry",
            Self::GlobalArea => "global area",
            Self::PropertyList => "property list",
            Self::ReadProperty => "property read",
            Self::ReadValue => "property value",
            Self::ConfigEntry => "property config",
            Self::Disconnect => "disconnect",
        })
    }
}

/// Errors raised while walking the optional API
///
/// None of these escape the prober; they select the fallback and end up in
/// logs or in `PropertyReadResult::error`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    /// The root entry point does not exist on this system
    #[error("car api not found")]
    Unavailable,
    /// A step answered with null
    #[error("{0} unavailable")]
    Missing(Stage),
    /// A step failed outright (missing member, thrown exception, type mismatch)
    #[error("{stage} failed: {reason}")]
    Failed { stage: Stage, reason: String },
}

impl ProbeError {
    pub fn failed(stage: Stage, reason: impl Into<String>) -> Self {
        Self::Failed {
            stage,
            reason: reason.into(),
        }
    }

    /// The stage that produced this error, if any
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Unavailable => None,
            Self::Missing(stage) | Self::Failed { stage, .. } => Some(*stage),
        }
    }
}

/// Result type alias for probe steps
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Turns a nullable step result into a hard requirement
pub trait Required<T> {
    fn required(self, stage: Stage) -> ProbeResult<T>;
}

impl<T> Required<T> for Option<T> {
    fn required(self, stage: Stage) -> ProbeResult<T> {
        self.ok_or(ProbeError::Missing(stage))
    }
}

/// Outcome of looking up the root entry point
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability<T> {
    Available(T),
    Unavailable,
}

impl<T> Capability<T> {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    pub fn into_result(self) -> ProbeResult<T> {
        match self {
            Self::Available(api) => Ok(api),
            Self::Unavailable => Err(ProbeError::Unavailable),
        }
    }
}

impl<T> From<Option<T>> for Capability<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(api) => Self::Available(api),
            None => Self::Unavailable,
        }
    }
}

/// Injected source of the optional API
///
/// Resolved afresh on every prober operation.
pub trait CapabilityProvider {
    type Api: CarApi;

    fn resolve(&self) -> Capability<Self::Api>;
}

/// The root entry point of the Car API
pub trait CarApi {
    type Connection: CarConnection;

    /// Open a connection bound to the caller's context
    fn connect(&self) -> ProbeResult<Option<Self::Connection>>;

    /// Name of the property service, read from a well-known constant
    fn property_service_name(&self) -> ProbeResult<Option<String>>;

    /// Every named integer constant of the property id registry,
    /// in enumeration order. Unreadable constants are left out.
    fn registry(&self) -> ProbeResult<Vec<RegistryConstant>>;

    /// The area id that addresses vehicle-wide properties
    fn global_area(&self) -> ProbeResult<i32>;
}

/// An open connection; released by [`crate::prober::ConnectionGuard`]
pub trait CarConnection {
    type Manager: PropertyManager;

    fn property_manager(&mut self, service: &str) -> ProbeResult<Option<Self::Manager>>;

    fn disconnect(&mut self) -> ProbeResult<()>;
}

/// Handle to the property service
pub trait PropertyManager {
    type Property: CarProperty;
    type Config: PropertyConfig;

    fn get_property(&self, id: PropertyId, area: i32) -> ProbeResult<Option<Self::Property>>;

    fn property_list(&self) -> ProbeResult<Vec<Self::Config>>;
}

/// A property value object returned by the service
pub trait CarProperty {
    /// Read the public `value` attribute. `Err` when the attribute is absent.
    fn value_attribute(&self) -> ProbeResult<Option<PropertyValue>>;

    /// Read the value through its getter
    fn value_getter(&self) -> ProbeResult<Option<PropertyValue>>;

    /// Attribute first, getter second; absent when neither yields a value
    fn value(&self) -> Option<PropertyValue> {
        match self.value_attribute() {
            Ok(value) => value,
            Err(_) => self.value_getter().unwrap_or(None),
        }
    }
}

/// One entry of the supported property list
pub trait PropertyConfig {
    fn property_id(&self) -> ProbeResult<PropertyId>;

    fn area_type(&self) -> ProbeResult<Option<String>>;

    /// Runtime type name of the entry, when it can be determined
    fn type_name(&self) -> Option<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    struct GetterOnly(Option<PropertyValue>);

    impl CarProperty for GetterOnly {
        fn value_attribute(&self) -> ProbeResult<Option<PropertyValue>> {
            Err(ProbeError::failed(Stage::ReadValue, "no field value"))
        }

        fn value_getter(&self) -> ProbeResult<Option<PropertyValue>> {
            Ok(self.0.clone())
        }
    }

    struct Broken;

    impl CarProperty for Broken {
        fn value_attribute(&self) -> ProbeResult<Option<PropertyValue>> {
            Err(ProbeError::failed(Stage::ReadValue, "no field value"))
        }

        fn value_getter(&self) -> ProbeResult<Option<PropertyValue>> {
            Err(ProbeError::failed(Stage::ReadValue, "no method getValue"))
        }
    }

    #[test]
    fn test_value_falls_back_to_getter() {
        let property = GetterOnly(Some(PropertyValue::Int(4)));
        assert_eq!(property.value(), Some(PropertyValue::Int(4)));
    }

    #[test]
    fn test_value_absent_when_both_reads_fail() {
        assert_eq!(Broken.value(), None);
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(ProbeError::Unavailable.to_string(), "car api not found");
        assert_eq!(
            ProbeError::Missing(Stage::Connect).to_string(),
            "car connection unavailable"
        );
        assert_eq!(
            ProbeError::failed(Stage::ReadProperty, "IllegalArgumentException").to_string(),
            "property read failed: IllegalArgumentException"
        );
    }

    #[test]
    fn test_required() {
        assert_eq!(Some(3).required(Stage::GlobalArea), Ok(3));
        assert_eq!(
            None::<i32>.required(Stage::PropertyManager),
            Err(ProbeError::Missing(Stage::PropertyManager))
        );
    }

    #[test]
    fn test_capability_conversion() {
        assert!(Capability::from(Some(1)).is_available());
        assert_eq!(
            Capability::<i32>::from(None).into_result(),
            Err(ProbeError::Unavailable)
        );
    }
}
