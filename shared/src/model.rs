//! # Probe Result Types
//!
//! Transient records built fresh on every call and handed to the bridge.
//! Nothing here is cached or mutated after construction.
//!
//! ## Wire Keys
//!
//! The records serialize to the maps the Android UI already consumes:
//!
//! ```text
//! ParkStateResult     { parked, property, rawValue }
//! PropertyDescriptor  { propertyId, propertyName, areaType, rawObjectClass }
//! PropertyReadResult  { propertyId, rawValue, error }
//! ```

use alloc::string::String;
use core::fmt;
use serde::Serialize;

/// Integer id of a vehicle property, as exposed by the property registry
pub type PropertyId = i32;

/// A typed reading taken from a property value object
///
/// `Display` renders the textual form reported in `rawValue`.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    Int(i32),
    Long(i64),
    /// Floating-point reading in the textual form of its source, e.g.
    /// `1.0E10` or `Infinity`
    Decimal(String),
    Text(String),
    /// Any other object, carried as its textual form
    Other(String),
}

impl PropertyValue {
    /// Boolean content, if this reading is boolean-typed
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Long(value) => write!(f, "{value}"),
            Self::Decimal(value) | Self::Text(value) | Self::Other(value) => f.write_str(value),
        }
    }
}

/// A named integer constant enumerated from the property id registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConstant {
    pub name: String,
    pub id: PropertyId,
}

impl RegistryConstant {
    pub fn new(name: impl Into<String>, id: PropertyId) -> Self {
        Self { name: name.into(), id }
    }
}

/// Outcome of the park state probe
///
/// `parked` is always present and defaults to `true`. The property name and
/// raw value are set together or not at all, so the fields stay private.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParkStateResult {
    parked: bool,
    #[serde(rename = "property")]
    property_name: Option<String>,
    raw_value: Option<String>,
}

impl ParkStateResult {
    /// The value returned whenever nothing usable was found: assume parked
    pub const fn fail_safe() -> Self {
        Self {
            parked: true,
            property_name: None,
            raw_value: None,
        }
    }

    /// A successful reading of `property_name`
    pub fn found(parked: bool, property_name: impl Into<String>, raw_value: impl Into<String>) -> Self {
        Self {
            parked,
            property_name: Some(property_name.into()),
            raw_value: Some(raw_value.into()),
        }
    }

    pub fn parked(&self) -> bool {
        self.parked
    }

    pub fn property_name(&self) -> Option<&str> {
        self.property_name.as_deref()
    }

    pub fn raw_value(&self) -> Option<&str> {
        self.raw_value.as_deref()
    }

    /// Whether this is the fail-safe default
    pub fn is_fail_safe(&self) -> bool {
        *self == Self::fail_safe()
    }
}

impl Default for ParkStateResult {
    fn default() -> Self {
        Self::fail_safe()
    }
}

/// One entry of the supported property list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyDescriptor {
    #[serde(rename = "propertyId")]
    pub id: PropertyId,
    /// Resolved from the registry when the id is known
    #[serde(rename = "propertyName")]
    pub name: Option<String>,
    #[serde(rename = "areaType")]
    pub area_hint: Option<String>,
    #[serde(rename = "rawObjectClass")]
    pub source_type_name: Option<String>,
}

/// Outcome of a single property read
///
/// Failures are carried in `error` rather than raised. Both fields are absent
/// when the read legitimately returned nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyReadResult {
    #[serde(rename = "propertyId")]
    id: PropertyId,
    raw_value: Option<String>,
    error: Option<String>,
}

impl PropertyReadResult {
    pub fn value(id: PropertyId, raw_value: Option<String>) -> Self {
        Self {
            id,
            raw_value,
            error: None,
        }
    }

    pub fn failed(id: PropertyId, error: impl Into<String>) -> Self {
        Self {
            id,
            raw_value: None,
            error: Some(error.into()),
        }
    }

    pub fn id(&self) -> PropertyId {
        self.id
    }

    pub fn raw_value(&self) -> Option<&str> {
        self.raw_value.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}
