//! # Request Dispatch
//!
//! Maps the three channel methods the UI calls onto prober operations.
//!
//! | Method | Request | Reply |
//! |---|---|---|
//! | `isCarParked` | [`Request::CheckParkState`] | [`Reply::ParkState`] |
//! | `listCarProperties` | [`Request::ListCapabilities`] | [`Reply::Capabilities`] |
//! | `readPropertyById` | [`Request::ReadCapabilityById`] | [`Reply::PropertyRead`] |
//!
//! Only an unparseable property id or an unknown method reach the caller as
//! errors; everything else is folded into the reply.

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use serde::Serialize;
use thiserror::Error;

use crate::model::{ParkStateResult, PropertyDescriptor, PropertyId, PropertyReadResult};
use crate::prober::CapabilityProber;
use crate::traits::CapabilityProvider;

pub const CHECK_PARK_STATE: &str = "isCarParked";
pub const LIST_CAPABILITIES: &str = "listCarProperties";
pub const READ_CAPABILITY_BY_ID: &str = "readPropertyById";

/// Id value historically used by callers to mean "no id"
pub const INVALID_PROPERTY_ID: PropertyId = -1;

/// Argument attached to a channel call
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    None,
    Int(i64),
    Number(f64),
    Text(String),
    /// Any other object kind
    Other,
}

impl Argument {
    /// Interpret the argument as a property id
    ///
    /// Integers must fit in `i32`, numbers are truncated toward zero and text
    /// must be a signed decimal integer. The `-1` sentinel is rejected.
    pub fn to_property_id(&self) -> Result<PropertyId, DispatchError> {
        let id = match self {
            Self::Int(value) => PropertyId::try_from(*value).ok(),
            // `as` saturates and maps NaN to zero
            Self::Number(value) => Some(*value as PropertyId),
            Self::Text(text) => text.parse::<PropertyId>().ok(),
            Self::None | Self::Other => None,
        };

        match id {
            Some(id) if id != INVALID_PROPERTY_ID => Ok(id),
            _ => Err(DispatchError::InvalidArgument {
                reason: String::from("invalid property id"),
            }),
        }
    }
}

/// Errors reported to the caller instead of a reply
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("{reason}")]
    InvalidArgument { reason: String },
    #[error("method not implemented: {method}")]
    NotImplemented { method: String },
}

/// A parsed channel call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    CheckParkState,
    ListCapabilities,
    ReadCapabilityById(PropertyId),
}

impl Request {
    pub fn parse(method: &str, argument: &Argument) -> Result<Self, DispatchError> {
        match method {
            CHECK_PARK_STATE => Ok(Self::CheckParkState),
            LIST_CAPABILITIES => Ok(Self::ListCapabilities),
            READ_CAPABILITY_BY_ID => argument.to_property_id().map(Self::ReadCapabilityById),
            _ => Err(DispatchError::NotImplemented {
                method: method.to_string(),
            }),
        }
    }

    pub fn method(&self) -> &'static str {
        match self {
            Self::CheckParkState => CHECK_PARK_STATE,
            Self::ListCapabilities => LIST_CAPABILITIES,
            Self::ReadCapabilityById(_) => READ_CAPABILITY_BY_ID,
        }
    }

    /// Run the request against the prober
    pub fn dispatch<P: CapabilityProvider>(self, prober: &CapabilityProber<P>) -> Reply {
        match self {
            Self::CheckParkState => Reply::ParkState(prober.probe_park_state()),
            Self::ListCapabilities => Reply::Capabilities(prober.list_capabilities()),
            Self::ReadCapabilityById(id) => Reply::PropertyRead(prober.read_capability_by_id(id)),
        }
    }

    /// Reply to use when the operation itself aborted
    ///
    /// Park and list requests still answer with their fallback value; a read
    /// has no meaningful fallback and reports the abort instead.
    pub fn fallback(&self) -> Option<Reply> {
        match self {
            Self::CheckParkState => Some(Reply::ParkState(ParkStateResult::fail_safe())),
            Self::ListCapabilities => Some(Reply::Capabilities(Vec::new())),
            Self::ReadCapabilityById(_) => None,
        }
    }
}

/// Successful reply payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    ParkState(ParkStateResult),
    Capabilities(Vec<PropertyDescriptor>),
    PropertyRead(PropertyReadResult),
}

/// Parse and run one channel call
pub fn handle<P: CapabilityProvider>(
    prober: &CapabilityProber<P>,
    method: &str,
    argument: &Argument,
) -> Result<Reply, DispatchError> {
    Request::parse(method, argument).map(|request| request.dispatch(prober))
}
