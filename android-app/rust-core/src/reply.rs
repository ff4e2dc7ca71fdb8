//! JSON envelope returned by `CarInfoBridge.handleCall`.
//!
//! The Kotlin side maps each status onto the platform channel result:
//!
//! ```text
//! {"status":"success","result":{...}}                         -> result.success(...)
//! {"status":"error","code":"INVALID_ARG","message":...}       -> result.error(...)
//! {"status":"notImplemented"}                                 -> result.notImplemented()
//! ```

use carinfo_shared::{DispatchError, Reply};
use serde::Serialize;

use crate::BridgeError;

pub const INVALID_ARG: &str = "INVALID_ARG";
pub const INTERNAL_ERROR: &str = "ERROR";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Envelope {
    Success {
        result: Reply,
    },
    Error {
        code: &'static str,
        message: String,
        details: Option<String>,
    },
    NotImplemented,
}

impl Envelope {
    pub fn internal(details: impl Into<String>) -> Self {
        Self::Error {
            code: INTERNAL_ERROR,
            message: "internal error".into(),
            details: Some(details.into()),
        }
    }

    pub fn to_json(&self) -> Result<String, BridgeError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl From<Reply> for Envelope {
    fn from(result: Reply) -> Self {
        Self::Success { result }
    }
}

impl From<DispatchError> for Envelope {
    fn from(error: DispatchError) -> Self {
        match error {
            DispatchError::NotImplemented { .. } => Self::NotImplemented,
            DispatchError::InvalidArgument { reason } => Self::Error {
                code: INVALID_ARG,
                message: reason,
                details: None,
            },
        }
    }
}

impl From<Result<Reply, DispatchError>> for Envelope {
    fn from(result: Result<Reply, DispatchError>) -> Self {
        result.map_or_else(Self::from, Self::from)
    }
}

impl From<BridgeError> for Envelope {
    fn from(error: BridgeError) -> Self {
        Self::internal(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carinfo_shared::dispatch::handle;
    use carinfo_shared::sim::{Fault, SimulatedCar};
    use carinfo_shared::{Argument, CapabilityProber, PropertyValue, Stage};
    use serde_json::{json, Value};

    fn call(car: SimulatedCar, method: &str, argument: Argument) -> Value {
        let prober = CapabilityProber::new(car);
        let json = Envelope::from(handle(&prober, method, &argument))
            .to_json()
            .unwrap();
        serde_json::from_str(&json).unwrap()
    }

    #[test]
    fn test_park_state_envelope() {
        let car = SimulatedCar::new()
            .with_constant("PARK_BRAKE_ON", 287310850)
            .with_value(287310850, PropertyValue::Bool(true));
        assert_eq!(
            call(car, "isCarParked", Argument::None),
            json!({
                "status": "success",
                "result": { "parked": true, "property": "PARK_BRAKE_ON", "rawValue": "true" }
            })
        );
    }

    #[test]
    fn test_park_state_without_car_api() {
        assert_eq!(
            call(SimulatedCar::unavailable(), "isCarParked", Argument::None),
            json!({
                "status": "success",
                "result": { "parked": true, "property": null, "rawValue": null }
            })
        );
    }

    #[test]
    fn test_list_with_unreachable_service() {
        let car = SimulatedCar::new().with_fault(Stage::Connect, Fault::Fail);
        assert_eq!(
            call(car, "listCarProperties", Argument::None),
            json!({ "status": "success", "result": [] })
        );
    }

    #[test]
    fn test_read_invalid_argument() {
        assert_eq!(
            call(
                SimulatedCar::new(),
                "readPropertyById",
                Argument::Text("abc".into())
            ),
            json!({
                "status": "error",
                "code": "INVALID_ARG",
                "message": "invalid property id",
                "details": null
            })
        );
    }

    #[test]
    fn test_read_against_missing_car_api() {
        assert_eq!(
            call(SimulatedCar::unavailable(), "readPropertyById", Argument::Int(42)),
            json!({
                "status": "success",
                "result": { "propertyId": 42, "rawValue": null, "error": "car api not found" }
            })
        );
    }

    #[test]
    fn test_unknown_method() {
        assert_eq!(
            call(SimulatedCar::new(), "openSunroof", Argument::None),
            json!({ "status": "notImplemented" })
        );
    }

    #[test]
    fn test_internal_error_envelope() {
        let json: Value = serde_json::from_str(
            &Envelope::from(BridgeError::Config("bad".into()))
                .to_json()
                .unwrap(),
        )
        .unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["code"], "ERROR");
        assert_eq!(json["details"], "config error: bad");
    }
}
