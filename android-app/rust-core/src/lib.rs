//! # Android JNI Rust Core Library
//!
//! This library provides the native backend for the Car Info bridge of the
//! Android app. It handles:
//!
//! - Probing the optional Android Car property service over JNI
//! - Dispatching the UI channel methods onto the probe
//! - Encoding replies as JSON envelopes
//!
//! ## JNI Bridge Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Android App (Kotlin)                       │
//! │                                                                 │
//! │  ┌─────────────────┐     ┌──────────────────────────────────┐  │
//! │  │    UI channel   │────►│      CarInfoBridge (external)    │  │
//! │  └─────────────────┘     └──────────────────────────────────┘  │
//! │                                       │                         │
//! │                                       │ JNI Calls               │
//! │                                       ▼                         │
//! │  ┌──────────────────────────────────────────────────────────┐  │
//! │  │                 carinfo_core (this lib)                   │  │
//! │  │                                                           │  │
//! │  │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────┐   │  │
//! │  │  │  Dispatch   │  │   Prober    │  │   JNI Car API   │   │  │
//! │  │  │  (shared)   │  │  (shared)   │  │   (car.rs)      │   │  │
//! │  │  └─────────────┘  └─────────────┘  └─────────────────┘   │  │
//! │  └──────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## JNI Functions Exported
//!
//! - `Java_com_carinfo_bridge_CarInfoBridge_init`: Install logging and configuration
//! - `Java_com_carinfo_bridge_CarInfoBridge_handleCall`: Run one channel method

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Once, OnceLock};

use carinfo_shared::{CapabilityProber, CapabilityProvider, Request};
use jni::objects::{JClass, JObject, JString};
use jni::sys::{jboolean, jstring, JNI_FALSE, JNI_TRUE};
use jni::JNIEnv;
use log::{debug, error, info, warn, LevelFilter};
use thiserror::Error;

mod car;
pub mod config;
mod convert;
pub mod reply;

pub use car::JniCarProvider;
pub use config::{BridgeConfig, CarApiNames};
pub use reply::Envelope;

// Initialize logging once
static INIT_LOGGER: Once = Once::new();

// Configuration handed to `init`
static CONFIG: OnceLock<BridgeConfig> = OnceLock::new();

/// Errors that can occur in the JNI bridge
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("JNI error: {0}")]
    Jni(#[from] jni::errors::Error),
    #[error("encoding error: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("config error: {0}")]
    Config(String),
}

fn init_logger(config: &BridgeConfig) {
    INIT_LOGGER.call_once(|| {
        android_logger::init_once(
            android_logger::Config::default()
                .with_max_level(config.level_filter().unwrap_or(LevelFilter::Debug))
                .with_tag(config.log_tag.clone()),
        );
    });
}

fn read_config(env: &mut JNIEnv, config: &JString) -> Result<BridgeConfig, BridgeError> {
    if config.is_null() {
        return Ok(BridgeConfig::default());
    }
    let json: String = env.get_string(config)?.into();
    BridgeConfig::from_json(&json)
}

/// Initialize the Rust native library
///
/// Called from Kotlin:
/// ```kotlin
/// external fun init(configJson: String?): Boolean
/// ```
///
/// Returns false when the configuration was rejected; defaults are used then.
#[no_mangle]
pub extern "system" fn Java_com_carinfo_bridge_CarInfoBridge_init(
    mut env: JNIEnv,
    _class: JClass,
    config: JString,
) -> jboolean {
    let parsed = read_config(&mut env, &config);

    let defaults = BridgeConfig::default();
    init_logger(parsed.as_ref().unwrap_or(&defaults));

    info!("Car info core initialized");
    info!("Library version: {}", carinfo_shared::VERSION);

    match accept_config(&CONFIG, parsed) {
        Ok(()) => JNI_TRUE,
        Err(e) => {
            if let Some(exception) = convert::take_exception(&mut env) {
                warn!("Reading configuration threw: {exception}");
            }
            error!("Rejected configuration, using defaults: {e}");
            JNI_FALSE
        }
    }
}

/// Store an accepted configuration; a rejected one leaves `slot` untouched
fn accept_config(
    slot: &OnceLock<BridgeConfig>,
    parsed: Result<BridgeConfig, BridgeError>,
) -> Result<(), BridgeError> {
    if slot.set(parsed?).is_err() {
        warn!("Already initialized, keeping the first configuration");
    }
    Ok(())
}

/// Run one channel method and return the JSON envelope
///
/// Called from Kotlin:
/// ```kotlin
/// external fun handleCall(context: Context, method: String, argument: Any?): String
/// ```
#[no_mangle]
pub extern "system" fn Java_com_carinfo_bridge_CarInfoBridge_handleCall(
    mut env: JNIEnv,
    _class: JClass,
    context: JObject,
    method: JString,
    argument: JObject,
) -> jstring {
    let envelope = handle_call(&mut env, &context, &method, &argument).unwrap_or_else(|e| {
        if let Some(exception) = convert::take_exception(&mut env) {
            warn!("handleCall threw: {exception}");
        }
        error!("handleCall failed: {e}");
        Envelope::from(e)
    });

    let json = match envelope.to_json() {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to encode reply: {e}");
            return std::ptr::null_mut();
        }
    };

    match env.new_string(json) {
        Ok(s) => s.into_raw(),
        Err(e) => {
            error!("Failed to create reply string: {:?}", e);
            std::ptr::null_mut()
        }
    }
}

fn handle_call(
    env: &mut JNIEnv,
    context: &JObject,
    method: &JString,
    argument: &JObject,
) -> Result<Envelope, BridgeError> {
    let method: String = env.get_string(method)?.into();
    let argument = convert::argument(env, argument)?;

    let request = match Request::parse(&method, &argument) {
        Ok(request) => request,
        Err(e) => {
            warn!("Rejected call {method}: {e}");
            return Ok(Envelope::from(e));
        }
    };

    let config = CONFIG.get().cloned().unwrap_or_default();
    // No-op once `init` has run
    init_logger(&config);
    let prober = CapabilityProber::new(JniCarProvider::new(env, context, config.car_api)?);

    Ok(run(request, &prober))
}

/// Dispatch `request`, answering with its fallback if the probe panics
fn run<P: CapabilityProvider>(request: Request, prober: &CapabilityProber<P>) -> Envelope {
    debug!("Dispatching {}", request.method());
    match panic::catch_unwind(AssertUnwindSafe(|| request.dispatch(prober))) {
        Ok(reply) => Envelope::from(reply),
        Err(payload) => {
            let details = panic_message(payload.as_ref());
            error!("{} panicked: {details}", request.method());
            match request.fallback() {
                Some(reply) => Envelope::from(reply),
                None => Envelope::internal(details),
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carinfo_shared::sim::{Fault, SimulatedCar};
    use carinfo_shared::{ParkStateResult, PropertyReadResult, PropertyValue, Reply, Stage};

    #[test]
    fn test_panic_message() {
        let payload = panic::catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload = panic::catch_unwind(|| panic!("code {}", 7)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "code 7");
    }

    fn panicking_read() -> SimulatedCar {
        SimulatedCar::new()
            .with_constant("GEAR_SELECTION", 289408000)
            .with_value(289408000, PropertyValue::Int(4))
            .with_fault(Stage::ReadProperty, Fault::Panic)
    }

    #[test]
    fn test_panicking_park_state_answers_fail_safe() {
        let car = panicking_read();
        let envelope = run(Request::CheckParkState, &CapabilityProber::new(car.clone()));

        assert_eq!(
            envelope,
            Envelope::from(Reply::ParkState(ParkStateResult::fail_safe()))
        );
        assert_eq!(car.reads(), 1);
        assert_eq!(car.disconnects(), 1);
    }

    #[test]
    fn test_panicking_read_answers_internal_error() {
        let car = panicking_read();
        let envelope = run(
            Request::ReadCapabilityById(289408000),
            &CapabilityProber::new(car.clone()),
        );

        let json: serde_json::Value = serde_json::from_str(&envelope.to_json().unwrap()).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["code"], "ERROR");
        assert_eq!(json["details"], "simulated panic at property read");
        assert_eq!(car.disconnects(), 1);
    }

    #[test]
    fn test_run_without_panic() {
        let car = SimulatedCar::new()
            .with_constant("GEAR_SELECTION", 289408000)
            .with_value(289408000, PropertyValue::Int(4));
        let envelope = run(
            Request::ReadCapabilityById(289408000),
            &CapabilityProber::new(car.clone()),
        );

        assert_eq!(
            envelope,
            Envelope::from(Reply::PropertyRead(PropertyReadResult::value(
                289408000,
                Some("4".into())
            )))
        );
        assert_eq!(car.disconnects(), 1);
    }

    #[test]
    fn test_rejected_config_is_not_stored() {
        let slot = OnceLock::new();
        let rejected = BridgeConfig::from_json(r#"{"logLevel":"loud"}"#);
        assert!(rejected.is_err());

        assert!(accept_config(&slot, rejected).is_err());
        assert!(slot.get().is_none());

        let accepted = BridgeConfig::from_json(r#"{"logTag":"CarProbe"}"#).unwrap();
        accept_config(&slot, Ok(accepted.clone())).unwrap();
        assert_eq!(slot.get(), Some(&accepted));
    }

    #[test]
    fn test_first_accepted_config_wins() {
        let slot = OnceLock::new();
        let first = BridgeConfig::from_json(r#"{"logTag":"First"}"#).unwrap();
        let second = BridgeConfig::from_json(r#"{"logTag":"Second"}"#).unwrap();

        accept_config(&slot, Ok(first.clone())).unwrap();
        accept_config(&slot, Ok(second)).unwrap();
        assert_eq!(slot.get(), Some(&first));
    }

    #[test]
    fn test_bridge_error_messages() {
        let error = BridgeError::Config("unknown log level: loud".into());
        assert_eq!(error.to_string(), "config error: unknown log level: loud");
    }
}
