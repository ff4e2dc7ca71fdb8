//! Bridge configuration, passed as JSON to `CarInfoBridge.init`.
//!
//! Every field is optional:
//!
//! ```json
//! {
//!   "logTag": "CarInfoCore",
//!   "logLevel": "debug",
//!   "carApi": { "carClass": "android/car/Car" }
//! }
//! ```

use std::str::FromStr;

use log::LevelFilter;
use serde::Deserialize;

use crate::BridgeError;

/// Class and member names of the Car API, in JNI notation
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CarApiNames {
    pub car_class: String,
    pub property_service_field: String,
    pub property_ids_class: String,
    pub area_type_class: String,
    pub global_area_field: String,
    pub property_value_class: String,
}

impl Default for CarApiNames {
    fn default() -> Self {
        Self {
            car_class: "android/car/Car".into(),
            property_service_field: "PROPERTY_SERVICE".into(),
            property_ids_class: "android/car/VehiclePropertyIds".into(),
            area_type_class: "android/car/VehicleAreaType".into(),
            global_area_field: "GLOBAL".into(),
            property_value_class: "android/car/hardware/CarPropertyValue".into(),
        }
    }
}

impl CarApiNames {
    /// `Car.createCar(Context)`
    pub fn create_car_sig(&self) -> String {
        format!("(Landroid/content/Context;)L{};", self.car_class)
    }

    /// `CarPropertyManager.getProperty(int, int)`
    pub fn get_property_sig(&self) -> String {
        format!("(II)L{};", self.property_value_class)
    }
}

/// Configuration for the JNI bridge
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BridgeConfig {
    /// Logcat tag
    pub log_tag: String,
    /// Maximum log level (`off`, `error`, `warn`, `info`, `debug`, `trace`)
    pub log_level: String,
    pub car_api: CarApiNames,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            log_tag: "CarInfoCore".into(),
            log_level: "debug".into(),
            car_api: CarApiNames::default(),
        }
    }
}

impl BridgeConfig {
    /// Parse a JSON configuration; blank input yields the defaults
    pub fn from_json(json: &str) -> Result<Self, BridgeError> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self =
            serde_json::from_str(json).map_err(|e| BridgeError::Config(e.to_string()))?;
        config.level_filter()?;
        Ok(config)
    }

    pub fn level_filter(&self) -> Result<LevelFilter, BridgeError> {
        LevelFilter::from_str(&self.log_level)
            .map_err(|_| BridgeError::Config(format!("unknown log level: {}", self.log_level)))
    }
}
