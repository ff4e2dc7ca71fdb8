//! # JNI Car API
//!
//! Implements the capability traits on top of the Android Car library, looked
//! up by name at runtime. The library is optional: on most phones
//! `android.car.Car` does not exist and [`JniCarProvider::resolve`] answers
//! `Unavailable`.
//!
//! ## Reference Handling
//!
//! Every step runs inside its own JNI local frame and hands back only global
//! references or plain Rust data. Registry enumeration opens a nested frame
//! per field so large registries cannot exhaust the local reference table.
//! A Java exception raised by any step is described, cleared and returned as
//! a [`ProbeError`].

use std::sync::Arc;

use carinfo_shared::{
    Capability, CapabilityProvider, CarApi, CarConnection, CarProperty, ProbeError, ProbeResult,
    PropertyConfig, PropertyId, PropertyManager, PropertyValue, RegistryConstant, Stage,
};
use jni::errors::Result as JniResult;
use jni::objects::{GlobalRef, JObject, JObjectArray, JValue};
use jni::{JNIEnv, JavaVM};
use log::{debug, warn};

use crate::config::CarApiNames;
use crate::convert::{java_string, property_value, take_exception};
use crate::BridgeError;

/// Local references a single step may hold at once
const STEP_FRAME_CAPACITY: i32 = 32;
/// Local references used while reading one registry field
const ENTRY_FRAME_CAPACITY: i32 = 8;

/// VM handle and names, shared by every object of one probe
#[derive(Clone)]
struct Jvm {
    vm: Arc<JavaVM>,
    names: Arc<CarApiNames>,
}

impl Jvm {
    /// Run `f` in a local frame on the current thread
    fn with_env<T>(
        &self,
        stage: Stage,
        f: impl FnOnce(&mut JNIEnv) -> JniResult<T>,
    ) -> ProbeResult<T> {
        let mut env = self
            .vm
            .attach_current_thread()
            .map_err(|e| ProbeError::failed(stage, e.to_string()))?;
        env.with_local_frame(STEP_FRAME_CAPACITY, f)
            .map_err(|e| failure(&mut env, stage, e))
    }
}

/// Describe a failed step, preferring the pending Java exception
fn failure(env: &mut JNIEnv, stage: Stage, error: jni::errors::Error) -> ProbeError {
    let reason = take_exception(env).unwrap_or_else(|| error.to_string());
    ProbeError::failed(stage, reason)
}

fn global(env: &mut JNIEnv, object: &JObject) -> JniResult<Option<GlobalRef>> {
    if object.is_null() {
        Ok(None)
    } else {
        env.new_global_ref(object).map(Some)
    }
}

/// Resolves the Car API for one call, bound to the caller's `Context`
pub struct JniCarProvider {
    jvm: Jvm,
    context: GlobalRef,
}

impl JniCarProvider {
    pub fn new(env: &mut JNIEnv, context: &JObject, names: CarApiNames) -> Result<Self, BridgeError> {
        let vm = env.get_java_vm()?;
        let context = env.new_global_ref(context)?;
        Ok(Self {
            jvm: Jvm {
                vm: Arc::new(vm),
                names: Arc::new(names),
            },
            context,
        })
    }
}

impl CapabilityProvider for JniCarProvider {
    type Api = JniCarApi;

    fn resolve(&self) -> Capability<JniCarApi> {
        let car_class = self.jvm.names.car_class.as_str();
        match self
            .jvm
            .with_env(Stage::EntryPoint, |env| env.find_class(car_class).map(|_| ()))
        {
            Ok(()) => Capability::Available(JniCarApi {
                jvm: self.jvm.clone(),
                context: self.context.clone(),
            }),
            Err(e) => {
                warn!("Class {car_class} not found: {e}");
                Capability::Unavailable
            }
        }
    }
}

/// `android.car.Car` and its companion registries
pub struct JniCarApi {
    jvm: Jvm,
    context: GlobalRef,
}

impl CarApi for JniCarApi {
    type Connection = JniCar;

    fn connect(&self) -> ProbeResult<Option<JniCar>> {
        let names = &self.jvm.names;
        let car = self.jvm.with_env(Stage::Connect, |env| {
            let car = env
                .call_static_method(
                    names.car_class.as_str(),
                    "createCar",
                    names.create_car_sig(),
                    &[JValue::Object(self.context.as_obj())],
                )?
                .l()?;
            global(env, &car)
        })?;

        Ok(car.map(|car| JniCar {
            jvm: self.jvm.clone(),
            car,
        }))
    }

    fn property_service_name(&self) -> ProbeResult<Option<String>> {
        let names = &self.jvm.names;
        self.jvm.with_env(Stage::ServiceName, |env| {
            let name = env
                .get_static_field(
                    names.car_class.as_str(),
                    names.property_service_field.as_str(),
                    "Ljava/lang/String;",
                )?
                .l()?;
            if name.is_null() {
                return Ok(None);
            }
            java_string(env, &name).map(Some)
        })
    }

    fn registry(&self) -> ProbeResult<Vec<RegistryConstant>> {
        let names = &self.jvm.names;
        self.jvm.with_env(Stage::Registry, |env| {
            let class = env.find_class(names.property_ids_class.as_str())?;
            let fields = env
                .call_method(&class, "getFields", "()[Ljava/lang/reflect/Field;", &[])?
                .l()?;
            let fields = JObjectArray::from(fields);
            let count = env.get_array_length(&fields)?;

            let mut constants = Vec::with_capacity(usize::try_from(count).unwrap_or_default());
            for index in 0..count {
                let constant = env.with_local_frame(ENTRY_FRAME_CAPACITY, |env| -> JniResult<_> {
                    let field = env.get_object_array_element(&fields, index)?;
                    let name = env
                        .call_method(&field, "getName", "()Ljava/lang/String;", &[])?
                        .l()?;
                    let name = java_string(env, &name)?;
                    let id = env
                        .call_method(
                            &field,
                            "getInt",
                            "(Ljava/lang/Object;)I",
                            &[JValue::Object(&JObject::null())],
                        )?
                        .i()?;
                    Ok(RegistryConstant::new(name, id))
                });

                match constant {
                    Ok(constant) => constants.push(constant),
                    // Non-int or instance fields
                    Err(e) => {
                        let reason = take_exception(env).unwrap_or_else(|| e.to_string());
                        debug!("Skipping registry field {index}: {reason}");
                    }
                }
            }
            Ok(constants)
        })
    }

    fn global_area(&self) -> ProbeResult<i32> {
        let names = &self.jvm.names;
        self.jvm.with_env(Stage::GlobalArea, |env| {
            env.get_static_field(
                names.area_type_class.as_str(),
                names.global_area_field.as_str(),
                "I",
            )?
            .i()
        })
    }
}

/// A connected `android.car.Car` instance
pub struct JniCar {
    jvm: Jvm,
    car: GlobalRef,
}

impl CarConnection for JniCar {
    type Manager = JniPropertyManager;

    fn property_manager(&mut self, service: &str) -> ProbeResult<Option<JniPropertyManager>> {
        let manager = self.jvm.with_env(Stage::PropertyManager, |env| {
            let service = env.new_string(service)?;
            let manager = env
                .call_method(
                    &self.car,
                    "getCarManager",
                    "(Ljava/lang/String;)Ljava/lang/Object;",
                    &[JValue::Object(&service)],
                )?
                .l()?;
            global(env, &manager)
        })?;

        Ok(manager.map(|manager| JniPropertyManager {
            jvm: self.jvm.clone(),
            manager,
        }))
    }

    fn disconnect(&mut self) -> ProbeResult<()> {
        self.jvm.with_env(Stage::Disconnect, |env| {
            env.call_method(&self.car, "disconnect", "()V", &[])
                .map(|_| ())
        })
    }
}

/// `CarPropertyManager`
pub struct JniPropertyManager {
    jvm: Jvm,
    manager: GlobalRef,
}

impl PropertyManager for JniPropertyManager {
    type Property = JniCarProperty;
    type Config = JniPropertyConfig;

    fn get_property(&self, id: PropertyId, area: i32) -> ProbeResult<Option<JniCarProperty>> {
        let sig = self.jvm.names.get_property_sig();
        let value = self.jvm.with_env(Stage::ReadProperty, |env| {
            let value = env
                .call_method(
                    &self.manager,
                    "getProperty",
                    sig.as_str(),
                    &[JValue::Int(id), JValue::Int(area)],
                )?
                .l()?;
            global(env, &value)
        })?;

        Ok(value.map(|value| JniCarProperty {
            jvm: self.jvm.clone(),
            value,
        }))
    }

    fn property_list(&self) -> ProbeResult<Vec<JniPropertyConfig>> {
        let configs = self.jvm.with_env(Stage::PropertyList, |env| {
            let list = env
                .call_method(&self.manager, "getPropertyList", "()Ljava/util/List;", &[])?
                .l()?;
            if list.is_null() || !env.is_instance_of(&list, "java/util/Collection")? {
                return Ok(Vec::new());
            }

            let array = env
                .call_method(&list, "toArray", "()[Ljava/lang/Object;", &[])?
                .l()?;
            let array = JObjectArray::from(array);
            let count = env.get_array_length(&array)?;

            let mut configs = Vec::with_capacity(usize::try_from(count).unwrap_or_default());
            for index in 0..count {
                let config = env.get_object_array_element(&array, index)?;
                if let Some(config) = global(env, &config)? {
                    configs.push(config);
                }
                env.delete_local_ref(config)?;
            }
            Ok(configs)
        })?;

        Ok(configs
            .into_iter()
            .map(|config| JniPropertyConfig {
                jvm: self.jvm.clone(),
                config,
            })
            .collect())
    }
}

/// `CarPropertyValue`
pub struct JniCarProperty {
    jvm: Jvm,
    value: GlobalRef,
}

impl CarProperty for JniCarProperty {
    fn value_attribute(&self) -> ProbeResult<Option<PropertyValue>> {
        self.jvm.with_env(Stage::ReadValue, |env| {
            let value = env
                .get_field(&self.value, "value", "Ljava/lang/Object;")?
                .l()?;
            property_value(env, &value)
        })
    }

    fn value_getter(&self) -> ProbeResult<Option<PropertyValue>> {
        self.jvm.with_env(Stage::ReadValue, |env| {
            let value = env
                .call_method(&self.value, "getValue", "()Ljava/lang/Object;", &[])?
                .l()?;
            property_value(env, &value)
        })
    }
}

/// `CarPropertyConfig`
pub struct JniPropertyConfig {
    jvm: Jvm,
    config: GlobalRef,
}

impl PropertyConfig for JniPropertyConfig {
    fn property_id(&self) -> ProbeResult<PropertyId> {
        self.jvm.with_env(Stage::ConfigEntry, |env| {
            env.call_method(&self.config, "getPropertyId", "()I", &[])?
                .i()
        })
    }

    fn area_type(&self) -> ProbeResult<Option<String>> {
        self.jvm.with_env(Stage::ConfigEntry, |env| {
            let area = env
                .call_method(&self.config, "getAreaType", "()I", &[])?
                .i()?;
            Ok(Some(area.to_string()))
        })
    }

    fn type_name(&self) -> Option<String> {
        self.jvm
            .with_env(Stage::ConfigEntry, |env| {
                let class = env.get_object_class(&self.config)?;
                let name = env
                    .call_method(&class, "getName", "()Ljava/lang/String;", &[])?
                    .l()?;
                java_string(env, &name)
            })
            .ok()
    }
}
