//! Conversions from Java objects to probe types.

use carinfo_shared::{Argument, PropertyValue};
use jni::errors::Result as JniResult;
use jni::objects::{JObject, JString};
use jni::JNIEnv;

const INTEGRAL_CLASSES: [&str; 4] = [
    "java/lang/Integer",
    "java/lang/Long",
    "java/lang/Short",
    "java/lang/Byte",
];

pub(crate) fn java_string(env: &mut JNIEnv, value: &JObject) -> JniResult<String> {
    let value = <&JString>::from(value);
    Ok(env.get_string(value)?.into())
}

/// `Object.toString()`, with `"null"` for a null result
pub(crate) fn to_string(env: &mut JNIEnv, value: &JObject) -> JniResult<String> {
    let text = env
        .call_method(value, "toString", "()Ljava/lang/String;", &[])?
        .l()?;
    if text.is_null() {
        return Ok("null".into());
    }
    java_string(env, &text)
}

/// Clear the pending Java exception, if any, and describe it
pub(crate) fn take_exception(env: &mut JNIEnv) -> Option<String> {
    if !env.exception_check().unwrap_or(false) {
        return None;
    }
    let throwable = env.exception_occurred();
    let _ = env.exception_clear();

    let description = throwable.ok().and_then(|throwable| to_string(env, &throwable).ok());
    // toString itself may have thrown
    let _ = env.exception_clear();
    Some(description.unwrap_or_else(|| "java exception".into()))
}

/// Typed reading of a property value object
pub(crate) fn property_value(
    env: &mut JNIEnv,
    value: &JObject,
) -> JniResult<Option<PropertyValue>> {
    if value.is_null() {
        return Ok(None);
    }

    let value = if env.is_instance_of(value, "java/lang/Boolean")? {
        PropertyValue::Bool(env.call_method(value, "booleanValue", "()Z", &[])?.z()?)
    } else if env.is_instance_of(value, "java/lang/Integer")? {
        PropertyValue::Int(env.call_method(value, "intValue", "()I", &[])?.i()?)
    } else if env.is_instance_of(value, "java/lang/Long")? {
        PropertyValue::Long(env.call_method(value, "longValue", "()J", &[])?.j()?)
    } else if env.is_instance_of(value, "java/lang/Float")?
        || env.is_instance_of(value, "java/lang/Double")?
    {
        // Java spells these differently from Rust (`1.0E10`, `Infinity`)
        PropertyValue::Decimal(to_string(env, value)?)
    } else if env.is_instance_of(value, "java/lang/String")? {
        PropertyValue::Text(java_string(env, value)?)
    } else {
        PropertyValue::Other(to_string(env, value)?)
    };
    Ok(Some(value))
}

/// Channel call argument
pub(crate) fn argument(env: &mut JNIEnv, value: &JObject) -> JniResult<Argument> {
    if value.is_null() {
        return Ok(Argument::None);
    }

    for class in INTEGRAL_CLASSES {
        if env.is_instance_of(value, class)? {
            let value = env.call_method(value, "longValue", "()J", &[])?.j()?;
            return Ok(Argument::Int(value));
        }
    }

    if env.is_instance_of(value, "java/lang/Number")? {
        let value = env.call_method(value, "doubleValue", "()D", &[])?.d()?;
        Ok(Argument::Number(value))
    } else if env.is_instance_of(value, "java/lang/String")? {
        Ok(Argument::Text(java_string(env, value)?))
    } else {
        Ok(Argument::Other)
    }
}
