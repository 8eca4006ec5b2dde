//! JavaScript/JSON value conversion utilities.

use boa_engine::object::JsObject;
use boa_engine::object::builtins::JsArray;
use boa_engine::{Context, JsResult, JsValue};
use serde_json::{Map, Number, Value};

/// Convert a JS value to JSON.
///
/// # Errors
/// Returns an error if property access during conversion fails.
pub fn js_value_to_json(value: &JsValue, context: &mut Context) -> JsResult<Value> {
    if value.is_null() || value.is_undefined() {
        Ok(Value::Null)
    } else if let Some(boolean) = value.as_boolean() {
        Ok(Value::Bool(boolean))
    } else if let Some(number) = value.as_number() {
        // Whole finite numbers come back as integers.
        if number.fract().abs() < f64::EPSILON && number.is_finite() {
            let int_value = number.round() as i64;
            Ok(Value::Number(Number::from(int_value)))
        } else {
            Ok(Number::from_f64(number).map_or(Value::Null, Value::Number))
        }
    } else if let Some(string) = value.as_string() {
        Ok(Value::String(string.to_std_string_escaped()))
    } else if let Some(object) = value.as_object() {
        if object.is_array() {
            let length = object
                .get(boa_engine::js_string!("length"), context)?
                .to_u32(context)
                .unwrap_or(0);
            let mut array = Vec::new();
            for index in 0..length {
                let element = object.get(index, context)?;
                array.push(js_value_to_json(&element, context)?);
            }
            Ok(Value::Array(array))
        } else {
            let mut map = Map::new();
            for key in object.own_property_keys(context)? {
                let key_value = JsValue::from(key.clone());
                let key_string = key_value.to_string(context)?;
                let property = object.get(key.clone(), context)?;
                map.insert(
                    key_string.to_std_string_escaped(),
                    js_value_to_json(&property, context)?,
                );
            }
            Ok(Value::Object(map))
        }
    } else {
        Ok(Value::String(value.display().to_string()))
    }
}

/// Convert JSON to a JS value.
///
/// # Errors
/// Returns an error if object or array construction fails.
pub fn json_to_js_value(value: &Value, context: &mut Context) -> JsResult<JsValue> {
    match value {
        Value::Null => Ok(JsValue::null()),
        Value::Bool(boolean) => Ok(JsValue::from(*boolean)),
        Value::Number(number) => number.as_i64().map_or_else(
            || {
                number
                    .as_f64()
                    .map_or_else(|| Ok(JsValue::from(0)), |float| Ok(JsValue::from(float)))
            },
            |int| Ok(JsValue::from(int)),
        ),
        Value::String(string) => Ok(JsValue::from(boa_engine::js_string!(string.as_str()))),
        Value::Array(array) => {
            let js_array = JsArray::new(context);
            for (index, item) in array.iter().enumerate() {
                let js_item = json_to_js_value(item, context)?;
                js_array.set(index, js_item, true, context)?;
            }
            Ok(js_array.into())
        }
        Value::Object(object) => {
            let js_object = JsObject::with_object_proto(context.intrinsics());
            for (key, item) in object {
                let js_item = json_to_js_value(item, context)?;
                js_object.set(boa_engine::js_string!(key.as_str()), js_item, true, context)?;
            }
            Ok(js_object.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_round_trip_object() {
        let mut context = Context::default();
        let original = json!({
            "name": "read_file",
            "count": 3,
            "ratio": 0.5,
            "flags": [true, false],
            "nested": { "ok": null }
        });
        let js = json_to_js_value(&original, &mut context).unwrap();
        let back = js_value_to_json(&js, &mut context).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn test_whole_floats_become_integers() {
        let mut context = Context::default();
        let js = JsValue::from(4.0_f64);
        let back = js_value_to_json(&js, &mut context).unwrap();
        assert_eq!(back, json!(4));
    }
}
