//! Conversions between Python values and prop values / patch JSON
use crate::errors::ReconcilerError;
use crate::props::{PropObject, PropValue};
use crate::types::{Identity, Key};
use indexmap::IndexMap;
use pyo3::prelude::*;
use pyo3::types::{PyBool, PyDict, PyFloat, PyInt, PyList, PyString, PyTuple};
use std::fmt;
use uuid::Uuid;

/// Snapshot of a Python object prop. `to_tuple()` gives it a canonical form,
/// `to_dict()` its patch JSON; without either it is compared through `str()`.
#[derive(Debug)]
pub struct PyObjectProp {
    display: String,
    tuple: Option<Vec<PropValue>>,
    json: Option<serde_json::Value>,
}

impl fmt::Display for PyObjectProp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

impl PropObject for PyObjectProp {
    fn canonical_tuple(&self) -> Option<Vec<PropValue>> {
        self.tuple.clone()
    }

    fn to_json(&self) -> serde_json::Value {
        if let Some(json) = &self.json {
            return json.clone();
        }
        match &self.tuple {
            Some(items) => serde_json::Value::Array(items.iter().map(PropValue::to_json).collect()),
            None => serde_json::Value::String(self.display.clone()),
        }
    }
}

/// Convert an arbitrary Python value into a [`PropValue`]
pub fn py_to_prop_value(obj: &Bound<'_, PyAny>) -> Result<PropValue, ReconcilerError> {
    if obj.is_none() {
        return Ok(PropValue::Null);
    }
    // bool before int: Python bools are ints
    if let Ok(b) = obj.cast::<PyBool>() {
        return Ok(PropValue::Bool(b.is_true()));
    }
    if obj.cast::<PyInt>().is_ok() {
        return Ok(match obj.extract::<i64>() {
            Ok(i) => PropValue::Int(i),
            // Out of i64 range: keep the digits
            Err(_) => PropValue::Str(obj.str()?.to_string()),
        });
    }
    if obj.cast::<PyFloat>().is_ok() {
        return Ok(PropValue::Float(obj.extract::<f64>()?));
    }
    if let Ok(s) = obj.cast::<PyString>() {
        return Ok(PropValue::Str(s.to_str()?.to_string()));
    }
    if let Ok(list) = obj.cast::<PyList>() {
        return list
            .iter()
            .map(|item| py_to_prop_value(&item))
            .collect::<Result<Vec<_>, _>>()
            .map(PropValue::List);
    }
    if let Ok(tuple) = obj.cast::<PyTuple>() {
        return tuple
            .iter()
            .map(|item| py_to_prop_value(&item))
            .collect::<Result<Vec<_>, _>>()
            .map(PropValue::List);
    }
    if let Ok(dict) = obj.cast::<PyDict>() {
        return py_dict_to_props(dict).map(PropValue::Map);
    }
    py_object_prop(obj)
}

/// Dict keys are stringified with `str()`.
pub fn py_dict_to_props(
    dict: &Bound<'_, PyDict>,
) -> Result<IndexMap<String, PropValue>, ReconcilerError> {
    let mut props = IndexMap::with_capacity(dict.len());
    for (key, value) in dict.iter() {
        let key = match key.cast::<PyString>() {
            Ok(s) => s.to_str()?.to_string(),
            Err(_) => key.str()?.to_string(),
        };
        props.insert(key, py_to_prop_value(&value)?);
    }
    Ok(props)
}

fn py_object_prop(obj: &Bound<'_, PyAny>) -> Result<PropValue, ReconcilerError> {
    let tuple = if obj.hasattr("to_tuple")? {
        let raw = obj.call_method0("to_tuple")?;
        match py_to_prop_value(&raw)? {
            PropValue::List(items) => Some(items),
            other => Some(vec![other]),
        }
    } else {
        None
    };

    let json = if obj.hasattr("to_dict")? {
        let raw = obj.call_method0("to_dict")?;
        let dict = raw.cast::<PyDict>().map_err(|_| ReconcilerError::TypeConversionError {
            expected: "dict from to_dict()".into(),
            actual: type_name(&raw),
        })?;
        Some(PropValue::Map(py_dict_to_props(dict)?).to_json())
    } else {
        None
    };

    Ok(PropValue::object(PyObjectProp {
        display: obj.str()?.to_string(),
        tuple,
        json,
    }))
}

/// `get_unique_id()` result: a key object (anything with `.value`), an int or
/// str key, or a uuid string for unkeyed widgets.
pub fn py_to_identity(obj: &Bound<'_, PyAny>) -> Result<Identity, ReconcilerError> {
    if obj.cast::<PyBool>().is_err() {
        if let Ok(i) = obj.extract::<i64>() {
            return Ok(Identity::Keyed(Key::Int(i)));
        }
    }
    if let Ok(s) = obj.cast::<PyString>() {
        let s = s.to_str()?;
        return Ok(match Uuid::parse_str(s) {
            Ok(uuid) => Identity::Instance(uuid),
            Err(_) => Identity::Keyed(Key::Str(s.to_string())),
        });
    }
    if obj.hasattr("value")? {
        let value = obj.getattr("value")?;
        if value.as_ptr() == obj.as_ptr() {
            return Err(ReconcilerError::TypeConversionError {
                expected: "key value".into(),
                actual: type_name(obj),
            });
        }
        return match py_to_identity(&value)? {
            // A Key object always names a key, even when it holds a uuid-looking string
            Identity::Instance(uuid) => Ok(Identity::Keyed(Key::Str(uuid.to_string()))),
            keyed => Ok(keyed),
        };
    }
    Err(ReconcilerError::TypeConversionError {
        expected: "str, int or key object".into(),
        actual: type_name(obj),
    })
}

fn type_name(obj: &Bound<'_, PyAny>) -> String {
    obj.get_type()
        .name()
        .map(|n| n.to_string())
        .unwrap_or_else(|_| "<unknown>".to_string())
}

/// Convert JSON back to Python with proper type mapping
pub fn json_to_pyobject<'py>(
    py: Python<'py>,
    value: &serde_json::Value,
) -> PyResult<Bound<'py, PyAny>> {
    match value {
        serde_json::Value::Null => Ok(py.None().into_bound(py)),
        serde_json::Value::Bool(b) => Ok((*b).into_pyobject(py)?.to_owned().into_any()),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i.into_pyobject(py)?.into_any())
            } else if let Some(f) = n.as_f64() {
                Ok(f.into_pyobject(py)?.into_any())
            } else {
                Ok(n.to_string().into_pyobject(py)?.into_any())
            }
        }
        serde_json::Value::String(s) => Ok(s.as_str().into_pyobject(py)?.into_any()),
        serde_json::Value::Array(arr) => {
            let list = PyList::empty(py);
            for v in arr {
                list.append(json_to_pyobject(py, v)?)?;
            }
            Ok(list.into_any())
        }
        serde_json::Value::Object(map) => {
            let dict = PyDict::new(py);
            for (k, v) in map {
                dict.set_item(k, json_to_pyobject(py, v)?)?;
            }
            Ok(dict.into_any())
        }
    }
}
