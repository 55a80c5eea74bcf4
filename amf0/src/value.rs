use std::collections::HashMap;

/// A single AMF0 value.
///
/// ECMA arrays are read as `Object` since RTMP peers use them interchangeably, and long strings
/// are read as `Utf8String`.  The writer picks the long string marker on its own when needed.
#[derive(PartialEq, Debug, Clone)]
pub enum Amf0Value {
    Number(f64),
    Boolean(bool),
    Utf8String(String),
    Object(HashMap<String, Amf0Value>),
    StrictArray(Vec<Amf0Value>),
    Null,
    Undefined,
}

impl Amf0Value {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Amf0Value::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Amf0Value::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Amf0Value::Utf8String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&HashMap<String, Amf0Value>> {
        match self {
            Amf0Value::Object(properties) => Some(properties),
            _ => None,
        }
    }

    /// Looks up a property when the value is an object
    pub fn property(&self, name: &str) -> Option<&Amf0Value> {
        self.as_object().and_then(|properties| properties.get(name))
    }

    pub fn into_object(self) -> Option<HashMap<String, Amf0Value>> {
        match self {
            Amf0Value::Object(properties) => Some(properties),
            _ => None,
        }
    }

    pub fn is_null_or_undefined(&self) -> bool {
        matches!(self, Amf0Value::Null | Amf0Value::Undefined)
    }
}

impl From<&str> for Amf0Value {
    fn from(value: &str) -> Self {
        Amf0Value::Utf8String(value.to_string())
    }
}

impl From<String> for Amf0Value {
    fn from(value: String) -> Self {
        Amf0Value::Utf8String(value)
    }
}

impl From<f64> for Amf0Value {
    fn from(value: f64) -> Self {
        Amf0Value::Number(value)
    }
}

impl From<bool> for Amf0Value {
    fn from(value: bool) -> Self {
        Amf0Value::Boolean(value)
    }
}
