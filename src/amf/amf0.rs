use crate::amf::{Amf0Decoder, Amf0Encoder};
use crate::{ByteBuffer, Result};

/// AMF0 data types
#[derive(Debug, Clone, PartialEq)]
pub enum Amf0Value {
    Number(f64),                // 0x00
    Boolean(bool),              // 0x01
    String(String),             // 0x02
    Object(Amf0Object),         // 0x03
    Null,                       // 0x05
    Undefined,                  // 0x06
    EcmaArray(Amf0Object),      // 0x08
    StrictArray(Vec<Amf0Value>), // 0x0A
}

// AMF0 type markers
pub mod markers {
    pub const NUMBER: u8 = 0x00;
    pub const BOOLEAN: u8 = 0x01;
    pub const STRING: u8 = 0x02;
    pub const OBJECT: u8 = 0x03;
    pub const NULL: u8 = 0x05;
    pub const UNDEFINED: u8 = 0x06;
    pub const ECMA_ARRAY: u8 = 0x08;
    pub const OBJECT_END: u8 = 0x09;
    pub const STRICT_ARRAY: u8 = 0x0A;
}

impl Amf0Value {
    /// Extract number value
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Amf0Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Extract string reference
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Amf0Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Extract boolean value
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Amf0Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Extract the property list of an object or ECMA array
    pub fn as_object(&self) -> Option<&Amf0Object> {
        match self {
            Amf0Value::Object(obj) | Amf0Value::EcmaArray(obj) => Some(obj),
            _ => None,
        }
    }

    /// Extract strict array elements
    pub fn as_array(&self) -> Option<&[Amf0Value]> {
        match self {
            Amf0Value::StrictArray(arr) => Some(arr),
            _ => None,
        }
    }

    /// Get property from object
    pub fn get_property(&self, key: &str) -> Option<&Amf0Value> {
        self.as_object().and_then(|obj| obj.get(key))
    }

    /// Check if null or undefined
    pub fn is_null(&self) -> bool {
        matches!(self, Amf0Value::Null | Amf0Value::Undefined)
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

impl From<&str> for Amf0Value {
    fn from(value: &str) -> Self {
        Amf0Value::String(value.to_string())
    }
}

impl From<String> for Amf0Value {
    fn from(value: String) -> Self {
        Amf0Value::String(value)
    }
}

impl From<Amf0Object> for Amf0Value {
    fn from(value: Amf0Object) -> Self {
        Amf0Value::Object(value)
    }
}

/// Ordered name/value pairs of an AMF0 object or ECMA array.
///
/// Lookup is case-sensitive and returns the first match; duplicate names are
/// preserved in wire order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Amf0Object {
    properties: Vec<(String, Amf0Value)>,
}

impl Amf0Object {
    pub fn new() -> Self {
        Amf0Object { properties: Vec::new() }
    }

    /// Builder-style append
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Amf0Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Append a property, keeping any earlier property of the same name
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Amf0Value>) {
        self.properties.push((name.into(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&Amf0Value> {
        self.properties
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn get_string(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| v.as_string())
    }

    pub fn get_number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|v| v.as_number())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Amf0Value)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

/// An ordered sequence of AMF0 values; position is the argument index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Amf0Document {
    values: Vec<Amf0Value>,
}

impl Amf0Document {
    pub fn new() -> Self {
        Amf0Document { values: Vec::new() }
    }

    /// Decode every value in `data`.
    ///
    /// Truncated or otherwise malformed input yields an empty document. An
    /// unsupported marker ends decoding at that point and keeps the values
    /// already read, including a partially scanned enclosing object.
    pub fn decode(data: &[u8]) -> Self {
        let mut buffer = ByteBuffer::from_slice(data);
        let mut decoder = Amf0Decoder::new(&mut buffer);
        let mut values = Vec::new();

        while decoder.has_remaining() {
            match decoder.decode() {
                Ok(value) => values.push(value),
                Err(_) if decoder.hit_unsupported() => break,
                Err(_) => return Amf0Document::new(),
            }
            if decoder.hit_unsupported() {
                break;
            }
        }

        Amf0Document { values }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut encoder = Amf0Encoder::new();
        for value in &self.values {
            encoder.encode(value)?;
        }
        Ok(encoder.into_bytes())
    }

    /// Builder-style append
    pub fn with(mut self, value: impl Into<Amf0Value>) -> Self {
        self.values.push(value.into());
        self
    }

    pub fn push(&mut self, value: impl Into<Amf0Value>) {
        self.values.push(value.into());
    }

    pub fn get(&self, index: usize) -> Option<&Amf0Value> {
        self.values.get(index)
    }

    pub fn get_string(&self, index: usize) -> Option<&str> {
        self.get(index).and_then(|v| v.as_string())
    }

    pub fn get_number(&self, index: usize) -> Option<f64> {
        self.get(index).and_then(|v| v.as_number())
    }

    pub fn values(&self) -> &[Amf0Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Amf0Value> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<Vec<Amf0Value>> for Amf0Document {
    fn from(values: Vec<Amf0Value>) -> Self {
        Amf0Document { values }
    }
}
