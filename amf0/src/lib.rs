//! AMF0 value model plus a reader and writer for the subset of the format that RTMP command
//! and data messages carry.
//!
//! # Examples
//! ```
//! use std::collections::HashMap;
//! use rtmp_amf0::{Amf0Value, read_values, write_values};
//!
//! let mut properties = HashMap::new();
//! properties.insert("app".to_string(), Amf0Value::Utf8String("live".to_string()));
//!
//! let input = vec![
//!     Amf0Value::Utf8String("connect".to_string()),
//!     Amf0Value::Number(1.0),
//!     Amf0Value::Object(properties),
//! ];
//!
//! let bytes = write_values(&input).unwrap();
//! let output = read_values(&bytes[..]).unwrap();
//! assert_eq!(input, output);
//! ```

mod errors;
mod reader;
mod value;
mod writer;

pub use errors::{Amf0DeserializationError, Amf0SerializationError};
pub use reader::{read_value, read_values, MAX_NESTING_DEPTH};
pub use value::Amf0Value;
pub use writer::{write_value, write_values};

mod markers {
    pub const NUMBER: u8 = 0x00;
    pub const BOOLEAN: u8 = 0x01;
    pub const STRING: u8 = 0x02;
    pub const OBJECT: u8 = 0x03;
    pub const NULL: u8 = 0x05;
    pub const UNDEFINED: u8 = 0x06;
    pub const ECMA_ARRAY: u8 = 0x08;
    pub const OBJECT_END: u8 = 0x09;
    pub const STRICT_ARRAY: u8 = 0x0a;
    pub const DATE: u8 = 0x0b;
    pub const LONG_STRING: u8 = 0x0c;
}
