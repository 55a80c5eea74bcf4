use crate::errors::Amf0SerializationError;
use crate::markers;
use crate::Amf0Value;
use byteorder::{BigEndian, WriteBytesExt};
use std::collections::HashMap;

/// Writes the values back to back into a new byte vector
pub fn write_values(values: &[Amf0Value]) -> Result<Vec<u8>, Amf0SerializationError> {
    let mut bytes = Vec::new();
    for value in values {
        write_value(value, &mut bytes)?;
    }

    Ok(bytes)
}

/// Appends a single marked value to `bytes`
pub fn write_value(value: &Amf0Value, bytes: &mut Vec<u8>) -> Result<(), Amf0SerializationError> {
    match value {
        Amf0Value::Number(number) => {
            bytes.push(markers::NUMBER);
            bytes.write_f64::<BigEndian>(*number)?;
        }

        Amf0Value::Boolean(flag) => {
            bytes.push(markers::BOOLEAN);
            bytes.push(*flag as u8);
        }

        Amf0Value::Utf8String(text) => {
            if text.len() > u16::MAX as usize {
                bytes.push(markers::LONG_STRING);
                bytes.write_u32::<BigEndian>(text.len() as u32)?;
            } else {
                bytes.push(markers::STRING);
                bytes.write_u16::<BigEndian>(text.len() as u16)?;
            }

            bytes.extend_from_slice(text.as_bytes());
        }

        Amf0Value::Object(properties) => {
            bytes.push(markers::OBJECT);
            write_properties(properties, bytes)?;
        }

        Amf0Value::StrictArray(values) => {
            if values.len() > u32::MAX as usize {
                return Err(Amf0SerializationError::ArrayTooLong {
                    length: values.len(),
                });
            }

            bytes.push(markers::STRICT_ARRAY);
            bytes.write_u32::<BigEndian>(values.len() as u32)?;
            for value in values {
                write_value(value, bytes)?;
            }
        }

        Amf0Value::Null => bytes.push(markers::NULL),
        Amf0Value::Undefined => bytes.push(markers::UNDEFINED),
    }

    Ok(())
}

fn write_properties(
    properties: &HashMap<String, Amf0Value>,
    bytes: &mut Vec<u8>,
) -> Result<(), Amf0SerializationError> {
    // Sorted so the same object always produces the same bytes
    let mut names: Vec<&String> = properties.keys().collect();
    names.sort();

    for name in names {
        if name.len() > u16::MAX as usize {
            return Err(Amf0SerializationError::PropertyNameTooLong { length: name.len() });
        }

        bytes.write_u16::<BigEndian>(name.len() as u16)?;
        bytes.extend_from_slice(name.as_bytes());
        write_value(&properties[name], bytes)?;
    }

    bytes.write_u16::<BigEndian>(0)?;
    bytes.push(markers::OBJECT_END);
    Ok(())
}
