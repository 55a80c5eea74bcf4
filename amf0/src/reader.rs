use crate::errors::Amf0DeserializationError;
use crate::markers;
use crate::Amf0Value;
use byteorder::{BigEndian, ReadBytesExt};
use std::collections::HashMap;
use std::io::{Cursor, Read};

/// Objects and arrays nested deeper than this are rejected
pub const MAX_NESTING_DEPTH: usize = 64;

/// Reads every AMF0 value contained in the slice
pub fn read_values(bytes: &[u8]) -> Result<Vec<Amf0Value>, Amf0DeserializationError> {
    let mut cursor = Cursor::new(bytes);
    let mut values = Vec::new();
    while let Some(value) = read_value(&mut cursor)? {
        values.push(value);
    }

    Ok(values)
}

/// Reads the next value from the cursor, returning `None` once the input is exhausted.
pub fn read_value(
    cursor: &mut Cursor<&[u8]>,
) -> Result<Option<Amf0Value>, Amf0DeserializationError> {
    if cursor.position() as usize >= cursor.get_ref().len() {
        return Ok(None);
    }

    let marker = cursor.read_u8()?;
    read_marked_value(marker, cursor, 0).map(Some)
}

fn read_marked_value<R: Read>(
    marker: u8,
    bytes: &mut R,
    depth: usize,
) -> Result<Amf0Value, Amf0DeserializationError> {
    if depth > MAX_NESTING_DEPTH {
        return Err(Amf0DeserializationError::NestingTooDeep {
            limit: MAX_NESTING_DEPTH,
        });
    }

    match marker {
        markers::NUMBER => Ok(Amf0Value::Number(bytes.read_f64::<BigEndian>()?)),
        markers::BOOLEAN => Ok(Amf0Value::Boolean(bytes.read_u8()? != 0)),
        markers::STRING => {
            let length = bytes.read_u16::<BigEndian>()? as usize;
            Ok(Amf0Value::Utf8String(read_utf8(bytes, length)?))
        }
        markers::LONG_STRING => {
            let length = bytes.read_u32::<BigEndian>()? as usize;
            Ok(Amf0Value::Utf8String(read_utf8(bytes, length)?))
        }
        markers::OBJECT => read_object_properties(bytes, depth).map(Amf0Value::Object),
        markers::ECMA_ARRAY => {
            // The count is advisory, peers still terminate with an object end marker
            let _count = bytes.read_u32::<BigEndian>()?;
            read_object_properties(bytes, depth).map(Amf0Value::Object)
        }
        markers::STRICT_ARRAY => {
            let count = bytes.read_u32::<BigEndian>()?;
            let mut values = Vec::new();
            for _ in 0..count {
                let marker = bytes.read_u8()?;
                values.push(read_marked_value(marker, bytes, depth + 1)?);
            }

            Ok(Amf0Value::StrictArray(values))
        }
        markers::DATE => {
            let millis = bytes.read_f64::<BigEndian>()?;
            let _time_zone = bytes.read_i16::<BigEndian>()?;
            Ok(Amf0Value::Number(millis))
        }
        markers::NULL => Ok(Amf0Value::Null),
        markers::UNDEFINED => Ok(Amf0Value::Undefined),
        _ => Err(Amf0DeserializationError::UnknownMarker { marker }),
    }
}

fn read_object_properties<R: Read>(
    bytes: &mut R,
    depth: usize,
) -> Result<HashMap<String, Amf0Value>, Amf0DeserializationError> {
    let mut properties = HashMap::new();
    loop {
        let name_length = bytes.read_u16::<BigEndian>()? as usize;
        if name_length == 0 {
            if bytes.read_u8()? != markers::OBJECT_END {
                return Err(Amf0DeserializationError::UnexpectedEmptyObjectPropertyName);
            }

            return Ok(properties);
        }

        let name = read_utf8(bytes, name_length)?;
        let marker = bytes.read_u8()?;
        let value = read_marked_value(marker, bytes, depth + 1)?;
        properties.insert(name, value);
    }
}

fn read_utf8<R: Read>(bytes: &mut R, length: usize) -> Result<String, Amf0DeserializationError> {
    // Length prefixes come from the peer, so only allocate for bytes actually present
    let mut buffer = Vec::new();
    bytes.take(length as u64).read_to_end(&mut buffer)?;
    if buffer.len() < length {
        return Err(Amf0DeserializationError::UnexpectedEof);
    }

    Ok(String::from_utf8(buffer)?)
}
