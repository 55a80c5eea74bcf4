use super::command::{strip_format_selector, AMF0_FORMAT_SELECTOR};
use crate::messages::{
    DataMessage, MessageDeserializationError, MessageSerializationError, ObjectEncoding,
    RtmpMessage,
};
use bytes::Bytes;
use rtmp_amf0::{read_values, write_value};

pub fn serialize(message: &DataMessage) -> Result<Bytes, MessageSerializationError> {
    let mut bytes = Vec::new();
    if message.encoding == ObjectEncoding::Amf3 {
        bytes.push(AMF0_FORMAT_SELECTOR);
    }

    for value in &message.values {
        write_value(value, &mut bytes)?;
    }

    Ok(Bytes::from(bytes))
}

pub fn deserialize(
    data: &[u8],
    encoding: ObjectEncoding,
) -> Result<RtmpMessage, MessageDeserializationError> {
    let body = match encoding {
        ObjectEncoding::Amf0 => data,
        ObjectEncoding::Amf3 => strip_format_selector(data),
    };

    let values = read_values(body)?;
    Ok(RtmpMessage::Data(DataMessage { encoding, values }))
}
