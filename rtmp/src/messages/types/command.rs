use crate::messages::{
    CommandMessage, MessageDeserializationError, MessageSerializationError, ObjectEncoding,
    RtmpMessage,
};
use bytes::Bytes;
use rtmp_amf0::{read_values, write_value, Amf0Value};

/// Leading byte of AMF3 command and data bodies selecting AMF0 for what follows
pub(crate) const AMF0_FORMAT_SELECTOR: u8 = 0;

pub fn serialize(command: &CommandMessage) -> Result<Bytes, MessageSerializationError> {
    let mut bytes = Vec::new();
    if command.encoding == ObjectEncoding::Amf3 {
        bytes.push(AMF0_FORMAT_SELECTOR);
    }

    write_value(&Amf0Value::from(command.procedure_name.as_str()), &mut bytes)?;
    write_value(&Amf0Value::Number(command.transaction_id), &mut bytes)?;
    write_value(&command.command_object, &mut bytes)?;
    for argument in &command.arguments {
        write_value(argument, &mut bytes)?;
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

    let mut values = read_values(body)?.into_iter();
    let procedure_name = match values.next() {
        Some(Amf0Value::Utf8String(name)) => name,
        _ => return Err(MessageDeserializationError::InvalidCommandFormat),
    };

    // Some clients send a null transaction id for calls that expect no reply
    let transaction_id = match values.next() {
        Some(Amf0Value::Number(id)) => id,
        Some(Amf0Value::Null) | None => 0.0,
        Some(_) => return Err(MessageDeserializationError::InvalidCommandFormat),
    };

    let command_object = values.next().unwrap_or(Amf0Value::Null);
    Ok(RtmpMessage::Command(CommandMessage {
        encoding,
        procedure_name,
        transaction_id,
        command_object,
        arguments: values.collect(),
    }))
}

pub(crate) fn strip_format_selector(data: &[u8]) -> &[u8] {
    match data.first() {
        Some(&AMF0_FORMAT_SELECTOR) => &data[1..],
        _ => data,
    }
}
