use crate::messages::{MessageDeserializationError, RtmpMessage, UserControlEvent};
use crate::time::RtmpTimestamp;
use byteorder::{BigEndian, ReadBytesExt};
use bytes::{BufMut, Bytes, BytesMut};
use std::io::Cursor;

pub fn serialize(event: &UserControlEvent) -> Bytes {
    let mut bytes = BytesMut::with_capacity(10);
    match event {
        UserControlEvent::StreamBegin { stream_id } => write_event(&mut bytes, 0, *stream_id),
        UserControlEvent::StreamEof { stream_id } => write_event(&mut bytes, 1, *stream_id),
        UserControlEvent::StreamDry { stream_id } => write_event(&mut bytes, 2, *stream_id),
        UserControlEvent::SetBufferLength {
            stream_id,
            buffer_length,
        } => {
            write_event(&mut bytes, 3, *stream_id);
            bytes.put_u32(*buffer_length);
        }
        UserControlEvent::StreamIsRecorded { stream_id } => write_event(&mut bytes, 4, *stream_id),
        UserControlEvent::PingRequest { timestamp } => write_event(&mut bytes, 6, timestamp.value()),
        UserControlEvent::PingResponse { timestamp } => {
            write_event(&mut bytes, 7, timestamp.value())
        }
    }

    bytes.freeze()
}

pub fn deserialize(data: &[u8]) -> Result<RtmpMessage, MessageDeserializationError> {
    let mut cursor = Cursor::new(data);
    let event_type = cursor.read_u16::<BigEndian>()?;
    let value = cursor.read_u32::<BigEndian>()?;

    let event = match event_type {
        0 => UserControlEvent::StreamBegin { stream_id: value },
        1 => UserControlEvent::StreamEof { stream_id: value },
        2 => UserControlEvent::StreamDry { stream_id: value },
        3 => UserControlEvent::SetBufferLength {
            stream_id: value,
            buffer_length: cursor.read_u32::<BigEndian>()?,
        },
        4 => UserControlEvent::StreamIsRecorded { stream_id: value },
        6 => UserControlEvent::PingRequest {
            timestamp: RtmpTimestamp::new(value),
        },
        7 => UserControlEvent::PingResponse {
            timestamp: RtmpTimestamp::new(value),
        },
        _ => return Err(MessageDeserializationError::UnknownUserControlEvent { event_type }),
    };

    Ok(RtmpMessage::UserControl(event))
}

fn write_event(bytes: &mut BytesMut, event_type: u16, value: u32) {
    bytes.put_u16(event_type);
    bytes.put_u32(value);
}
