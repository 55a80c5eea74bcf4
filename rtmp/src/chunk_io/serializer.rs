use super::chunk_header::{self, ChunkType, PreviousHeader, EXTENDED_TIMESTAMP_MARKER};
use super::{
    ChunkSerializationError, INITIAL_CHUNK_SIZE, MAX_CHUNK_SIZE, MAX_CHUNK_STREAM_ID,
    MIN_CHUNK_STREAM_ID,
};
use crate::messages::MessagePayload;
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use bytes::Bytes;

const MAX_MESSAGE_LENGTH: usize = 0x00ff_ffff;

/// Splits outbound messages into chunks.
///
/// The header compression state is per chunk stream, so every message sent to a peer has to
/// go through the same instance.
pub struct ChunkSerializer {
    max_chunk_size: usize,
    previous_headers: std::collections::HashMap<u32, PreviousHeader>,
}

impl ChunkSerializer {
    pub fn new() -> ChunkSerializer {
        ChunkSerializer {
            max_chunk_size: INITIAL_CHUNK_SIZE,
            previous_headers: std::collections::HashMap::new(),
        }
    }

    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    /// Changes the size chunks are split at.  The peer must be told with a SetChunkSize
    /// message serialized *before* this call, since that message still uses the old size.
    pub fn set_max_chunk_size(&mut self, new_size: u32) -> Result<(), ChunkSerializationError> {
        if new_size == 0 || new_size as usize > MAX_CHUNK_SIZE {
            return Err(ChunkSerializationError::InvalidMaxChunkSize {
                chunk_size: new_size,
            });
        }

        self.max_chunk_size = new_size as usize;
        Ok(())
    }

    /// Produces the chunks for one message, one `Bytes` per chunk.
    ///
    /// The header type is picked once per message by comparing against the previous header on
    /// `csid`.  Every chunk after the first is a type 3 continuation.
    pub fn serialize(
        &mut self,
        csid: u32,
        message: &MessagePayload,
    ) -> Result<Vec<Bytes>, ChunkSerializationError> {
        if !(MIN_CHUNK_STREAM_ID..=MAX_CHUNK_STREAM_ID).contains(&csid) {
            return Err(ChunkSerializationError::InvalidChunkStreamId { csid });
        }

        let length = message.data.len();
        if length > MAX_MESSAGE_LENGTH {
            return Err(ChunkSerializationError::MessageTooLong { size: length });
        }

        let (chunk_type, timestamp_field) = self.select_chunk_type(csid, message);
        let header = PreviousHeader {
            timestamp: message.timestamp,
            message_length: length as u32,
            message_type: message.message_type,
            message_stream_id: message.message_stream_id,
            timestamp_field,
        };

        let chunk_count = if length == 0 {
            1
        } else {
            (length + self.max_chunk_size - 1) / self.max_chunk_size
        };

        let mut chunks = Vec::with_capacity(chunk_count);
        for index in 0..chunk_count {
            let start = index * self.max_chunk_size;
            let end = (start + self.max_chunk_size).min(length);
            let body = &message.data[start..end];

            let mut bytes = Vec::with_capacity(body.len() + 18);
            if index == 0 {
                chunk_header::write_basic_header(&mut bytes, chunk_type, csid);
                write_message_header(&mut bytes, chunk_type, &header);
            } else {
                chunk_header::write_basic_header(&mut bytes, ChunkType::Type3, csid);
            }

            if header.uses_extended_timestamp() {
                let mut extended = [0_u8; 4];
                BigEndian::write_u32(&mut extended, timestamp_field);
                bytes.extend_from_slice(&extended);
            }

            bytes.extend_from_slice(body);
            chunks.push(Bytes::from(bytes));
        }

        self.previous_headers.insert(csid, header);
        Ok(chunks)
    }

    fn select_chunk_type(&self, csid: u32, message: &MessagePayload) -> (ChunkType, u32) {
        let previous = match self.previous_headers.get(&csid) {
            Some(previous) => previous,
            None => return (ChunkType::Type0, message.timestamp.value()),
        };

        // Stream ids are never delta encoded and deltas cannot be negative
        if previous.message_stream_id != message.message_stream_id
            || message.timestamp < previous.timestamp
        {
            return (ChunkType::Type0, message.timestamp.value());
        }

        let delta = message.timestamp.delta_since(previous.timestamp);
        if previous.message_type != message.message_type
            || previous.message_length as usize != message.data.len()
        {
            (ChunkType::Type1, delta)
        } else if message.timestamp != previous.timestamp {
            (ChunkType::Type2, delta)
        } else {
            // Type 3 chunks keep repeating the extended timestamp of the header they copy
            (ChunkType::Type3, previous.timestamp_field)
        }
    }
}

impl Default for ChunkSerializer {
    fn default() -> Self {
        ChunkSerializer::new()
    }
}

fn write_message_header(bytes: &mut Vec<u8>, chunk_type: ChunkType, header: &PreviousHeader) {
    if chunk_type == ChunkType::Type3 {
        return;
    }

    let mut field = [0_u8; 11];
    BigEndian::write_u24(&mut field[0..3], header.timestamp_field.min(EXTENDED_TIMESTAMP_MARKER));
    if chunk_type != ChunkType::Type2 {
        BigEndian::write_u24(&mut field[3..6], header.message_length);
        field[6] = header.message_type.id();
        LittleEndian::write_u32(&mut field[7..11], header.message_stream_id);
    }

    bytes.extend_from_slice(&field[..chunk_type.message_header_size()]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk_io::ChunkDeserializer;
    use crate::io::{ParseState, StepResult};
    use crate::messages::MessageType;
    use crate::time::RtmpTimestamp;
    use proptest::prelude::*;

    fn message(timestamp: u32, msid: u32, message_type: MessageType, length: usize) -> MessagePayload {
        let data: Vec<u8> = (0..length).map(|x| x as u8).collect();
        MessagePayload::new(RtmpTimestamp::new(timestamp), message_type, msid, Bytes::from(data))
    }

    fn reassemble(deserializer: &mut ChunkDeserializer, chunks: &[Bytes]) -> Vec<MessagePayload> {
        let input: Vec<u8> = chunks.iter().flat_map(|c| c.iter().copied()).collect();
        let mut state = ParseState::FirstByteBasicHeader;
        let mut offset = 0;
        let mut messages = Vec::new();
        loop {
            match deserializer.step(state, &input[offset..]).unwrap() {
                StepResult::NeedMoreData => break,
                StepResult::Advanced { consumed, next } => {
                    offset += consumed;
                    state = next;
                }
                StepResult::MessageCompleted { consumed, message } => {
                    offset += consumed;
                    state = ParseState::FirstByteBasicHeader;
                    messages.push(message);
                }
            }
        }

        assert_eq!(offset, input.len());
        messages
    }

    #[test]
    fn three_hundred_bytes_at_128_is_three_chunks() {
        let mut serializer = ChunkSerializer::new();
        let chunks = serializer
            .serialize(5, &message(0, 1, MessageType::Amf0Data, 300))
            .unwrap();

        let sizes: Vec<usize> = chunks.iter().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![1 + 11 + 128, 1 + 128, 1 + 44]);
        assert_eq!(chunks[0][0], 0x05);
        assert_eq!(chunks[1][0], 0xc5);
        assert_eq!(chunks[2][0], 0xc5);
    }

    #[test]
    fn type_0_header_layout() {
        let mut serializer = ChunkSerializer::new();
        let chunks = serializer
            .serialize(3, &message(0x010203, 0x04050607, MessageType::Video, 2))
            .unwrap();

        assert_eq!(
            &chunks[0][..],
            &[0x03, 1, 2, 3, 0, 0, 2, 9, 7, 6, 5, 4, 0, 1]
        );
    }

    #[test]
    fn timestamp_advance_with_same_shape_is_type_2() {
        let mut serializer = ChunkSerializer::new();
        serializer.serialize(5, &message(1000, 1, MessageType::Audio, 10)).unwrap();
        let chunks = serializer.serialize(5, &message(1040, 1, MessageType::Audio, 10)).unwrap();

        assert_eq!(&chunks[0][..4], &[0x85, 0, 0, 40]);
        assert_eq!(chunks[0].len(), 4 + 10);
    }

    #[test]
    fn repeated_delta_is_still_type_2() {
        let mut serializer = ChunkSerializer::new();
        serializer.serialize(5, &message(1000, 1, MessageType::Audio, 10)).unwrap();
        serializer.serialize(5, &message(1040, 1, MessageType::Audio, 10)).unwrap();
        let chunks = serializer.serialize(5, &message(1080, 1, MessageType::Audio, 10)).unwrap();

        assert_eq!(&chunks[0][..4], &[0x85, 0, 0, 40]);
        assert_eq!(chunks[0].len(), 4 + 10);
    }

    #[test]
    fn identical_header_is_type_3() {
        let mut serializer = ChunkSerializer::new();
        serializer.serialize(5, &message(0, 1, MessageType::Amf0Data, 10)).unwrap();
        let chunks = serializer.serialize(5, &message(0, 1, MessageType::Amf0Data, 10)).unwrap();

        assert_eq!(chunks[0][0], 0xc5);
    }

    #[test]
    fn identical_header_after_type_0_at_nonzero_time_is_type_3() {
        let mut serializer = ChunkSerializer::new();
        serializer.serialize(5, &message(1000, 1, MessageType::Audio, 10)).unwrap();
        let chunks = serializer.serialize(5, &message(1000, 1, MessageType::Audio, 10)).unwrap();

        assert_eq!(chunks[0][0], 0xc5);
        assert_eq!(chunks[0].len(), 1 + 10);
    }

    #[test]
    fn identical_header_after_extended_timestamp_repeats_extension() {
        let mut serializer = ChunkSerializer::new();
        let mut deserializer = ChunkDeserializer::new();
        let input = message(0x0100_0000, 1, MessageType::Video, 10);

        let mut chunks = serializer.serialize(5, &input).unwrap();
        let repeated = serializer.serialize(5, &input).unwrap();
        assert_eq!(&repeated[0][..5], &[0xc5, 1, 0, 0, 0]);
        assert_eq!(repeated[0].len(), 1 + 4 + 10);

        chunks.extend(repeated);
        assert_eq!(reassemble(&mut deserializer, &chunks), vec![input.clone(), input]);
    }

    #[test]
    fn length_or_type_change_is_type_1() {
        let mut serializer = ChunkSerializer::new();
        serializer.serialize(5, &message(0, 1, MessageType::Audio, 10)).unwrap();
        let chunks = serializer.serialize(5, &message(20, 1, MessageType::Video, 12)).unwrap();

        assert_eq!(&chunks[0][..8], &[0x45, 0, 0, 20, 0, 0, 12, 9]);
    }

    #[test]
    fn stream_id_change_or_backwards_time_is_type_0() {
        let mut serializer = ChunkSerializer::new();
        serializer.serialize(5, &message(100, 1, MessageType::Audio, 10)).unwrap();

        let other_stream = serializer.serialize(5, &message(100, 2, MessageType::Audio, 10)).unwrap();
        assert_eq!(other_stream[0][0], 0x05);

        let backwards = serializer.serialize(5, &message(50, 2, MessageType::Audio, 10)).unwrap();
        assert_eq!(backwards[0][0], 0x05);
    }

    #[test]
    fn extended_timestamp_pins_field_and_appends_value() {
        let mut serializer = ChunkSerializer::new();
        let chunks = serializer
            .serialize(3, &message(0x0100_0000, 1, MessageType::Video, 130))
            .unwrap();

        assert_eq!(&chunks[0][1..4], &[0xff, 0xff, 0xff]);
        assert_eq!(&chunks[0][12..16], &[1, 0, 0, 0]);
        assert_eq!(&chunks[1][..5], &[0xc3, 1, 0, 0, 0]);
        assert_eq!(chunks[1].len(), 1 + 4 + 2);
    }

    #[test]
    fn larger_chunk_size_produces_fewer_chunks() {
        let mut serializer = ChunkSerializer::new();
        serializer.set_max_chunk_size(4096).unwrap();

        let chunks = serializer.serialize(3, &message(0, 1, MessageType::Video, 5000)).unwrap();
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn invalid_arguments_are_rejected() {
        let mut serializer = ChunkSerializer::new();
        assert_eq!(
            serializer.set_max_chunk_size(0),
            Err(ChunkSerializationError::InvalidMaxChunkSize { chunk_size: 0 })
        );
        assert_eq!(
            serializer.serialize(1, &message(0, 0, MessageType::Audio, 1)).unwrap_err(),
            ChunkSerializationError::InvalidChunkStreamId { csid: 1 }
        );
        assert_eq!(
            serializer
                .serialize(3, &message(0, 0, MessageType::Audio, MAX_MESSAGE_LENGTH + 1))
                .unwrap_err(),
            ChunkSerializationError::MessageTooLong {
                size: MAX_MESSAGE_LENGTH + 1
            }
        );
    }

    #[test]
    fn wide_chunk_stream_ids_round_trip_through_framer() {
        let mut serializer = ChunkSerializer::new();
        let mut deserializer = ChunkDeserializer::new();
        let input = message(77, 3, MessageType::Audio, 20);

        for csid in [64, 319, 320, MAX_CHUNK_STREAM_ID] {
            let chunks = serializer.serialize(csid, &input).unwrap();
            assert_eq!(reassemble(&mut deserializer, &chunks), vec![input.clone()]);
        }
    }

    #[test]
    fn compressed_sequence_decodes_to_original_timestamps() {
        let mut serializer = ChunkSerializer::new();
        let mut deserializer = ChunkDeserializer::new();
        let inputs = vec![
            message(0, 1, MessageType::Audio, 10),
            message(23, 1, MessageType::Audio, 10),
            message(46, 1, MessageType::Audio, 10),
            message(69, 1, MessageType::Video, 300),
            message(69, 1, MessageType::Video, 300),
            message(0x0100_0000, 1, MessageType::Video, 300),
            message(0x0100_0000 + 0x0100_0000, 1, MessageType::Video, 300),
        ];

        let mut chunks = Vec::new();
        for input in &inputs {
            chunks.extend(serializer.serialize(4, input).unwrap());
        }

        assert_eq!(reassemble(&mut deserializer, &chunks), inputs);
    }

    proptest! {
        #[test]
        fn split_and_reassemble_preserves_payload(length in 0_usize..5000, chunk_size in 1_u32..600) {
            let mut serializer = ChunkSerializer::new();
            let mut deserializer = ChunkDeserializer::new();
            serializer.set_max_chunk_size(chunk_size).unwrap();
            deserializer.set_max_chunk_size(chunk_size as usize).unwrap();

            let input = message(10, 1, MessageType::Video, length);
            let chunks = serializer.serialize(3, &input).unwrap();

            let expected_chunks = std::cmp::max(1, (length + chunk_size as usize - 1) / chunk_size as usize);
            prop_assert_eq!(chunks.len(), expected_chunks);
            prop_assert_eq!(reassemble(&mut deserializer, &chunks), vec![input]);
        }
    }
}
