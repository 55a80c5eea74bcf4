use super::chunk_header::{self, ChunkType, PreviousHeader, EXTENDED_TIMESTAMP_MARKER};
use super::{ChunkDeserializationError, INITIAL_CHUNK_SIZE, MAX_CHUNK_SIZE};
use crate::io::{ParseState, StepResult};
use crate::messages::{MessagePayload, MessageType};
use crate::time::RtmpTimestamp;
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use bytes::BytesMut;
use std::cmp::min;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Reassembles inbound chunks into messages.
///
/// Parsing is resumable at every header boundary: each handler either consumes the bytes of
/// one header section (or one chunk body) and names the next state, or consumes nothing and
/// reports that more data is needed.  Every byte received after the handshake has to pass
/// through the same instance since chunks depend on the headers before them.
pub struct ChunkDeserializer {
    max_chunk_size: usize,
    previous_headers: HashMap<u32, PreviousHeader>,
    partial_messages: HashMap<u32, BytesMut>,
    current: CurrentChunk,
}

struct CurrentChunk {
    chunk_type: ChunkType,
    csid: u32,
    header: PreviousHeader,
}

impl CurrentChunk {
    fn empty() -> CurrentChunk {
        CurrentChunk {
            chunk_type: ChunkType::Type0,
            csid: 0,
            header: PreviousHeader {
                timestamp: RtmpTimestamp::new(0),
                message_length: 0,
                message_type: MessageType::Other(0),
                message_stream_id: 0,
                timestamp_field: 0,
            },
        }
    }
}

impl ChunkDeserializer {
    pub fn new() -> ChunkDeserializer {
        ChunkDeserializer {
            max_chunk_size: INITIAL_CHUNK_SIZE,
            previous_headers: HashMap::new(),
            partial_messages: HashMap::new(),
            current: CurrentChunk::empty(),
        }
    }

    /// Runs the handler for `state` against the unconsumed input
    pub fn step(
        &mut self,
        state: ParseState,
        input: &[u8],
    ) -> Result<StepResult, ChunkDeserializationError> {
        match state {
            ParseState::FirstByteBasicHeader => self.read_basic_header(input),
            ParseState::ChunkMessageHeader => Ok(self.read_message_header(input)),
            ParseState::ExtendedTimestamp => Ok(self.read_extended_timestamp(input)),
            ParseState::CompleteMessage => Ok(self.read_chunk_body(input)),
            ParseState::HandshakeC0C1 | ParseState::HandshakeC2 => {
                Err(ChunkDeserializationError::UnexpectedParseState {
                    state: format!("{:?}", state),
                })
            }
        }
    }

    /// Applies a SetChunkSize received from the peer.  Takes effect on the next chunk body.
    pub fn set_max_chunk_size(&mut self, new_size: usize) -> Result<(), ChunkDeserializationError> {
        if new_size == 0 || new_size > MAX_CHUNK_SIZE {
            return Err(ChunkDeserializationError::InvalidMaxChunkSize {
                chunk_size: new_size,
            });
        }

        self.max_chunk_size = new_size;
        Ok(())
    }

    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    /// Drops the partially received message on `csid`, if there is one
    pub fn abort_message(&mut self, csid: u32) {
        if let Some(partial) = self.partial_messages.remove(&csid) {
            debug!(csid, discarded = partial.len(), "Aborted partial message");
        }
    }

    fn read_basic_header(&mut self, input: &[u8]) -> Result<StepResult, ChunkDeserializationError> {
        let (chunk_type, csid, consumed) = match chunk_header::read_basic_header(input) {
            Some(header) => header,
            None => return Ok(StepResult::NeedMoreData),
        };

        if chunk_type != ChunkType::Type3 {
            if let Some(partial) = self.partial_messages.remove(&csid) {
                debug!(
                    csid,
                    discarded = partial.len(),
                    "New message header interrupted a partial message"
                );
            }
        }

        let header = match (chunk_type, self.previous_headers.get(&csid)) {
            (ChunkType::Type0, _) => CurrentChunk::empty().header,
            (_, Some(previous)) => *previous,
            (_, None) => return Err(ChunkDeserializationError::NoPreviousChunkOnStream { csid }),
        };

        self.current = CurrentChunk {
            chunk_type,
            csid,
            header,
        };

        // Type 3 keeps the previous timestamp, whether it continues a message or opens one
        let next = match chunk_type {
            ChunkType::Type3 if header.uses_extended_timestamp() => ParseState::ExtendedTimestamp,
            ChunkType::Type3 => ParseState::CompleteMessage,
            _ => ParseState::ChunkMessageHeader,
        };

        Ok(StepResult::Advanced { consumed, next })
    }

    fn read_message_header(&mut self, input: &[u8]) -> StepResult {
        let size = self.current.chunk_type.message_header_size();
        if input.len() < size {
            return StepResult::NeedMoreData;
        }

        let timestamp_field = BigEndian::read_u24(&input[0..3]);
        if self.current.chunk_type != ChunkType::Type2 {
            let header = &mut self.current.header;
            header.message_length = BigEndian::read_u24(&input[3..6]);
            header.message_type = MessageType::from(input[6]);
            if self.current.chunk_type == ChunkType::Type0 {
                // Message stream id is the one little endian field in the chunk format
                header.message_stream_id = LittleEndian::read_u32(&input[7..11]);
            }
        }

        let next = if timestamp_field == EXTENDED_TIMESTAMP_MARKER {
            self.current.header.timestamp_field = timestamp_field;
            ParseState::ExtendedTimestamp
        } else {
            self.apply_timestamp_field(timestamp_field);
            ParseState::CompleteMessage
        };

        StepResult::Advanced {
            consumed: size,
            next,
        }
    }

    fn read_extended_timestamp(&mut self, input: &[u8]) -> StepResult {
        if input.len() < 4 {
            return StepResult::NeedMoreData;
        }

        let extended = BigEndian::read_u32(&input[0..4]);
        if self.current.chunk_type != ChunkType::Type3 {
            self.apply_timestamp_field(extended);
        }

        StepResult::Advanced {
            consumed: 4,
            next: ParseState::CompleteMessage,
        }
    }

    fn apply_timestamp_field(&mut self, value: u32) {
        let header = &mut self.current.header;
        header.timestamp = match self.current.chunk_type {
            ChunkType::Type0 => RtmpTimestamp::new(value),
            _ => header.timestamp + value,
        };

        header.timestamp_field = value;
    }

    fn read_chunk_body(&mut self, input: &[u8]) -> StepResult {
        let csid = self.current.csid;
        let header = self.current.header;
        let total_length = header.message_length as usize;
        let received = self.partial_messages.get(&csid).map_or(0, |p| p.len());
        let chunk_length = min(total_length - received, self.max_chunk_size);
        if input.len() < chunk_length {
            return StepResult::NeedMoreData;
        }

        let partial = self
            .partial_messages
            .entry(csid)
            .or_insert_with(|| BytesMut::with_capacity(total_length));

        partial.extend_from_slice(&input[..chunk_length]);
        let complete = partial.len() == total_length;
        self.previous_headers.insert(csid, header);

        if !complete {
            return StepResult::Advanced {
                consumed: chunk_length,
                next: ParseState::FirstByteBasicHeader,
            };
        }

        let data = self
            .partial_messages
            .remove(&csid)
            .unwrap_or_default()
            .freeze();

        trace!(
            csid,
            msid = header.message_stream_id,
            message_type = %header.message_type,
            length = total_length,
            "Reassembled message"
        );

        StepResult::MessageCompleted {
            consumed: chunk_length,
            message: MessagePayload {
                timestamp: header.timestamp,
                message_type: header.message_type,
                message_stream_id: header.message_stream_id,
                data,
            },
        }
    }
}

impl Default for ChunkDeserializer {
    fn default() -> Self {
        ChunkDeserializer::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk_io::ChunkSerializer;
    use byteorder::WriteBytesExt;
    use bytes::Bytes;

    /// Feeds `input` through the state machine, returning every completed message and the
    /// number of bytes left unconsumed
    fn drain(
        deserializer: &mut ChunkDeserializer,
        state: &mut ParseState,
        input: &[u8],
    ) -> (Vec<MessagePayload>, usize) {
        let mut offset = 0;
        let mut messages = Vec::new();
        loop {
            match deserializer.step(*state, &input[offset..]).unwrap() {
                StepResult::NeedMoreData => return (messages, input.len() - offset),
                StepResult::Advanced { consumed, next } => {
                    offset += consumed;
                    *state = next;
                }
                StepResult::MessageCompleted { consumed, message } => {
                    offset += consumed;
                    *state = ParseState::FirstByteBasicHeader;
                    messages.push(message);
                }
            }
        }
    }

    fn read_all(deserializer: &mut ChunkDeserializer, input: &[u8]) -> Vec<MessagePayload> {
        let mut state = ParseState::FirstByteBasicHeader;
        let (messages, remaining) = drain(deserializer, &mut state, input);
        assert_eq!(remaining, 0, "input was not fully consumed");
        messages
    }

    fn type_0_chunk(csid: u8, timestamp: u32, msid: u32, type_id: u8, payload: &[u8]) -> Vec<u8> {
        let mut bytes = vec![csid];
        bytes.write_u24::<BigEndian>(timestamp.min(EXTENDED_TIMESTAMP_MARKER)).unwrap();
        bytes.write_u24::<BigEndian>(payload.len() as u32).unwrap();
        bytes.push(type_id);
        bytes.write_u32::<LittleEndian>(msid).unwrap();
        if timestamp >= EXTENDED_TIMESTAMP_MARKER {
            bytes.write_u32::<BigEndian>(timestamp).unwrap();
        }

        bytes.extend_from_slice(payload);
        bytes
    }

    #[test]
    fn reads_single_type_0_chunk() {
        let bytes = type_0_chunk(3, 72, 5, 9, &[1, 2, 3]);
        let mut deserializer = ChunkDeserializer::new();

        let messages = read_all(&mut deserializer, &bytes);

        assert_eq!(
            messages,
            vec![MessagePayload {
                timestamp: RtmpTimestamp::new(72),
                message_type: MessageType::Video,
                message_stream_id: 5,
                data: Bytes::from_static(&[1, 2, 3]),
            }]
        );
    }

    #[test]
    fn partial_input_leaves_bytes_for_next_read() {
        let bytes = type_0_chunk(3, 0, 1, 8, &[9; 20]);
        let mut deserializer = ChunkDeserializer::new();
        let mut state = ParseState::FirstByteBasicHeader;

        let (messages, remaining) = drain(&mut deserializer, &mut state, &bytes[..10]);
        assert!(messages.is_empty());
        assert_eq!(state, ParseState::ChunkMessageHeader);
        assert_eq!(remaining, 9);

        let (messages, _) = drain(&mut deserializer, &mut state, &bytes[1..]);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].data.len(), 20);
    }

    #[test]
    fn type_1_and_2_timestamps_are_deltas() {
        let mut bytes = type_0_chunk(4, 100, 1, 8, &[1]);
        // type 1: delta 20, length 2, type 9
        bytes.extend_from_slice(&[0x44, 0, 0, 20, 0, 0, 2, 9, 7, 7]);
        // type 2: delta 33
        bytes.extend_from_slice(&[0x84, 0, 0, 33, 8, 8]);

        let mut deserializer = ChunkDeserializer::new();
        let messages = read_all(&mut deserializer, &bytes);

        let times: Vec<u32> = messages.iter().map(|m| m.timestamp.value()).collect();
        assert_eq!(times, vec![100, 120, 153]);
        assert_eq!(messages[1].message_type, MessageType::Video);
        assert_eq!(messages[2].message_stream_id, 1);
        assert_eq!(&messages[2].data[..], &[8, 8]);
    }

    #[test]
    fn type_3_new_message_copies_previous_timestamp() {
        let mut bytes = type_0_chunk(4, 10, 1, 8, &[1]);
        bytes.extend_from_slice(&[0x84, 0, 0, 25, 2]);
        bytes.extend_from_slice(&[0xc4, 3]);
        bytes.extend_from_slice(&[0xc4, 4]);

        let mut deserializer = ChunkDeserializer::new();
        let messages = read_all(&mut deserializer, &bytes);

        let times: Vec<u32> = messages.iter().map(|m| m.timestamp.value()).collect();
        assert_eq!(times, vec![10, 35, 35, 35]);
        assert_eq!(&messages[3].data[..], &[4]);
    }

    #[test]
    fn type_3_after_type_0_does_not_add_absolute_timestamp_again() {
        let mut bytes = type_0_chunk(4, 100, 1, 8, &[0xaa]);
        bytes.extend_from_slice(&[0xc4, 0xbb]);

        let mut deserializer = ChunkDeserializer::new();
        let messages = read_all(&mut deserializer, &bytes);

        let times: Vec<u32> = messages.iter().map(|m| m.timestamp.value()).collect();
        assert_eq!(times, vec![100, 100]);
        assert_eq!(&messages[1].data[..], &[0xbb]);
    }

    #[test]
    fn multi_chunk_message_is_reassembled_without_advancing_time() {
        let payload: Vec<u8> = (0..300).map(|x| x as u8).collect();
        let mut bytes = type_0_chunk(5, 50, 1, 18, &[]);
        bytes[6] = 0x2c; // length 300
        bytes[5] = 0x01;
        bytes.extend_from_slice(&payload[..128]);
        bytes.push(0xc5);
        bytes.extend_from_slice(&payload[128..256]);
        bytes.push(0xc5);
        bytes.extend_from_slice(&payload[256..]);

        let mut deserializer = ChunkDeserializer::new();
        let messages = read_all(&mut deserializer, &bytes);

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].timestamp, RtmpTimestamp::new(50));
        assert_eq!(&messages[0].data[..], &payload[..]);
    }

    #[test]
    fn interleaved_chunk_streams_are_reassembled_independently() {
        let video: Vec<u8> = (0..200).map(|x| x as u8).collect();
        let mut bytes = type_0_chunk(3, 10, 1, 9, &[]);
        bytes[5] = 0;
        bytes[6] = 200;
        bytes.extend_from_slice(&video[..128]);
        bytes.extend(type_0_chunk(4, 20, 1, 8, &[5, 6]));
        bytes.push(0xc3);
        bytes.extend_from_slice(&video[128..]);

        let mut deserializer = ChunkDeserializer::new();
        let messages = read_all(&mut deserializer, &bytes);

        let summary: Vec<(MessageType, usize)> = messages
            .iter()
            .map(|m| (m.message_type, m.data.len()))
            .collect();
        assert_eq!(summary, vec![(MessageType::Audio, 2), (MessageType::Video, 200)]);
        assert_eq!(messages[1].timestamp, RtmpTimestamp::new(10));
        assert_eq!(&messages[1].data[..], &video[..]);
    }

    #[test]
    fn extended_timestamp_is_read_from_trailing_bytes() {
        let bytes = type_0_chunk(3, 0x0100_0000, 1, 8, &[1, 2]);
        let mut deserializer = ChunkDeserializer::new();
        let mut state = ParseState::FirstByteBasicHeader;

        // Basic header plus message header but no extended timestamp yet
        let (messages, _) = drain(&mut deserializer, &mut state, &bytes[..12]);
        assert!(messages.is_empty());
        assert_eq!(state, ParseState::ExtendedTimestamp);

        let (messages, remaining) = drain(&mut deserializer, &mut state, &bytes[12..]);
        assert_eq!(remaining, 0);
        assert_eq!(messages[0].timestamp, RtmpTimestamp::new(0x0100_0000));
    }

    #[test]
    fn type_3_continuation_after_extended_timestamp_consumes_extension() {
        let payload = vec![6_u8; 200];
        let mut serializer = ChunkSerializer::new();
        let message = MessagePayload::new(
            RtmpTimestamp::new(0x0200_0000),
            MessageType::Video,
            1,
            Bytes::from(payload.clone()),
        );
        let bytes: Vec<u8> = serializer
            .serialize(6, &message)
            .unwrap()
            .iter()
            .flat_map(|c| c.iter().copied())
            .collect();

        let mut deserializer = ChunkDeserializer::new();
        let messages = read_all(&mut deserializer, &bytes);
        assert_eq!(messages, vec![message]);
    }

    #[test]
    fn non_type_0_without_history_is_an_error() {
        let mut deserializer = ChunkDeserializer::new();
        let result = deserializer.step(ParseState::FirstByteBasicHeader, &[0x43, 0, 0]);
        assert_eq!(
            result.unwrap_err(),
            ChunkDeserializationError::NoPreviousChunkOnStream { csid: 3 }
        );
    }

    #[test]
    fn larger_chunk_size_takes_effect_on_next_body() {
        let payload = vec![1_u8; 500];
        let bytes = type_0_chunk(3, 0, 1, 9, &payload);

        let mut deserializer = ChunkDeserializer::new();
        deserializer.set_max_chunk_size(4096).unwrap();
        let messages = read_all(&mut deserializer, &bytes);

        assert_eq!(messages[0].data.len(), 500);
    }

    #[test]
    fn invalid_chunk_sizes_are_rejected() {
        let mut deserializer = ChunkDeserializer::new();
        assert!(deserializer.set_max_chunk_size(0).is_err());
        assert!(deserializer.set_max_chunk_size(MAX_CHUNK_SIZE + 1).is_err());
        assert_eq!(deserializer.max_chunk_size(), INITIAL_CHUNK_SIZE);
    }

    #[test]
    fn abort_discards_partial_message() {
        let mut bytes = type_0_chunk(3, 0, 1, 9, &[]);
        bytes[6] = 200; // declares 200 bytes, only the first chunk follows
        bytes.extend_from_slice(&[1_u8; 128]);

        let mut deserializer = ChunkDeserializer::new();
        let mut state = ParseState::FirstByteBasicHeader;
        let (messages, _) = drain(&mut deserializer, &mut state, &bytes);
        assert!(messages.is_empty());

        deserializer.abort_message(3);

        // Fresh message on the same chunk stream starts from an empty buffer
        let next = type_0_chunk(3, 0, 1, 9, &[2, 2]);
        let (messages, _) = drain(&mut deserializer, &mut state, &next);
        assert_eq!(&messages[0].data[..], &[2, 2]);
    }

    #[test]
    fn zero_length_message_completes_immediately() {
        let bytes = type_0_chunk(3, 0, 0, 20, &[]);
        let mut deserializer = ChunkDeserializer::new();

        let messages = read_all(&mut deserializer, &bytes);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].data.is_empty());
    }

    #[test]
    fn handshake_states_are_rejected() {
        let mut deserializer = ChunkDeserializer::new();
        assert!(deserializer.step(ParseState::HandshakeC2, &[]).is_err());
    }
}
