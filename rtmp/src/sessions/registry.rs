use super::SessionError;
use crate::chunk_io::{CONTROL_CHUNK_STREAM_ID, MAX_CHUNK_STREAM_ID};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// Message stream carrying NetConnection commands and protocol control messages
pub const CONTROL_MESSAGE_STREAM_ID: u32 = 0;

const FIRST_CHUNK_STREAM_ID: u32 = CONTROL_CHUNK_STREAM_ID + 1;
const FIRST_MESSAGE_STREAM_ID: u32 = 1;

/// Id allocation for the chunk and message streams of one session.
///
/// Chunk stream ids count upward and are only searched for once the counter runs past the
/// largest encodable id.  Released message stream ids are reused lowest first, so an id is
/// never handed out twice while its stream is alive.
pub struct StreamRegistry<T> {
    next_chunk_stream_id: u32,
    chunk_stream_ids: HashSet<u32>,
    next_message_stream_id: u32,
    free_message_stream_ids: BTreeSet<u32>,
    message_streams: HashMap<u32, Arc<T>>,
}

impl<T> StreamRegistry<T> {
    pub fn new() -> StreamRegistry<T> {
        StreamRegistry {
            next_chunk_stream_id: FIRST_CHUNK_STREAM_ID,
            chunk_stream_ids: HashSet::new(),
            next_message_stream_id: FIRST_MESSAGE_STREAM_ID,
            free_message_stream_ids: BTreeSet::new(),
            message_streams: HashMap::new(),
        }
    }

    pub fn allocate_chunk_stream_id(&mut self) -> Result<u32, SessionError> {
        if self.next_chunk_stream_id <= MAX_CHUNK_STREAM_ID {
            let id = self.next_chunk_stream_id;
            self.next_chunk_stream_id += 1;
            self.chunk_stream_ids.insert(id);
            return Ok(id);
        }

        // Slow path once the counter has wrapped
        let id = (FIRST_CHUNK_STREAM_ID..=MAX_CHUNK_STREAM_ID)
            .find(|id| !self.chunk_stream_ids.contains(id))
            .ok_or(SessionError::ChunkStreamIdsExhausted)?;

        self.chunk_stream_ids.insert(id);
        Ok(id)
    }

    pub fn release_chunk_stream_id(&mut self, id: u32) {
        self.chunk_stream_ids.remove(&id);
    }

    pub fn live_chunk_stream_count(&self) -> usize {
        self.chunk_stream_ids.len()
    }

    /// Picks an id not used by any live message stream.  The stream is created by `build` and
    /// stored under that id.
    pub fn add_message_stream<F>(&mut self, build: F) -> Result<Arc<T>, SessionError>
    where
        F: FnOnce(u32) -> T,
    {
        let id = self.allocate_message_stream_id()?;
        let stream = Arc::new(build(id));
        self.message_streams.insert(id, stream.clone());
        Ok(stream)
    }

    /// Stores the stream under a fixed id, for the control stream
    pub fn insert_message_stream(&mut self, id: u32, stream: Arc<T>) {
        self.message_streams.insert(id, stream);
    }

    pub fn message_stream(&self, id: u32) -> Option<Arc<T>> {
        self.message_streams.get(&id).cloned()
    }

    /// Removes the stream and frees its id.  The control stream is never removed.
    pub fn remove_message_stream(&mut self, id: u32) -> Option<Arc<T>> {
        if id == CONTROL_MESSAGE_STREAM_ID {
            return None;
        }

        let stream = self.message_streams.remove(&id)?;
        self.free_message_stream_ids.insert(id);
        Some(stream)
    }

    pub fn message_stream_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.message_streams.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Drops every stream, returning them so they can be released outside any lock
    pub fn drain_message_streams(&mut self) -> Vec<Arc<T>> {
        self.message_streams.drain().map(|(_, stream)| stream).collect()
    }

    fn allocate_message_stream_id(&mut self) -> Result<u32, SessionError> {
        while let Some(id) = self.free_message_stream_ids.pop_first() {
            if !self.message_streams.contains_key(&id) {
                return Ok(id);
            }
        }

        while self.next_message_stream_id != u32::MAX {
            let id = self.next_message_stream_id;
            self.next_message_stream_id += 1;
            if !self.message_streams.contains_key(&id) {
                return Ok(id);
            }
        }

        Err(SessionError::MessageStreamIdsExhausted)
    }
}

impl<T> Default for StreamRegistry<T> {
    fn default() -> Self {
        StreamRegistry::new()
    }
}
