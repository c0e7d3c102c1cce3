use core::sync::atomic::{AtomicU64, Ordering};

use crate::channel::{ChannelId, ChannelRecord};
use crate::prelude::*;
use crate::util::status::Status;

#[derive(Clone, Debug)]
/// Error returned by persister
pub enum Error {
    /// Persister is temporarily unavailable, might work later
    Unavailable(String),
    /// Inconsistent state, needed resource is missing
    NotFound(String),
    /// Non-recoverable internal error
    Internal(String),
}

impl From<Error> for Status {
    fn from(e: Error) -> Self {
        match e {
            Error::Unavailable(s) => Status::unavailable(s),
            Error::NotFound(s) => Status::failed_precondition(s),
            Error::Internal(s) => Status::internal(s),
        }
    }
}

/// Persister of channel records and of the node's channel counter
///
/// A handshake calls [Persist::next_channel_index] once, when it prepares its
/// record, and [Persist::persist_channel] when the channel is established and
/// again when it opens.
pub trait Persist: SendSync {
    /// Allocate the next channel index.
    ///
    /// Must be monotonic and atomic, two handshakes must never get the same
    /// index, or they would derive the same keys.
    fn next_channel_index(&self) -> Result<u64, Error>;

    /// Store a channel record, replacing any previous version
    fn persist_channel(&self, record: &ChannelRecord) -> Result<(), Error>;

    /// Retrieve the stored records
    fn get_channels(&self) -> Result<Vec<(ChannelId, ChannelRecord)>, Error>;
}

/// An in-memory persister
#[derive(Default)]
pub struct MemoryPersister {
    next_index: AtomicU64,
    channels: Mutex<OrderedMap<ChannelId, ChannelRecord>>,
}

impl MemoryPersister {
    /// Create an empty persister
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a persister whose counter starts at `next_index`, for a node
    /// restored from elsewhere
    pub fn with_next_index(next_index: u64) -> Self {
        Self { next_index: AtomicU64::new(next_index), channels: Mutex::new(OrderedMap::new()) }
    }
}

impl SendSync for MemoryPersister {}

impl Persist for MemoryPersister {
    fn next_channel_index(&self) -> Result<u64, Error> {
        let index = self.next_index.fetch_add(1, Ordering::SeqCst);
        if index == u64::MAX {
            return Err(Error::Internal("channel index exhausted".to_string()));
        }
        Ok(index)
    }

    fn persist_channel(&self, record: &ChannelRecord) -> Result<(), Error> {
        let id = record
            .channel_id()
            .ok_or_else(|| Error::NotFound("channel has no funding transactions".to_string()))?;
        let mut channels = self.channels.lock().map_err(|_| Error::Internal("poisoned".into()))?;
        channels.insert(id, record.clone());
        Ok(())
    }

    fn get_channels(&self) -> Result<Vec<(ChannelId, ChannelRecord)>, Error> {
        let channels = self.channels.lock().map_err(|_| Error::Internal("poisoned".into()))?;
        Ok(channels.iter().map(|(id, r)| (id.clone(), r.clone())).collect())
    }
}
