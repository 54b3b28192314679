//! Getting local shopping writes to the remote endpoint.
//!
//! - [`queue`]: durable record of writes that have not gone through yet
//! - [`writer`]: the endpoint client and batch sending
//! - [`debounce`]: per-key coalescing of rapid writes

pub mod debounce;
pub mod queue;
pub mod writer;

pub use debounce::{Debouncer, DEBOUNCE_WINDOW};
pub use queue::{
    QueuePersistenceError, RetryOutcome, SyncOperation, SyncQueue, SyncQueueItem, MAX_RETRIES,
};
pub use writer::{
    batch_update, BatchResult, FailedWrite, HttpRemoteWriter, RemoteWriteError, RemoteWriter,
    WriteRequest, WriteResponse,
};
