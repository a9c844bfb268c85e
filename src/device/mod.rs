//! Device execution context: streams, kernel launches and device memory.
//!
//! The library never blocks on a stream except through
//! [`DeviceStream::synchronize`]. Launches on one stream run in FIFO order;
//! launches on different streams are unordered.

pub mod host_stream;
pub mod inline_stream;
pub mod memory;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

pub use host_stream::HostStream;
pub use inline_stream::InlineStream;
pub use memory::{DeviceBuffer, DevicePtr};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("kernel {kernel} faulted: {message}")]
    KernelFault { kernel: String, message: String },
    #[error("failed to enqueue {kernel}: {message}")]
    LaunchFailed { kernel: String, message: String },
    #[error("out of device memory: requested {requested} bytes, limit {limit}")]
    OutOfMemory { requested: usize, limit: usize },
    #[error("stream {0} is no longer running")]
    Disconnected(StreamId),
}

pub type DeviceResult<T> = Result<T, DeviceError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(pub u64);

impl StreamId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        StreamId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream#{}", self.0)
    }
}

/// A unit of device work.
pub struct KernelLaunch {
    name: String,
    body: Box<dyn FnOnce() + Send + 'static>,
}

impl KernelLaunch {
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            name: name.into(),
            body: Box::new(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn into_parts(self) -> (String, Box<dyn FnOnce() + Send + 'static>) {
        (self.name, self.body)
    }
}

impl fmt::Debug for KernelLaunch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelLaunch").field("name", &self.name).finish()
    }
}

/// A command stream on one device.
pub trait DeviceStream: Send + Sync {
    fn id(&self) -> StreamId;

    /// Short device description, used for tuning fingerprints and logs.
    fn kind(&self) -> String;

    /// Enqueue `kernel`. Returns once the work is queued, not completed.
    fn launch(&self, kernel: KernelLaunch) -> DeviceResult<()>;

    /// Block until every launch enqueued so far has completed.
    fn synchronize(&self) -> DeviceResult<()>;

    /// Allocate zero-initialised device memory.
    fn allocate(&self, bytes: usize) -> DeviceResult<DevicePtr>;

    /// Number of kernels enqueued on this stream since creation.
    fn launch_count(&self) -> u64;
}

impl fmt::Debug for dyn DeviceStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind(), self.id())
    }
}
