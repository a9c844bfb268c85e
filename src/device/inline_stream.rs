//! Synchronous stream that runs each launch on the calling thread and
//! records what was launched. Useful for deterministic tests and for
//! observing that a call enqueued nothing.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Mutex;

use super::memory::Allocation;
use super::{DeviceError, DevicePtr, DeviceResult, DeviceStream, KernelLaunch, StreamId};
use crate::status::panic_message;

#[derive(Default)]
struct Record {
    launched: Vec<String>,
    fault: Option<DeviceError>,
}

pub struct InlineStream {
    id: StreamId,
    record: Mutex<Record>,
}

impl InlineStream {
    pub fn new() -> Self {
        Self {
            id: StreamId::next(),
            record: Mutex::new(Record::default()),
        }
    }

    /// Names of every kernel launched so far, in order.
    pub fn launched_kernels(&self) -> Vec<String> {
        self.lock().launched.clone()
    }

    pub fn clear(&self) {
        self.lock().launched.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Record> {
        self.record.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for InlineStream {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceStream for InlineStream {
    fn id(&self) -> StreamId {
        self.id
    }

    fn kind(&self) -> String {
        "host-inline".to_string()
    }

    fn launch(&self, kernel: KernelLaunch) -> DeviceResult<()> {
        let (name, body) = kernel.into_parts();
        self.lock().launched.push(name.clone());
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(body)) {
            let message = panic_message(&*payload);
            self.lock()
                .fault
                .get_or_insert(DeviceError::KernelFault { kernel: name, message });
        }
        Ok(())
    }

    fn synchronize(&self) -> DeviceResult<()> {
        match self.lock().fault.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn allocate(&self, bytes: usize) -> DeviceResult<DevicePtr> {
        Ok(DevicePtr::from_allocation(Allocation::zeroed(bytes)?))
    }

    fn launch_count(&self) -> u64 {
        self.lock().launched.len() as u64
    }
}
