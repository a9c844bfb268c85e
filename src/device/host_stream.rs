//! Asynchronous host-emulated device stream.
//!
//! A dedicated worker thread drains launches in FIFO order. `launch`
//! returns as soon as the work is queued; `synchronize` waits for a fence
//! to come back through the queue. A panicking kernel does not take the
//! worker down: the fault is recorded and reported by the next
//! `synchronize`.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};

use super::memory::Allocation;
use super::{DeviceError, DevicePtr, DeviceResult, DeviceStream, KernelLaunch, StreamId};
use crate::status::panic_message;

enum Command {
    Launch(KernelLaunch),
    Fence(Sender<()>),
    Shutdown,
}

#[derive(Default)]
struct StreamState {
    launched: AtomicU64,
    completed: AtomicU64,
    fault: Mutex<Option<DeviceError>>,
    allocated_bytes: Arc<AtomicUsize>,
}

pub struct HostStream {
    id: StreamId,
    tx: Sender<Command>,
    state: Arc<StreamState>,
    worker: Mutex<Option<JoinHandle<()>>>,
    memory_limit: Option<usize>,
}

impl HostStream {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// A stream whose allocator refuses to hold more than `bytes` live at once.
    pub fn with_memory_limit(bytes: usize) -> Self {
        Self::build(Some(bytes))
    }

    fn build(memory_limit: Option<usize>) -> Self {
        let id = StreamId::next();
        let (tx, rx) = unbounded();
        let state = Arc::new(StreamState::default());
        let worker_state = Arc::clone(&state);
        let worker = thread::Builder::new()
            .name(format!("gblas-{id}"))
            .spawn(move || worker_loop(rx, worker_state))
            .ok();
        if worker.is_none() {
            log::warn!("failed to spawn worker for {id}; launches will be rejected");
        }
        Self {
            id,
            tx,
            state,
            worker: Mutex::new(worker),
            memory_limit,
        }
    }

    /// Bytes held by allocations from this stream that are still alive.
    pub fn allocated_bytes(&self) -> usize {
        self.state.allocated_bytes.load(Ordering::Acquire)
    }

    /// Launches that have finished executing.
    pub fn completed_count(&self) -> u64 {
        self.state.completed.load(Ordering::Acquire)
    }
}

impl Default for HostStream {
    fn default() -> Self {
        Self::new()
    }
}

fn worker_loop(rx: Receiver<Command>, state: Arc<StreamState>) {
    while let Ok(cmd) = rx.recv() {
        match cmd {
            Command::Launch(kernel) => {
                let (name, body) = kernel.into_parts();
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(body)) {
                    let message = panic_message(&*payload);
                    log::error!("kernel {name} faulted: {message}");
                    let mut fault = state.fault.lock().unwrap_or_else(|e| e.into_inner());
                    fault.get_or_insert(DeviceError::KernelFault { kernel: name, message });
                }
                state.completed.fetch_add(1, Ordering::AcqRel);
            }
            Command::Fence(done) => {
                let _ = done.send(());
            }
            Command::Shutdown => break,
        }
    }
}

impl DeviceStream for HostStream {
    fn id(&self) -> StreamId {
        self.id
    }

    fn kind(&self) -> String {
        format!("host-emulated/{}t", rayon::current_num_threads())
    }

    fn launch(&self, kernel: KernelLaunch) -> DeviceResult<()> {
        let name = kernel.name().to_string();
        self.tx.send(Command::Launch(kernel)).map_err(|_| DeviceError::LaunchFailed {
            kernel: name,
            message: format!("{} worker is gone", self.id),
        })?;
        self.state.launched.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn synchronize(&self) -> DeviceResult<()> {
        let (done_tx, done_rx) = bounded(1);
        self.tx
            .send(Command::Fence(done_tx))
            .map_err(|_| DeviceError::Disconnected(self.id))?;
        done_rx.recv().map_err(|_| DeviceError::Disconnected(self.id))?;

        let mut fault = self.state.fault.lock().unwrap_or_else(|e| e.into_inner());
        match fault.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn allocate(&self, bytes: usize) -> DeviceResult<DevicePtr> {
        let counter = &self.state.allocated_bytes;
        match self.memory_limit {
            Some(limit) => {
                counter
                    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |in_use| {
                        in_use.checked_add(bytes).filter(|&total| total <= limit)
                    })
                    .map_err(|_| DeviceError::OutOfMemory { requested: bytes, limit })?;
            }
            None => {
                counter.fetch_add(bytes, Ordering::AcqRel);
            }
        }
        Ok(DevicePtr::from_allocation(Allocation::zeroed_accounted(bytes, counter)?))
    }

    fn launch_count(&self) -> u64 {
        self.state.launched.load(Ordering::Acquire)
    }
}

impl Drop for HostStream {
    fn drop(&mut self) {
        let _ = self.tx.send(Command::Shutdown);
        let worker = self.worker.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = worker {
            if handle.join().is_err() {
                log::warn!("{} worker panicked during shutdown", self.id);
            }
        }
    }
}
