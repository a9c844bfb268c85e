//! Library context passed by reference to every routine.
//!
//! The handle owns an `Arc` to its stream plus the per-session execution
//! flags. Routines only read it, except for the device-memory bookkeeping
//! and profile counters, which sit behind their own locks.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::HandleConfig;
use crate::device::{DeviceBuffer, DevicePtr, DeviceStream, HostStream};
use crate::element::DeviceElement;
use crate::status::{BlasError, BlasResult};
use crate::types::{AtomicsMode, CheckNumericsMode, LayerMode, PointerMode};

#[derive(Debug, Default)]
struct MemoryState {
    querying: bool,
    queried_bytes: usize,
    limit: Option<usize>,
}

pub struct Handle {
    stream: Arc<dyn DeviceStream>,
    pointer_mode: PointerMode,
    layer_mode: LayerMode,
    check_numerics: CheckNumericsMode,
    atomics_mode: AtomicsMode,
    memory: Mutex<MemoryState>,
    workspace_in_use: Arc<AtomicUsize>,
    profile: Mutex<BTreeMap<String, u64>>,
}

/// Call workspace allocated through the handle.
///
/// Counted as in use until dropped; kernels move it into their closure so
/// it lives until the launch has run.
pub(crate) struct Workspace {
    ptr: DevicePtr,
    bytes: usize,
    in_use: Arc<AtomicUsize>,
}

impl Workspace {
    pub(crate) fn ptr(&self) -> &DevicePtr {
        &self.ptr
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.in_use.fetch_sub(self.bytes, Ordering::AcqRel);
    }
}

impl Handle {
    /// Handle on `stream`, configured from the environment.
    pub fn new(stream: Arc<dyn DeviceStream>) -> Self {
        Self::with_config(stream, HandleConfig::from_env())
    }

    pub fn with_config(stream: Arc<dyn DeviceStream>, config: HandleConfig) -> Self {
        Self {
            stream,
            pointer_mode: config.pointer_mode,
            layer_mode: config.layer_mode,
            check_numerics: config.check_numerics,
            atomics_mode: config.atomics_mode,
            memory: Mutex::new(MemoryState {
                limit: config.device_memory_limit,
                ..MemoryState::default()
            }),
            workspace_in_use: Arc::new(AtomicUsize::new(0)),
            profile: Mutex::new(BTreeMap::new()),
        }
    }

    /// Handle on a fresh asynchronous [`HostStream`].
    pub fn host() -> Self {
        Self::new(Arc::new(HostStream::new()))
    }

    pub fn stream(&self) -> &Arc<dyn DeviceStream> {
        &self.stream
    }

    pub fn set_stream(&mut self, stream: Arc<dyn DeviceStream>) {
        self.stream = stream;
    }

    pub fn synchronize(&self) -> BlasResult<()> {
        self.stream.synchronize().map_err(BlasError::from)
    }

    pub fn pointer_mode(&self) -> PointerMode {
        self.pointer_mode
    }

    pub fn set_pointer_mode(&mut self, mode: PointerMode) {
        self.pointer_mode = mode;
    }

    pub fn layer_mode(&self) -> LayerMode {
        self.layer_mode
    }

    pub fn set_layer_mode(&mut self, mode: LayerMode) {
        self.layer_mode = mode;
    }

    pub fn check_numerics(&self) -> CheckNumericsMode {
        self.check_numerics
    }

    pub fn set_check_numerics(&mut self, mode: CheckNumericsMode) {
        self.check_numerics = mode;
    }

    pub fn atomics_mode(&self) -> AtomicsMode {
        self.atomics_mode
    }

    pub fn set_atomics_mode(&mut self, mode: AtomicsMode) {
        self.atomics_mode = mode;
    }

    // ── Device memory bookkeeping ───────────────────────────────────────

    /// Enter size-query mode: routines report their workspace needs and
    /// return without doing any work.
    pub fn start_device_memory_size_query(&self) -> BlasResult<()> {
        let mut mem = self.memory();
        if mem.querying {
            return Err(BlasError::SizeQueryMismatch);
        }
        mem.querying = true;
        mem.queried_bytes = 0;
        Ok(())
    }

    /// Leave size-query mode and return the largest size reported.
    pub fn stop_device_memory_size_query(&self) -> BlasResult<usize> {
        let mut mem = self.memory();
        if !mem.querying {
            return Err(BlasError::SizeQueryMismatch);
        }
        mem.querying = false;
        Ok(std::mem::take(&mut mem.queried_bytes))
    }

    pub fn is_device_memory_size_query(&self) -> bool {
        self.memory().querying
    }

    /// Record a workspace requirement while in size-query mode.
    pub(crate) fn report_device_memory_size(&self, bytes: usize) {
        let mut mem = self.memory();
        if mem.querying {
            mem.queried_bytes = mem.queried_bytes.max(bytes);
        }
    }

    /// Cap the workspace a single call may allocate. `None` removes the cap.
    pub fn set_device_memory_size(&self, limit: Option<usize>) {
        self.memory().limit = limit;
    }

    pub fn device_memory_limit(&self) -> Option<usize> {
        self.memory().limit
    }

    /// Bytes of call workspace still held by queued or running kernels.
    pub fn device_memory_in_use(&self) -> usize {
        self.workspace_in_use.load(Ordering::Acquire)
    }

    /// Allocate call workspace, honouring the handle's per-call limit.
    ///
    /// Workspace still held by earlier queued calls does not count against
    /// the limit; the stream's own allocator bounds the total.
    pub(crate) fn device_malloc(&self, bytes: usize) -> BlasResult<Workspace> {
        if let Some(limit) = self.device_memory_limit() {
            if bytes > limit {
                return Err(BlasError::Memory(format!(
                    "workspace of {bytes} bytes exceeds device memory size {limit}"
                )));
            }
        }
        let ptr = self.stream.allocate(bytes).map_err(|e| BlasError::Memory(e.to_string()))?;
        self.workspace_in_use.fetch_add(bytes, Ordering::AcqRel);
        Ok(Workspace {
            ptr,
            bytes,
            in_use: Arc::clone(&self.workspace_in_use),
        })
    }

    fn memory(&self) -> MutexGuard<'_, MemoryState> {
        self.memory.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ── Buffer helpers ──────────────────────────────────────────────────

    pub fn alloc<T: DeviceElement>(&self, len: usize) -> BlasResult<DeviceBuffer<T>> {
        Ok(DeviceBuffer::zeroed(self.stream.as_ref(), len)?)
    }

    pub fn upload<T: DeviceElement>(&self, data: &[T]) -> BlasResult<DeviceBuffer<T>> {
        Ok(DeviceBuffer::from_host(self.stream.as_ref(), data)?)
    }

    pub fn download<T: DeviceElement>(&self, buf: &DeviceBuffer<T>) -> BlasResult<Vec<T>> {
        Ok(buf.copy_to_host(self.stream.as_ref())?)
    }

    // ── Profile layer ───────────────────────────────────────────────────

    pub(crate) fn record_profile(&self, signature: String) {
        let mut profile = self.profile.lock().unwrap_or_else(|e| e.into_inner());
        *profile.entry(signature).or_insert(0) += 1;
    }

    /// Call counts per argument signature, sorted by signature.
    pub fn profile_counts(&self) -> Vec<(String, u64)> {
        let profile = self.profile.lock().unwrap_or_else(|e| e.into_inner());
        profile.iter().map(|(k, v)| (k.clone(), *v)).collect()
    }

    /// YAML summary of the profile layer.
    pub fn profile_report(&self) -> String {
        let mut out = String::new();
        for (signature, count) in self.profile_counts() {
            out.push_str(&format!("- {{ {signature}, call_count: {count} }}\n"));
        }
        out
    }
}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("stream", &self.stream)
            .field("pointer_mode", &self.pointer_mode)
            .field("layer_mode", &self.layer_mode)
            .field("check_numerics", &self.check_numerics)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::InlineStream;

    fn inline_handle() -> Handle {
        Handle::with_config(Arc::new(InlineStream::new()), HandleConfig::default())
    }

    #[test]
    fn test_size_query_protocol() {
        let handle = inline_handle();
        assert!(!handle.is_device_memory_size_query());
        assert!(matches!(handle.stop_device_memory_size_query(), Err(BlasError::SizeQueryMismatch)));

        handle.start_device_memory_size_query().unwrap();
        assert!(handle.is_device_memory_size_query());
        assert!(handle.start_device_memory_size_query().is_err());
        handle.report_device_memory_size(128);
        handle.report_device_memory_size(64);
        assert_eq!(handle.stop_device_memory_size_query().unwrap(), 128);
        assert!(!handle.is_device_memory_size_query());

        // Reports outside a query are ignored.
        handle.report_device_memory_size(4096);
        handle.start_device_memory_size_query().unwrap();
        assert_eq!(handle.stop_device_memory_size_query().unwrap(), 0);
    }

    #[test]
    fn test_workspace_limit() {
        let handle = inline_handle();
        handle.set_device_memory_size(Some(256));
        let held = handle.device_malloc(192).unwrap();
        assert_eq!(handle.device_memory_in_use(), 192);
        // The limit applies per call, not to workspace still held by queued work.
        let second = handle.device_malloc(192).unwrap();
        assert_eq!(handle.device_memory_in_use(), 384);
        drop(held);
        drop(second);
        assert_eq!(handle.device_memory_in_use(), 0);
        assert!(handle.device_malloc(256).is_ok());
        assert!(matches!(handle.device_malloc(257), Err(BlasError::Memory(_))));
        handle.set_device_memory_size(None);
        assert!(handle.device_malloc(1 << 16).is_ok());
    }

    #[test]
    fn test_profile_counts() {
        let handle = inline_handle();
        handle.record_profile("gemm_ex: b".into());
        handle.record_profile("gemm_ex: a".into());
        handle.record_profile("gemm_ex: b".into());
        assert_eq!(
            handle.profile_counts(),
            vec![("gemm_ex: a".to_string(), 1), ("gemm_ex: b".to_string(), 2)]
        );
        assert!(handle.profile_report().contains("call_count: 2"));
    }

    #[test]
    fn test_buffer_helpers() {
        let handle = inline_handle();
        let buf = handle.upload(&[1.0f64, 2.0, 3.0]).unwrap();
        assert_eq!(handle.download(&buf).unwrap(), vec![1.0, 2.0, 3.0]);
        assert_eq!(handle.alloc::<i32>(5).unwrap().len(), 5);
    }
}
