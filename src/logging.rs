//! Layer-mode call logging.
//!
//! Each public routine builds a [`CallRecord`] and hands it to [`log_call`].
//! Depending on the handle's [`LayerMode`] the record is emitted as a trace
//! line, a replayable bench command or a profile signature count. All three
//! go through the `log` facade under their own targets, so a subscriber can
//! route them independently. Logging never changes the outcome of a call.

use std::fmt::Display;

use crate::handle::Handle;
use crate::types::LayerMode;

pub const TRACE_TARGET: &str = "gblas::trace";
pub const BENCH_TARGET: &str = "gblas::bench";
pub const PROFILE_TARGET: &str = "gblas::profile";

/// Name of the bench client that replays logged calls.
pub const BENCH_CLIENT: &str = "./gblas-bench";

#[derive(Debug, Clone)]
struct Arg {
    name: &'static str,
    value: String,
    /// Pointers and other per-run values only appear in the trace layer.
    replayable: bool,
}

/// Arguments of one public call, in declaration order.
#[derive(Debug, Clone)]
pub struct CallRecord {
    routine: &'static str,
    args: Vec<Arg>,
}

impl CallRecord {
    pub fn new(routine: &'static str) -> Self {
        Self { routine, args: Vec::new() }
    }

    /// A size, type or mode argument. Appears in every layer.
    pub fn arg(mut self, name: &'static str, value: impl Display) -> Self {
        self.args.push(Arg { name, value: value.to_string(), replayable: true });
        self
    }

    /// A pointer argument. Trace layer only.
    pub fn ptr(mut self, name: &'static str, value: impl Display) -> Self {
        self.args.push(Arg { name, value: value.to_string(), replayable: false });
        self
    }

    pub fn routine(&self) -> &'static str {
        self.routine
    }

    /// `routine,v1,v2,...`
    pub fn trace_line(&self) -> String {
        let mut line = self.routine.to_string();
        for arg in &self.args {
            line.push(',');
            line.push_str(&arg.value);
        }
        line
    }

    /// `./gblas-bench -f routine --name value ...`
    pub fn bench_line(&self) -> String {
        let mut line = format!("{BENCH_CLIENT} -f {}", self.routine);
        for arg in self.args.iter().filter(|a| a.replayable) {
            line.push_str(&format!(" --{} {}", arg.name, arg.value));
        }
        line
    }

    /// `gblas_function: routine, name: value, ...`
    pub fn profile_signature(&self) -> String {
        let mut sig = format!("gblas_function: {}", self.routine);
        for arg in self.args.iter().filter(|a| a.replayable) {
            sig.push_str(&format!(", {}: {}", arg.name, arg.value));
        }
        sig
    }
}

/// Emit `record` on every layer enabled on `handle`.
pub fn log_call(handle: &Handle, record: &CallRecord) {
    let mode = handle.layer_mode();
    if mode.is_empty() {
        return;
    }
    if mode.contains(LayerMode::LOG_TRACE) {
        log::info!(target: TRACE_TARGET, "{}", record.trace_line());
    }
    if mode.contains(LayerMode::LOG_BENCH) {
        log::info!(target: BENCH_TARGET, "{}", record.bench_line());
    }
    if mode.contains(LayerMode::LOG_PROFILE) {
        let signature = record.profile_signature();
        log::trace!(target: PROFILE_TARGET, "{signature}");
        handle.record_profile(signature);
    }
}
