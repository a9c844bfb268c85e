//! Timing of repeated dispatches.
//!
//! Every timed call is bracketed by stream synchronization, so a sample
//! covers enqueue and completion of exactly one call. Cold calls run first
//! and are discarded.

use std::fmt;
use std::time::Instant;

use crate::handle::Handle;
use crate::status::BlasResult;

/// Number of discarded and timed calls per candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TuneConfig {
    pub cold_calls: usize,
    pub hot_calls: usize,
}

impl Default for TuneConfig {
    fn default() -> Self {
        TuneConfig {
            cold_calls: 2,
            hot_calls: 10,
        }
    }
}

impl TuneConfig {
    /// Smoke-test setting: one discarded call, two timed.
    pub fn fast() -> Self {
        TuneConfig {
            cold_calls: 1,
            hot_calls: 2,
        }
    }

    pub fn precise() -> Self {
        TuneConfig {
            cold_calls: 5,
            hot_calls: 50,
        }
    }
}

/// Timed samples of one candidate, in microseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct Timing {
    pub min_us: f64,
    pub median_us: f64,
    pub samples: usize,
}

impl Timing {
    pub(crate) fn from_samples(mut samples_us: Vec<f64>) -> Self {
        let n = samples_us.len();
        if n == 0 {
            return Timing {
                min_us: 0.0,
                median_us: 0.0,
                samples: 0,
            };
        }
        samples_us.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let median = if n % 2 == 0 {
            (samples_us[n / 2 - 1] + samples_us[n / 2]) / 2.0
        } else {
            samples_us[n / 2]
        };
        Timing {
            min_us: samples_us[0],
            median_us: median,
            samples: n,
        }
    }
}

impl fmt::Display for Timing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "min={:.1}us median={:.1}us n={}", self.min_us, self.median_us, self.samples)
    }
}

/// Run `call` `cold_calls` times, then time `hot_calls` synchronized calls.
///
/// The first error from `call` or from synchronization aborts the
/// measurement.
pub fn time_calls<F>(handle: &Handle, config: &TuneConfig, mut call: F) -> BlasResult<Timing>
where
    F: FnMut() -> BlasResult<()>,
{
    for _ in 0..config.cold_calls {
        call()?;
    }
    handle.synchronize()?;

    let mut samples = Vec::with_capacity(config.hot_calls);
    for _ in 0..config.hot_calls {
        handle.synchronize()?;
        let t0 = Instant::now();
        call()?;
        handle.synchronize()?;
        samples.push(t0.elapsed().as_secs_f64() * 1e6);
    }
    Ok(Timing::from_samples(samples))
}
