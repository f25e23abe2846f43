//! Playback observation helpers

use recplay::sink::{MemorySink, NodeHandle};
use std::time::{Duration, Instant};

/// Block until `sink` has seen `count` writes or `timeout` passes
pub fn wait_for_writes(sink: &MemorySink, count: usize, timeout: Duration) -> bool {
    let until = Instant::now() + timeout;
    while Instant::now() < until {
        if sink.write_count() >= count {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    sink.write_count() >= count
}

/// Numeric values published to `handle`, in order
pub fn published_numbers(sink: &MemorySink, handle: NodeHandle) -> Vec<f64> {
    sink.writes_for(handle)
        .iter()
        .filter_map(|w| w.value.as_f64())
        .collect()
}
