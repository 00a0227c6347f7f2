//! Bench lines for query round trips, with a thread-local capture sink.
//!
//! Every terminal builder call that reaches the executor produces one
//! [`BenchLine`], written as a JSON object to the `nexusquery::dev6` target.
//! Tests enable the sink on their own thread and read the captured lines
//! back without touching the global logger.

use serde::Serialize;
use std::cell::RefCell;

use crate::utils::logger::DEV6_TARGET;

thread_local! {
    static TL_SINK: RefCell<Option<Vec<String>>> = const { RefCell::new(None) };
}

/// One executor round trip.
#[derive(Debug, Clone, Serialize)]
pub struct BenchLine<'a> {
    pub bench: &'static str,
    pub op: &'a str,
    pub collection: &'a str,
    pub duration_ms: u64,
    pub result_count: u64,
}

impl<'a> BenchLine<'a> {
    #[must_use]
    pub const fn query(op: &'a str, collection: &'a str, duration_ms: u64, result_count: u64) -> Self {
        Self { bench: "query", op, collection, duration_ms, result_count }
    }
}

/// Disables the thread-local sink on drop.
pub struct DevSinkGuard;
impl Drop for DevSinkGuard {
    fn drop(&mut self) {
        TL_SINK.with(|s| *s.borrow_mut() = None);
    }
}

/// Start capturing bench lines on the current thread.
pub fn enable_thread_sink() -> DevSinkGuard {
    TL_SINK.with(|s| *s.borrow_mut() = Some(Vec::new()));
    DevSinkGuard
}

/// Serialize `line`, capture it if the sink is enabled, and log it at trace.
pub fn record(line: &BenchLine<'_>) {
    let text = match serde_json::to_string(line) {
        Ok(text) => text,
        Err(e) => {
            log::debug!("bench line for {} dropped: {e}", line.op);
            return;
        }
    };
    TL_SINK.with(|s| {
        if let Some(buf) = s.borrow_mut().as_mut() {
            buf.push(text.clone());
        }
    });
    log::trace!(target: DEV6_TARGET, "{text}");
}

/// Take the lines captured on this thread. Empty when the sink is disabled.
pub fn drain() -> Vec<String> {
    TL_SINK.with(|s| s.borrow_mut().as_mut().map(std::mem::take).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_captures_json_lines() {
        let _g = enable_thread_sink();
        record(&BenchLine::query("find", "users", 3, 2));
        record(&BenchLine::query("count", "users", 0, 7));
        let lines = drain();
        assert_eq!(
            lines,
            [
                r#"{"bench":"query","op":"find","collection":"users","duration_ms":3,"result_count":2}"#,
                r#"{"bench":"query","op":"count","collection":"users","duration_ms":0,"result_count":7}"#,
            ]
        );
        assert!(drain().is_empty());
    }

    #[test]
    fn isolation_between_threads() {
        let _g = enable_thread_sink();
        record(&BenchLine::query("find", "main", 0, 0));
        let child = std::thread::spawn(|| {
            record(&BenchLine::query("find", "child", 0, 0));
            drain()
        })
        .join()
        .unwrap();
        assert!(child.is_empty());
        assert_eq!(drain().len(), 1);
    }

    #[test]
    fn guard_disables_capture() {
        drop(enable_thread_sink());
        record(&BenchLine::query("find", "users", 0, 0));
        assert!(drain().is_empty());
    }
}
