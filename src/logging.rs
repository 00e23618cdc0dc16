//! Process-wide error/diagnostic sink.
//!
//! A lazily-created, mutex-guarded ring buffer plus a reader/writer-guarded
//! callback list. Reads (draining the ring buffer for inspection) may
//! happen concurrently with other reads; appends and callback-list
//! mutation are serialized.
use crate::error::{ErrorKind, Severity};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const LOG_CAPACITY: usize = 1_000;

/// One entry in the bounded error log.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub op_id: u64,
    pub severity: Severity,
    pub kind: ErrorKind,
    pub component: &'static str,
    pub location: &'static str,
    pub suggestion: String,
}

pub type LogCallback = Arc<dyn Fn(&LogRecord) + Send + Sync>;

struct Sink {
    records: Vec<LogRecord>,
    callbacks: Vec<LogCallback>,
    min_severity: Severity,
}

static SINK: Lazy<RwLock<Sink>> = Lazy::new(|| {
    RwLock::new(Sink {
        records: Vec::with_capacity(LOG_CAPACITY),
        callbacks: Vec::new(),
        min_severity: Severity::Info,
    })
});

static OP_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Allocate the next monotonic operation id, formatted as stable hex by callers.
pub fn next_op_id() -> u64 {
    OP_COUNTER.fetch_add(1, Ordering::Relaxed)
}

pub fn op_id_hex(op_id: u64) -> String {
    format!("{op_id:#010x}")
}

/// Set the minimum severity a record must meet to be retained/dispatched.
pub fn set_min_severity(severity: Severity) {
    SINK.write().min_severity = severity;
}

/// Register a callback invoked for every retained record. Invoked outside
/// any lock held by the sink; callbacks must not call back into mutating
/// logging APIs (register/clear) or they will deadlock.
pub fn register_callback(callback: LogCallback) {
    SINK.write().callbacks.push(callback);
}

/// Record a diagnostic. Severity below the configured minimum is dropped
/// without being retained or dispatched.
pub fn record(
    severity: Severity,
    kind: ErrorKind,
    component: &'static str,
    location: &'static str,
    suggestion: impl Into<String>,
) -> LogRecord {
    let rec = LogRecord {
        op_id: next_op_id(),
        severity,
        kind,
        component,
        location,
        suggestion: suggestion.into(),
    };

    let callbacks = {
        let mut sink = SINK.write();
        if severity < sink.min_severity {
            return rec;
        }
        if sink.records.len() >= LOG_CAPACITY {
            sink.records.remove(0);
        }
        sink.records.push(rec.clone());
        sink.callbacks.clone()
    };

    for cb in &callbacks {
        cb(&rec);
    }

    match severity {
        Severity::Trace => tracing::trace!(op_id = rec.op_id, component, "{}", kind.description()),
        Severity::Debug => tracing::debug!(op_id = rec.op_id, component, "{}", kind.description()),
        Severity::Info => tracing::info!(op_id = rec.op_id, component, "{}", kind.description()),
        Severity::Warn => tracing::warn!(op_id = rec.op_id, component, "{}", kind.description()),
        Severity::Error | Severity::Critical => {
            tracing::error!(op_id = rec.op_id, component, "{}", kind.description())
        }
    }

    rec
}

/// Snapshot of currently retained records, oldest first.
pub fn snapshot() -> Vec<LogRecord> {
    SINK.read().records.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn ring_buffer_trims_oldest() {
        set_min_severity(Severity::Trace);
        for i in 0..(LOG_CAPACITY + 10) {
            record(
                Severity::Info,
                ErrorKind::Success,
                "test",
                "error.rs:0",
                format!("entry {i}"),
            );
        }
        let snap = snapshot();
        assert!(snap.len() <= LOG_CAPACITY);
    }

    #[test]
    fn severity_gate_drops_below_minimum() {
        set_min_severity(Severity::Error);
        let before = snapshot().len();
        record(Severity::Trace, ErrorKind::Success, "test", "x:0", "noop");
        let after = snapshot().len();
        assert_eq!(before, after);
        set_min_severity(Severity::Info);
    }

    #[test]
    fn callbacks_receive_records() {
        set_min_severity(Severity::Trace);
        let hits = Arc::new(AtomicUsize::new(0));
        let hits2 = hits.clone();
        register_callback(Arc::new(move |_rec| {
            hits2.fetch_add(1, Ordering::SeqCst);
        }));
        record(Severity::Info, ErrorKind::Success, "test", "x:0", "hello");
        assert!(hits.load(Ordering::SeqCst) >= 1);
    }
}
