//! Error reporting sinks
//!
//! Batch operations (bulk entity fetches, remote registry listings) skip a
//! record that fails and report the failure here instead of aborting. The
//! sink is an explicit collaborator handed to every component that needs
//! it.

use crate::error::Error;
use crate::types::EntityId;
use parking_lot::Mutex;
use std::fmt;

/// One reported failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    /// Component that hit the failure (e.g. "repository", "registry")
    pub component: &'static str,
    /// Offending entity, when known
    pub entity_id: Option<EntityId>,
    /// [`Error::kind`] of the failure
    pub kind: &'static str,
    pub message: String,
}

impl ErrorReport {
    pub fn new(component: &'static str, entity_id: Option<&EntityId>, error: &Error) -> Self {
        Self {
            component,
            entity_id: entity_id.cloned(),
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.entity_id {
            Some(id) => write!(f, "[{}] {}: {}", self.component, id, self.message),
            None => write!(f, "[{}] {}", self.component, self.message),
        }
    }
}

/// Receiver of isolated per-record failures
pub trait ErrorSink: Send + Sync {
    fn report(&self, report: ErrorReport);
}

/// Sink that logs every report at error level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report(&self, report: ErrorReport) {
        tracing::error!(
            component = report.component,
            entity_id = report.entity_id.as_ref().map(EntityId::as_str),
            kind = report.kind,
            "{}",
            report.message
        );
    }
}

/// Sink that keeps reports in memory
#[derive(Debug, Default)]
pub struct CollectingErrorSink {
    reports: Mutex<Vec<ErrorReport>>,
}

impl CollectingErrorSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the collected reports
    pub fn reports(&self) -> Vec<ErrorReport> {
        self.reports.lock().clone()
    }

    /// Drain the collected reports
    pub fn take(&self) -> Vec<ErrorReport> {
        std::mem::take(&mut *self.reports.lock())
    }

    pub fn len(&self) -> usize {
        self.reports.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.lock().is_empty()
    }
}

impl ErrorSink for CollectingErrorSink {
    fn report(&self, report: ErrorReport) {
        tracing::debug!("collected error report: {}", report);
        self.reports.lock().push(report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_sink() {
        let sink = CollectingErrorSink::new();
        let id = EntityId::new_unchecked("https://sp");
        sink.report(ErrorReport::new(
            "registry",
            Some(&id),
            &Error::RemoteAdapter("bad payload".into()),
        ));
        sink.report(ErrorReport::new("repository", None, &Error::storage("disk full")));

        assert_eq!(sink.len(), 2);
        let reports = sink.take();
        assert_eq!(
            reports[0].to_string(),
            "[registry] https://sp: remote registry error: bad payload"
        );
        assert_eq!(reports[0].kind, "remote_adapter");
        assert_eq!(reports[1].to_string(), "[repository] storage error: disk full");
        assert_eq!(reports[1].kind, "storage");
        assert!(sink.is_empty());
    }
}
