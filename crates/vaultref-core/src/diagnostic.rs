//! Diagnostics for reverse-lookup scans.
//!
//! A reverse lookup walks every vault visible to the caller and skips
//! candidates it cannot use. Skips are not errors, but they are worth
//! surfacing: each one is reported as a [`SkipEvent`] to an injected
//! [`DiagnosticSink`] instead of going straight to process-wide logging.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Skip reason
// ---------------------------------------------------------------------------

/// Why a candidate was dropped from a reverse-lookup scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The list entry carried no identifier.
    MissingId,

    /// The list entry's identifier could not be parsed.
    MalformedId,

    /// The identifier parsed but has no `vaults` segment.
    MissingVaultsSegment,

    /// The follow-up point lookup failed.
    LookupFailed,

    /// The point lookup succeeded but lacked an id or vault URI.
    IncompleteRecord,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::MissingId => "missing_id",
            Self::MalformedId => "malformed_id",
            Self::MissingVaultsSegment => "missing_vaults_segment",
            Self::LookupFailed => "lookup_failed",
            Self::IncompleteRecord => "incomplete_record",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Skip event
// ---------------------------------------------------------------------------

/// A single skipped candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipEvent {
    /// Correlates all skips of one scan.
    pub scan_id: Uuid,

    /// Assigned by the sink; zero until emitted.
    pub sequence_number: u64,

    pub reason: SkipReason,

    /// Raw identifier of the candidate, when the list entry had one.
    pub candidate_id: Option<String>,

    pub resource_group: Option<String>,

    pub name: Option<String>,

    /// Human-readable detail (error text, missing field).
    pub detail: Option<String>,
}

impl SkipEvent {
    pub fn new(scan_id: Uuid, reason: SkipReason) -> Self {
        Self {
            scan_id,
            sequence_number: 0,
            reason,
            candidate_id: None,
            resource_group: None,
            name: None,
            detail: None,
        }
    }

    pub fn with_candidate_id(mut self, id: impl Into<String>) -> Self {
        self.candidate_id = Some(id.into());
        self
    }

    /// Attach the vault coordinates used for the point lookup.
    pub fn with_vault(mut self, resource_group: impl Into<String>, name: impl Into<String>) -> Self {
        self.resource_group = Some(resource_group.into());
        self.name = Some(name.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Sink trait
// ---------------------------------------------------------------------------

/// Receives skip events from reverse-lookup scans.
///
/// Implementations must not block: the scan calls this inline between
/// remote requests.
pub trait DiagnosticSink: Send + Sync + fmt::Debug {
    fn skipped(&self, event: SkipEvent);
}

// ---------------------------------------------------------------------------
// Tracing sink
// ---------------------------------------------------------------------------

/// Forwards skip events to `tracing` at debug level.
#[derive(Debug)]
pub struct TracingDiagnostics {
    next_sequence: AtomicU64,
}

impl TracingDiagnostics {
    pub fn new() -> Self {
        Self {
            next_sequence: AtomicU64::new(0),
        }
    }
}

impl Default for TracingDiagnostics {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticSink for TracingDiagnostics {
    fn skipped(&self, mut event: SkipEvent) {
        event.sequence_number = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            scan_id = %event.scan_id,
            sequence_number = event.sequence_number,
            reason = %event.reason,
            candidate_id = ?event.candidate_id,
            resource_group = ?event.resource_group,
            name = ?event.name,
            detail = ?event.detail,
            "reverse lookup skipped candidate"
        );
    }
}

// ---------------------------------------------------------------------------
// In-memory sink (for testing)
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct InMemoryState {
    events: Vec<SkipEvent>,
    next_sequence: u64,
}

/// Records skip events in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDiagnostics {
    state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, InMemoryState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Snapshot of all recorded events.
    pub fn events(&self) -> Vec<SkipEvent> {
        self.lock().events.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reasons of all recorded events, in emission order.
    pub fn reasons(&self) -> Vec<SkipReason> {
        self.lock().events.iter().map(|e| e.reason).collect()
    }
}

impl DiagnosticSink for InMemoryDiagnostics {
    fn skipped(&self, mut event: SkipEvent) {
        let mut state = self.lock();
        event.sequence_number = state.next_sequence;
        state.next_sequence += 1;
        state.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_reason_display() {
        assert_eq!(SkipReason::MissingId.to_string(), "missing_id");
        assert_eq!(SkipReason::LookupFailed.to_string(), "lookup_failed");
        assert_eq!(SkipReason::IncompleteRecord.to_string(), "incomplete_record");
    }

    #[test]
    fn skip_reason_serializes_snake_case() {
        let json = serde_json::to_string(&SkipReason::MissingVaultsSegment).unwrap();
        assert_eq!(json, "\"missing_vaults_segment\"");
    }

    #[test]
    fn event_builder_sets_fields() {
        let scan_id = Uuid::new_v4();
        let event = SkipEvent::new(scan_id, SkipReason::LookupFailed)
            .with_candidate_id("/subscriptions/s1/resourceGroups/rg/providers/Microsoft.KeyVault/vaults/kv")
            .with_vault("rg", "kv")
            .with_detail("server error");
        assert_eq!(event.scan_id, scan_id);
        assert_eq!(event.resource_group.as_deref(), Some("rg"));
        assert_eq!(event.name.as_deref(), Some("kv"));
        assert_eq!(event.detail.as_deref(), Some("server error"));
        assert_eq!(event.sequence_number, 0);
    }

    #[test]
    fn in_memory_assigns_monotonic_sequence() {
        let sink = InMemoryDiagnostics::new();
        let scan_id = Uuid::new_v4();
        for _ in 0..5 {
            sink.skipped(SkipEvent::new(scan_id, SkipReason::MissingId));
        }
        let events = sink.events();
        assert_eq!(events.len(), 5);
        for (i, event) in events.iter().enumerate() {
            assert_eq!(event.sequence_number, i as u64);
        }
    }

    #[test]
    fn in_memory_clones_share_buffer() {
        let sink = InMemoryDiagnostics::new();
        let handle = sink.clone();
        assert!(handle.is_empty());
        sink.skipped(SkipEvent::new(Uuid::new_v4(), SkipReason::MalformedId));
        assert_eq!(handle.reasons(), vec![SkipReason::MalformedId]);
    }

    #[test]
    fn tracing_sink_does_not_panic() {
        let sink = TracingDiagnostics::new();
        sink.skipped(SkipEvent::new(Uuid::new_v4(), SkipReason::IncompleteRecord).with_vault("rg", "kv"));
        sink.skipped(SkipEvent::new(Uuid::new_v4(), SkipReason::MissingId));
    }
}
