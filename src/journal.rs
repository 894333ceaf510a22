// Persistence driver - the abstract journal contract and an in-memory backend

//! # Persistence Driver
//!
//! The journal itself (append-only log + snapshot store) is explicitly out
//! of scope (spec §1) — only its abstract contract is used here, mirroring
//! the shape of the reference crate's [`WorkflowStorage`] trait
//! (`engine/storage.rs`): an `async_trait`, `Send + Sync`, `Result`-returning
//! API. [`InMemoryJournal`] is the one concrete backend this crate ships —
//! grounded directly on `InMemoryStorage`'s `RwLock<HashMap<..>>` pattern —
//! useful for tests and single-process deployments, but not a production
//! journal.
//!
//! ## Recovery protocol
//!
//! On startup: replay events in order, apply each to in-memory state
//! exactly as §4.E specifies, then transition to *Running* and invoke the
//! scheduler once. In-flight firings from the previous lifetime are never
//! resumed — they're re-derived from current enablement (§4.G).

use std::collections::HashMap;
use std::sync::RwLock;

use crate::event::JournalEntry;
use crate::Result;

/// Abstract contract for an append-only event journal. `append` must be
/// atomic and ordered; `replay` yields events in the order they were
/// appended. `snapshot`/`load_snapshot` are optional — the default
/// implementations make every backend replay-from-genesis-capable even if
/// it never implements snapshotting.
#[async_trait::async_trait]
pub trait Journal: Send + Sync {
    /// Append `entries` to `instance_id`'s log, atomically and in order.
    async fn append(&self, instance_id: &str, entries: Vec<JournalEntry>) -> Result<()>;

    /// Replay every entry ever appended for `instance_id`, in order.
    async fn replay(&self, instance_id: &str) -> Result<Vec<JournalEntry>>;

    /// Optionally persist a compacted snapshot. Default: no-op, meaning
    /// recovery always replays the full log.
    async fn snapshot(&self, _instance_id: &str, _sequence_no: u64, _blob: serde_json::Value) -> Result<()> {
        Ok(())
    }

    /// Optionally load the most recent snapshot. Default: none available.
    async fn load_snapshot(&self, _instance_id: &str) -> Result<Option<(u64, serde_json::Value)>> {
        Ok(None)
    }
}

/// In-memory journal: a `RwLock<HashMap<instance_id, Vec<JournalEntry>>>`,
/// the same concurrency pattern as `InMemoryStorage`. Data does not survive
/// process restart; this is a test/demo backend, not the durable journal
/// the spec treats as an external collaborator.
#[derive(Default)]
pub struct InMemoryJournal {
    logs: RwLock<HashMap<String, Vec<JournalEntry>>>,
}

impl InMemoryJournal {
    pub fn new() -> Self {
        InMemoryJournal::default()
    }
}

#[async_trait::async_trait]
impl Journal for InMemoryJournal {
    async fn append(&self, instance_id: &str, entries: Vec<JournalEntry>) -> Result<()> {
        let mut logs = self.logs.write().unwrap();
        logs.entry(instance_id.to_string()).or_default().extend(entries);
        Ok(())
    }

    async fn replay(&self, instance_id: &str) -> Result<Vec<JournalEntry>> {
        let logs = self.logs.read().unwrap();
        Ok(logs.get(instance_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use serde_json::json;

    #[tokio::test]
    async fn replay_returns_entries_in_append_order() {
        let journal = InMemoryJournal::new();
        journal
            .append(
                "inst-1",
                vec![JournalEntry {
                    instance_id: "inst-1".into(),
                    sequence_no: 0,
                    event: Event::Initialized {
                        marking: crate::marking::ColoredMarking::empty(),
                        initial_state: json!({}),
                    },
                    recorded_at: chrono::Utc::now(),
                }],
            )
            .await
            .unwrap();

        let replayed = journal.replay("inst-1").await.unwrap();
        assert_eq!(replayed.len(), 1);
        assert_eq!(replayed[0].sequence_no, 0);
    }

    #[tokio::test]
    async fn unknown_instance_replays_empty() {
        let journal = InMemoryJournal::new();
        assert!(journal.replay("never-seen").await.unwrap().is_empty());
    }
}
