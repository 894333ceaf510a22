// Journaled events - the sole source of truth for recovery (§4.E)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::marking::ColoredMarking;
use crate::net::{StrategyDecision, TransitionId};

/// Everything that can happen to an instance's state, in the exact shape
/// the spec names in §4.E. Recovery is a pure fold of these over
/// [`crate::instance::InstanceState`] — nothing else may mutate it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    Initialized {
        marking: ColoredMarking,
        initial_state: serde_json::Value,
    },
    TransitionFired {
        transition_id: TransitionId,
        job_id: Uuid,
        consume: ColoredMarking,
        produce: ColoredMarking,
        event_payload: serde_json::Value,
        new_sequence_no: u64,
    },
    TransitionFailed {
        transition_id: TransitionId,
        job_id: Uuid,
        consume: ColoredMarking,
        error_message: String,
        strategy_decision: StrategyDecision,
        attempt: u32,
    },
}

/// One journaled entry: the event, tagged with which instance and which
/// position in that instance's history it belongs to (§6: "each event
/// carries `instance_id`, `sequence_no`, kind-specific payload").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub instance_id: String,
    pub sequence_no: u64,
    pub event: Event,
    /// Wall-clock time the event was appended, for observability only —
    /// nothing in the engine's logic reads this back. Mirrors the
    /// reference crate's `HistoryEvent::timestamp` convention.
    pub recorded_at: DateTime<Utc>,
}
