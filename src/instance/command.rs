// Command/response surface (§6)

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::marking::ColoredMarking;
use crate::net::{StrategyDecision, TransitionId};

#[derive(Debug, Clone)]
pub enum Command {
    Initialize {
        marking: ColoredMarking,
        initial_state: serde_json::Value,
    },
    FireTransition {
        transition_id: TransitionId,
        payload: Option<serde_json::Value>,
    },
    GetState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Response {
    Initialized {
        marking: ColoredMarking,
        initial_state: serde_json::Value,
    },
    AlreadyInitialized,
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
        error_message: String,
        strategy_decision: StrategyDecision,
        attempt: u32,
    },
    TransitionNotEnabled {
        transition_id: TransitionId,
        reason: String,
    },
    ProcessState {
        sequence_no: u64,
        marking: ColoredMarking,
        consumed_jobs: HashSet<Uuid>,
    },
}
