// Instance state - the pure fold (state, event) -> state (§4.E, §9)

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::Event;
use crate::marking::{ColoredMarking, MarkingLike};
use crate::net::{StrategyDecision, TransitionId};

/// Per-transition failure record, present only while a transition is in a
/// non-terminal failure state (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    pub attempt_count: u32,
    pub error_message: String,
    pub strategy_decision: StrategyDecision,
}

impl FailureRecord {
    /// `true` if the transition must not fire again without external
    /// intervention — `Blocked` or `Fatal` (§4.E invariant 3 / §8 invariant 3).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.strategy_decision,
            StrategyDecision::BlockTransition | StrategyDecision::Fatal
        )
    }
}

/// `(sequence_no, marking, consumed_jobs, failures)` — the complete state
/// of a running instance (§3). Immutable value; every applied event
/// produces a new one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstanceState {
    pub sequence_no: u64,
    pub marking: ColoredMarking,
    pub consumed_jobs: HashSet<Uuid>,
    pub failures: HashMap<TransitionId, FailureRecord>,
    /// `None` before the first `Initialized` event; `Some` thereafter.
    /// Tracks the *Uninitialized* -> *Running* lifecycle transition (§3)
    /// without a separate enum, since every other field is already
    /// meaningless pre-initialization.
    pub initialized: bool,
}

impl InstanceState {
    pub fn uninitialized() -> Self {
        InstanceState::default()
    }

    /// Apply one journaled event, exactly per §4.E's "Effects of applying
    /// each event to state". This is a pure function: the same
    /// `(state, event)` pair always yields the same result, which is what
    /// makes replay determinism (§8) possible.
    pub fn apply(&self, event: &Event) -> InstanceState {
        match event {
            Event::Initialized { marking, .. } => InstanceState {
                sequence_no: 0,
                marking: marking.clone(),
                consumed_jobs: HashSet::new(),
                failures: HashMap::new(),
                initialized: true,
            },
            Event::TransitionFired {
                transition_id,
                job_id,
                consume,
                produce,
                new_sequence_no,
                ..
            } => {
                let mut failures = self.failures.clone();
                failures.remove(transition_id);
                let mut consumed_jobs = self.consumed_jobs.clone();
                consumed_jobs.insert(*job_id);
                InstanceState {
                    sequence_no: *new_sequence_no,
                    marking: self.marking.consume(consume).produce(produce),
                    consumed_jobs,
                    failures,
                    initialized: self.initialized,
                }
            }
            Event::TransitionFailed {
                transition_id,
                error_message,
                strategy_decision,
                attempt,
                ..
            } => {
                let mut failures = self.failures.clone();
                failures.insert(
                    *transition_id,
                    FailureRecord {
                        attempt_count: *attempt,
                        error_message: error_message.clone(),
                        strategy_decision: *strategy_decision,
                    },
                );
                InstanceState {
                    sequence_no: self.sequence_no + 1,
                    marking: self.marking.clone(),
                    consumed_jobs: self.consumed_jobs.clone(),
                    failures,
                    initialized: self.initialized,
                }
            }
        }
    }

    /// Fold an entire event history from genesis. Used both for normal
    /// event-by-event application and for journal replay on recovery —
    /// the same function serves both, which is what makes "replay twice
    /// yields the same state" (§8) trivially true.
    pub fn replay<'a>(events: impl IntoIterator<Item = &'a Event>) -> InstanceState {
        events
            .into_iter()
            .fold(InstanceState::uninitialized(), |state, event| state.apply(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::PlaceId;
    use crate::token::Token;
    use serde_json::json;

    #[test]
    fn initialized_resets_consumed_jobs_and_failures() {
        let state = InstanceState::uninitialized();
        let init = Event::Initialized {
            marking: ColoredMarking::single(PlaceId(1), vec![Token::new(json!(1))]),
            initial_state: json!({}),
        };
        let next = state.apply(&init);
        assert!(next.initialized);
        assert_eq!(next.sequence_no, 0);
        assert!(next.consumed_jobs.is_empty());
        assert!(next.failures.is_empty());
    }

    #[test]
    fn fired_clears_failure_record_and_advances_sequence() {
        let mut state = InstanceState::uninitialized();
        state.failures.insert(
            TransitionId(1),
            FailureRecord {
                attempt_count: 1,
                error_message: "boom".into(),
                strategy_decision: StrategyDecision::RetryWithDelay(10),
            },
        );
        let fired = Event::TransitionFired {
            transition_id: TransitionId(1),
            job_id: Uuid::new_v4(),
            consume: ColoredMarking::empty(),
            produce: ColoredMarking::empty(),
            event_payload: json!({}),
            new_sequence_no: 1,
        };
        let next = state.apply(&fired);
        assert!(!next.failures.contains_key(&TransitionId(1)));
        assert_eq!(next.sequence_no, 1);
    }

    #[test]
    fn replay_is_deterministic() {
        let events = vec![
            Event::Initialized {
                marking: ColoredMarking::empty(),
                initial_state: json!({}),
            },
            Event::TransitionFailed {
                transition_id: TransitionId(1),
                job_id: Uuid::new_v4(),
                consume: ColoredMarking::empty(),
                error_message: "x".into(),
                strategy_decision: StrategyDecision::Fatal,
                attempt: 1,
            },
        ];
        let once = InstanceState::replay(events.iter());
        let twice = InstanceState::replay(events.iter());
        assert_eq!(once.sequence_no, twice.sequence_no);
        assert_eq!(once.failures.len(), twice.failures.len());
    }
}
