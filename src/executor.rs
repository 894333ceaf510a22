// Transition executor - invokes user functions, isolates failures

//! # Transition Executor
//!
//! Given a transition and a token selection already chosen by the token
//! game, assemble the transition's structured input, invoke its user
//! function, and route the output back into a produce marking (§4.D). If
//! the user function returns `Err`, or panics, the executor captures it and
//! returns [`FiringResult::Failed`] — no partial marking mutation ever
//! escapes to the caller, matching the spec's "no partial marking mutation
//! ever escapes" guarantee.
//!
//! Per §9's design note ("uniform contract: the executor returns a handle
//! that resolves to a completion message"), [`fire`] is a plain `async fn`
//! that the scheduler spawns onto the shared worker pool via `tokio::spawn`
//! — the `JoinHandle` it returns *is* that handle, and its resolution is
//! what gets delivered back to the instance mailbox as an internal message.

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use uuid::Uuid;

use crate::marking::{ColoredMarking, MarkingLike};
use crate::net::{ExecutorInput, Net, TransitionId};
use crate::token::Token;

#[derive(Debug, Clone)]
pub struct FiringOutcome {
    pub transition_id: TransitionId,
    pub job_id: Uuid,
    pub consume: ColoredMarking,
    pub produce: ColoredMarking,
    pub event: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct FiringFailure {
    pub transition_id: TransitionId,
    pub job_id: Uuid,
    pub consume: ColoredMarking,
    pub error_message: String,
}

#[derive(Debug, Clone)]
pub enum FiringResult {
    Fired(FiringOutcome),
    Failed(FiringFailure),
}

/// Run one firing of `transition_id` against the already-selected
/// `consume` marking. Does not touch instance state; purely a pipeline
/// from (net, transition, consume marking, payload) to an outcome.
pub async fn fire(
    net: &Net,
    transition_id: TransitionId,
    consume: ColoredMarking,
    payload: Option<serde_json::Value>,
) -> FiringResult {
    let job_id = Uuid::new_v4();

    let transition = match net.transition(transition_id) {
        Some(t) => t,
        None => {
            return FiringResult::Failed(FiringFailure {
                transition_id,
                job_id,
                consume,
                error_message: format!("transition {transition_id} not found in net"),
            })
        }
    };

    let mut fields: std::collections::HashMap<String, Vec<Token>> = std::collections::HashMap::new();
    for adj in net.in_adjacent_places(transition_id) {
        fields
            .entry(adj.selector.clone())
            .or_default()
            .extend(consume.tokens_at(adj.place).iter().cloned());
    }

    let input = ExecutorInput { fields, payload };

    // A transition's user function is untrusted code from the engine's
    // point of view; a panic in it must become a Failed outcome, never
    // take down the firing's spawned task (and with it, silently wedge
    // `in_flight` with no TransitionFailed ever journaled).
    let outcome = match AssertUnwindSafe((transition.function)(input)).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(panic) => {
            return FiringResult::Failed(FiringFailure {
                transition_id,
                job_id,
                consume,
                error_message: panic_message(&panic),
            })
        }
    };

    match outcome {
        Ok(output) => {
            let mut produce_map: std::collections::HashMap<_, Vec<Token>> = std::collections::HashMap::new();
            for adj in net.out_adjacent_places(transition_id) {
                if let Some(tokens) = output.fields.get(&adj.selector) {
                    produce_map
                        .entry(adj.place)
                        .or_default()
                        .extend(tokens.iter().cloned());
                }
            }
            FiringResult::Fired(FiringOutcome {
                transition_id,
                job_id,
                consume,
                produce: ColoredMarking::from_map(produce_map),
                event: output.event,
            })
        }
        Err(message) => FiringResult::Failed(FiringFailure {
            transition_id,
            job_id,
            consume,
            error_message: message,
        }),
    }
}

/// Best-effort extraction of a human-readable message from a caught panic
/// payload; `panic!("...")` and `.unwrap()`/`.expect("...")` both downcast
/// cleanly, anything else gets a generic message.
fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "transition function panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{always_fatal, Arc as NetArc, ExecutorOutput, Place, PlaceId, Transition};
    use serde_json::json;
    use std::sync::Arc as StdArc;

    #[tokio::test]
    async fn successful_firing_routes_output_by_selector() {
        let doubling = Transition::new(
            1,
            "double",
            false,
            always_fatal(),
            StdArc::new(|input| {
                Box::pin(async move {
                    let n = input.fields["in"][0].value().as_i64().unwrap_or(0);
                    let mut fields = std::collections::HashMap::new();
                    fields.insert("out".to_string(), vec![Token::new(json!(n * 2))]);
                    Ok(ExecutorOutput {
                        fields,
                        event: json!({"doubled": n}),
                    })
                })
            }),
        );
        let net = Net::new(
            vec![Place::new(1, "p1", "u"), Place::new(2, "p2", "u")],
            vec![doubling],
            vec![
                NetArc::input(PlaceId(1), TransitionId(1), 1, "in"),
                NetArc::output(TransitionId(1), PlaceId(2), 1, "out"),
            ],
        )
        .unwrap();

        let consume = ColoredMarking::single(PlaceId(1), vec![Token::new(json!(21))]);
        match fire(&net, TransitionId(1), consume, None).await {
            FiringResult::Fired(outcome) => {
                assert_eq!(outcome.produce.tokens_at(PlaceId(2)), &[Token::new(json!(42))]);
                assert_eq!(outcome.event, json!({"doubled": 21}));
            }
            FiringResult::Failed(_) => panic!("expected success"),
        }
    }

    #[tokio::test]
    async fn failing_user_function_is_captured() {
        let always_fails = Transition::new(
            1,
            "boom",
            false,
            always_fatal(),
            StdArc::new(|_input| Box::pin(async { Err("kaboom".to_string()) })),
        );
        let net = Net::new(vec![], vec![always_fails], vec![]).unwrap();
        match fire(&net, TransitionId(1), ColoredMarking::empty(), None).await {
            FiringResult::Failed(failure) => assert_eq!(failure.error_message, "kaboom"),
            FiringResult::Fired(_) => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn panicking_user_function_is_captured_as_failure() {
        let panics = Transition::new(
            1,
            "panics",
            false,
            always_fatal(),
            StdArc::new(|input| {
                Box::pin(async move {
                    let _ = input.fields["missing"][0].value();
                    unreachable!()
                })
            }),
        );
        let net = Net::new(vec![], vec![panics], vec![]).unwrap();
        match fire(&net, TransitionId(1), ColoredMarking::empty(), None).await {
            FiringResult::Failed(failure) => assert!(!failure.error_message.is_empty()),
            FiringResult::Fired(_) => panic!("expected failure"),
        }
    }
}
