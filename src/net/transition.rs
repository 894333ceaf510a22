// Transitions - the active component of a Petri net

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::token::Token;

/// Stable integer identity of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransitionId(pub u64);

impl From<u64> for TransitionId {
    fn from(id: u64) -> Self {
        TransitionId(id)
    }
}

impl fmt::Display for TransitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Structured input handed to a transition's user function: one token
/// list per arc field selector, plus the optional command payload that
/// accompanied a manual `FireTransition`.
#[derive(Debug, Clone, Default)]
pub struct ExecutorInput {
    pub fields: std::collections::HashMap<String, Vec<Token>>,
    pub payload: Option<serde_json::Value>,
}

/// Structured output of a successful firing: one token list per output
/// arc field selector, plus the domain event the spec requires every
/// firing to produce (§4.D: "its return is a structured output + a domain
/// event").
#[derive(Debug, Clone, Default)]
pub struct ExecutorOutput {
    pub fields: std::collections::HashMap<String, Vec<Token>>,
    pub event: serde_json::Value,
}

/// The user-supplied effectful function invoked when a transition fires.
/// Boxed as a trait object because nets are assembled at runtime (no DSL
/// in this crate, per the spec's Non-goals) and different transitions in
/// the same net will close over different state.
pub type TransitionFn =
    Arc<dyn Fn(ExecutorInput) -> BoxFuture<std::result::Result<ExecutorOutput, String>> + Send + Sync>;

/// What a transition's exception strategy decides to do after a failed
/// firing attempt (§3, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyDecision {
    /// Disable the transition until externally cleared. No clearing
    /// mechanism is specified (§9 Open Question) — the engine treats this
    /// as permanent for the lifetime of the instance.
    BlockTransition,
    /// Re-attempt the same firing after `millis` milliseconds.
    RetryWithDelay(u64),
    /// Permanently disable the transition for this instance.
    Fatal,
}

/// `(error_message, attempt_number) -> decision`. Attempt numbers start at 1.
pub type ExceptionStrategy = Arc<dyn Fn(&str, u32) -> StrategyDecision + Send + Sync>;

/// An action that moves tokens from input places to output places,
/// optionally transforming them through a user function.
#[derive(Clone)]
pub struct Transition {
    pub id: TransitionId,
    pub label: String,
    /// `true` if the scheduler fires this transition whenever it becomes
    /// enabled, without an external `FireTransition` request.
    pub automated: bool,
    pub strategy: ExceptionStrategy,
    pub function: TransitionFn,
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("automated", &self.automated)
            .finish()
    }
}

impl PartialEq for Transition {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Transition {}

impl Transition {
    pub fn new<L: Into<String>>(
        id: u64,
        label: L,
        automated: bool,
        strategy: ExceptionStrategy,
        function: TransitionFn,
    ) -> Self {
        Transition {
            id: TransitionId(id),
            label: label.into(),
            automated,
            strategy,
            function,
        }
    }
}

/// A strategy that always returns `Fatal`, useful for transitions that
/// should never be retried (scenario S1 in the spec's test suite).
pub fn always_fatal() -> ExceptionStrategy {
    Arc::new(|_err, _attempt| StrategyDecision::Fatal)
}

/// A strategy retrying with exponential backoff `base * 2^(attempt-1)` up
/// to `max_attempts`, then `Fatal` — the shape used by scenario S3 and
/// grounded on the reference crate's `BackoffStrategy::Exponential`.
pub fn exponential_backoff(base_millis: u64, max_attempts: u32) -> ExceptionStrategy {
    Arc::new(move |_err, attempt| {
        if attempt < max_attempts {
            StrategyDecision::RetryWithDelay(base_millis * 2u64.pow(attempt))
        } else {
            StrategyDecision::Fatal
        }
    })
}
