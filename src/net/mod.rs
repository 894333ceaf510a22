// Net topology - immutable bipartite graph of places, transitions, and arcs

//! Places connected to transitions connected to places, by weighted,
//! selector-carrying arcs. Everything in this module is an immutable
//! value type: a [`Net`](topology::Net) is built once and shared freely.

pub mod arc;
pub mod place;
pub mod topology;
pub mod transition;

pub use arc::{Arc, Weight};
pub use place::{Place, PlaceId};
pub use topology::Net;
pub use transition::{
    always_fatal, exponential_backoff, ExceptionStrategy, ExecutorInput, ExecutorOutput,
    StrategyDecision, Transition, TransitionFn, TransitionId,
};
