// Instance state machine (§4.E-G): pure state fold, command surface, and
// the actor that drives them against a net and a journal.

mod actor;
mod command;
mod state;

pub use actor::Instance;
pub use command::{Command, Response};
pub use state::{FailureRecord, InstanceState};
