// Crate-wide error type for the Petri net engine

//! # Error Handling
//!
//! One error type for the whole crate, following the same shape as most
//! workflow engines in this ecosystem: a `thiserror` enum with a `Result<T>`
//! alias, so callers write `petri_engine::Result<T>` instead of spelling
//! out `std::result::Result<T, EngineError>` everywhere.
//!
//! Only [`EngineError::Journal`] is fatal to a running instance (§7 of the
//! design doc: a journal failure stops the instance actor). Every other
//! variant is returned to the caller without mutating instance state.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// The journal refused or failed an append. Fatal: the instance actor
    /// exits its mailbox loop after reporting this.
    #[error("journal failure: {0}")]
    Journal(String),

    /// Net topology was asked about a node id it doesn't contain. Not part
    /// of the documented command surface; reachable only through direct
    /// library misuse.
    #[error("unknown node: {0}")]
    UnknownNode(String),

    /// Configuration failed to load or parse.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Catch-all for invariant violations the engine should never produce
    /// intentionally (e.g. a `consume` precondition failing internally).
    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
