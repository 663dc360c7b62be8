//! Shared types for the command/event dispatch core.
//!
//! - [`AggregateId`] and [`CorrelationId`] identifiers
//! - [`Context`], the cancellation and deadline carrier passed through every
//!   dispatch, load and append call

pub mod context;
pub mod types;

pub use context::{Context, ContextError};
pub use types::{AggregateId, CorrelationId};
