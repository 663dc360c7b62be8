//! Read models for the query side.
//!
//! - [`ReadModel`] trait for query access to denormalized data
//! - [`UserView`], a user listing kept up to date by subscribing to user
//!   events on the event bus and rebuilt from the event log at startup

pub mod error;
pub mod read_model;
pub mod views;

pub use error::{ProjectionError, Result};
pub use read_model::ReadModel;
pub use views::{UserPage, UserRow, UserView, register_user_projections};
