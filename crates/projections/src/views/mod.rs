//! Read model views.

mod users;

pub use users::{UserPage, UserRow, UserView, register_user_projections};
