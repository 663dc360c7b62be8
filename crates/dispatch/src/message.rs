//! Kind-tagged messages.

use std::fmt::{Debug, Display};
use std::hash::Hash;

/// A value routed by an enumerated kind tag.
///
/// Commands and events both implement this; the tag is the routing key a
/// bus looks handlers up by.
pub trait Message: Send + Sync + 'static {
    /// Enumerates every kind of this message family.
    type Kind: Copy + Eq + Hash + Debug + Display + Send + Sync + 'static;

    fn kind(&self) -> Self::Kind;
}
