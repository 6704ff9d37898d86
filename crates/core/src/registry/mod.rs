//! Work item registry.
//!
//! Turns the tabular input descriptor into an ordered list of uniquely keyed
//! [`WorkItem`]s. Parsing is pure: no I/O, input order preserved, and any
//! malformed or duplicate row rejects the whole descriptor before work starts.

mod error;
mod parser;
mod types;

pub use error::ValidationError;
pub use parser::{normalize_location, parse, parse_descriptor, validate_items};
pub use types::{RawRow, WorkItem};
