//! Audit trail for pipeline runs.
//!
//! Components emit [`AuditEvent`]s through a cloneable [`AuditHandle`]; a
//! single [`AuditWriter`] task persists them to an [`AuditStore`].

mod events;
mod handle;
mod sqlite;
mod store;
mod writer;

pub use events::*;
pub use handle::*;
pub use sqlite::*;
pub use store::*;
pub use writer::*;

pub(crate) use handle::emit_opt;
