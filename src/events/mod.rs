//! Append-only audit trails: person lifecycle events and household field history.
//! Rows are only ever inserted; nothing here updates or deletes.

pub mod repo;
pub mod repo_types;

pub use repo_types::{HouseholdHistory, NewPersonEvent, PersonEvent, PersonEventType};
