//! Non-visual client logic for the registry's web front end: route gate,
//! list query derivation, token session and the HTTP client.

pub mod access;
pub mod api;
pub mod error;
pub mod list_params;
pub mod session;

pub use access::{can_access, GateDecision, GateState};
pub use api::ApiClient;
pub use error::ClientError;
pub use list_params::{ListParams, ListParamsMemo, ListViewState};
pub use session::{FileTokenStore, MemoryTokenStore, Session, TokenStore};
