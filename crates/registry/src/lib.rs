//! Session registry
//!
//! Maps session ids to one reusable browser page each. Pages are created on
//! first use, capped by `max_pages`, and replaced when found closed.

pub mod errors;
pub mod metrics;
pub mod model;
pub mod state;

pub use errors::RegistryError;
pub use model::{SessionContext, SessionInfo};
pub use state::{SessionLease, SessionManager, SessionManagerConfig};
