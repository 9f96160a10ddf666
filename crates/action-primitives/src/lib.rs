//! Action primitives
//!
//! Typed browser actions on top of element resolution:
//! - wire requests parsed once into a typed `Action` (`types`)
//! - an executor bounding every action by its timeout (`executor`)
//! - one primitive per action family (`primitives`)

pub mod errors;
pub mod executor;
mod primitives;
pub mod types;

pub use errors::ActionError;
pub use executor::{ActionExecutor, DefaultActionExecutor};
pub use types::{
    Action, ActionOutput, ActionRequest, ExecCtx, FieldReport, FieldValue, FormData, FormEntry,
    FormField, ParsedAction, ResolutionInfo,
};
