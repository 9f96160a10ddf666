//! Action primitives
//!
//! One module per action family. Every primitive receives the execution
//! context and resolves its target through the executor.

mod click;
mod form;
mod navigate;
mod read;
mod scroll;
mod select;
mod type_text;
mod wait;

pub use click::*;
pub use form::*;
pub use navigate::*;
pub use read::*;
pub use scroll::*;
pub use select::*;
pub use type_text::*;
pub use wait::*;
