//! SoulPilot page seam.
//!
//! Higher layers talk to a browser tab exclusively through the [`Page`] trait.
//! [`chromium`] drives a real Chromium over CDP; `mock` (feature `mock`)
//! provides a scripted page for tests.

pub mod chromium;
pub mod commands;
pub mod config;
pub mod error;
#[cfg(feature = "mock")]
pub mod mock;
pub mod page;
pub mod scripts;

pub use chromium::{ChromiumBrowser, ChromiumPage};
pub use commands::{
    BoxModel, ClickMode, ElementRef, ElementSnapshot, ParentSnapshot, QueryExpression,
    SelectState, SiblingSnapshot, WaitState,
};
pub use config::{detect_chrome_executable, CdpConfig};
pub use error::{AdapterError, AdapterErrorKind};
pub use page::{Page, PageFactory, PageHandle};
