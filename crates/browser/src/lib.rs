//! Browser automation surface used by the purchase worker.
//!
//! [`engine`] defines the capability set the flow is written against;
//! [`cdp`] implements it by driving a local Chrome/Chromium over the
//! DevTools protocol.

pub mod cdp;
pub mod engine;
pub mod error;

pub use cdp::CdpEngine;
pub use engine::{
    Browser, BrowserEngine, LaunchOptions, Page, SelectorState, Viewport, WaitUntil,
};
pub use error::{BrowserError, Result};
