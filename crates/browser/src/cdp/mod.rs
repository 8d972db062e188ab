//! Chrome DevTools Protocol engine.
//!
//! - [`finder`]: locate a Chrome/Chromium executable
//! - [`launcher`]: spawn it with remote debugging and poll the endpoint
//! - [`connection`]: request/response JSON-RPC over a target WebSocket
//! - [`page`]: the [`Page`](crate::Page) implementation
//! - [`selector`]: Playwright-style selector lists evaluated in-page

mod connection;
mod finder;
mod launcher;
#[cfg(test)]
mod mock_target;
mod page;
pub mod selector;

pub use launcher::{CdpBrowser, CdpEngine};
pub use page::CdpPage;
