//! HTTP surface, purchase worker runtime and process bootstrap for the
//! `cartrunner` binary.

pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod runtime;
pub mod state;
