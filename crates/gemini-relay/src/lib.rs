// Copyright 2026 Gemini Relay Contributors
// SPDX-License-Identifier: Apache-2.0

//! Gemini relay library: scrape a web session, forward one prompt, return
//! the raw upstream body.
//!
//! The binary in `main.rs` only parses flags and starts [`rest::serve`];
//! everything else lives here so the integration tests can drive it.

pub mod acquisition;
pub mod config;
pub mod error;
pub mod payload;
pub mod relay;
pub mod rest;

pub use config::{ServerConfig, UpstreamConfig};
pub use error::{RelayError, RelayResult, SessionFailure};
pub use relay::{Relay, RelayReply};
