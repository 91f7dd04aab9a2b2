//! Vigil - in-process consistency layer for the Scriptorium CMS
//!
//! "Watch ye therefore: for ye know not when the master of the house cometh" - Mark 13:35
//!
//! Vigil keeps derived values trustworthy without recomputing them on every
//! request: permission trees, rendered content fragments, and the
//! one-browser-per-user session rule, all in process memory and all safe
//! under concurrent access.
//!
//! ## Components
//!
//! - **Permissions**: (user, scope) -> permission tree, refreshed only on
//!   explicit eviction
//! - **Renders**: (project, channel variant, item) -> fragment, validated
//!   on every read against a fingerprint of the underlying content
//! - **Sessions**: at most one live browser session per user, sliding TTL,
//!   lazily swept
//!
//! Everything volatile, nothing shared across processes; external data
//! arrives through the [`source`] traits and time through [`clock::Clock`].

pub mod clock;
pub mod config;
pub mod content;
pub mod hash;
pub mod inflight;
pub mod permission;
pub mod render;
pub mod service;
pub mod session;
pub mod source;
pub mod types;

pub use config::VigilConfig;
pub use service::{ProjectTeardown, RequestDecision, RequesterContext, Vigil};
pub use types::{Result, VigilError};
