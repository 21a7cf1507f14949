// lungo-embed - High-level embedding API for Lungo
// Copyright (c) 2026 Tom Waddington. MIT licensed.

//! Embed the Lungo scripting runtime in a Rust program.
//!
//! [`Engine`] wraps a [`lungo_core::Runtime`] over the standard host and
//! converts results into plain Rust values. For lower-level control
//! (custom hosts, native registration, direct register access) use
//! `lungo_core` directly.

pub mod engine;

pub use engine::{Engine, EngineValue};
