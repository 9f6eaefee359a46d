//! # Reflow Host
//!
//! Library surface for the reflow oven host process: the shared
//! configuration loader, the TMS serial link, the Monitor, the
//! Rust-native [`controller::ReflowController`], and the data shapes
//! exchanged between them. `src/main.rs` is a thin binary wrapper
//! around this crate; integration tests and any embedding process
//! depend on it directly.

pub mod config;
pub mod controller;
pub mod data_model;
pub mod monitor;
pub mod tms_link;
