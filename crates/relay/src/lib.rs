//! Relay - TCP line relay
//!
//! Accepts TCP connections, splits each byte stream into newline-delimited
//! lines, and publishes every non-empty line as one broker message.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐     ┌─────────────┐     ┌──────────────┐     ┌────────┐
//! │ LineSource │────►│ relay queue │────►│  WorkerPool  │────►│ broker │
//! │ (1 task per│     │  (bounded)  │     │ (N workers)  │     │        │
//! │ connection)│     └─────────────┘     └──────────────┘     └────────┘
//! └────────────┘
//! ```
//!
//! The binary wires these together through [`server::Relay`]; tests drive
//! the same type with an in-memory publisher.

pub mod server;

pub use server::{Relay, wait_for_shutdown};
