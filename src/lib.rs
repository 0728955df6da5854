//! Turnstile - Dual-Window Request Admission Filter
//!
//! This crate decides, per caller identifier, whether each incoming request is
//! admitted. Every identifier keeps a ledger of recently admitted timestamps
//! that is checked against a short burst window and a longer sustained-rate
//! window. The HTTP layer resolves the identifier and renders the verdict.

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
