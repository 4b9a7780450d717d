//! Core model for codemap impact analysis: action classification, per-session
//! accumulation, date windowing, aggregate metrics, and outcome matching.
//!
//! The log-source adapters (`impact-codex`, `impact-claude`) feed classified
//! actions into [`session::SessionStats`]; everything downstream of the
//! accumulator is ecosystem-agnostic.

pub mod aggregate;
pub mod classify;
pub mod git;
pub mod jsonl;
pub mod outcome;
pub mod session;
pub mod window;
