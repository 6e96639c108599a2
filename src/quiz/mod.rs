//! Question kinds and session definitions
//!
//! This module contains the question kinds supported by a session, the
//! configuration a session is loaded from, and the capability interface the
//! rest of the crate uses to apply per-kind answer and timer rules.

pub mod common;
pub mod config;
pub mod free_text;
pub mod multiple_choice;
pub mod speed;
