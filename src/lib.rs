//! # Memoriae
//!
//! This library provides the core of a real-time, multi-participant quiz.
//! Participants and administrators connect to a named session; an
//! administrator drives the session from question to question while
//! participants submit answers. Every change is pushed to the connected
//! clients as rendered views.
//!
//! The entry point is [`hub::Hub`], which ties the session registry, the
//! connection registries, the answer collector and the broadcast
//! coordinator together.

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::similar_names)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::ignored_unit_patterns)]
#![allow(clippy::struct_field_names)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::wildcard_imports)]
use derive_where::derive_where;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

pub mod answers;
pub mod broadcast;
pub mod constants;
pub mod hub;
mod names;
pub mod quiz;
pub mod registry;
pub mod session;
pub mod sessions;
pub mod tunnel;
pub mod view;

#[cfg(test)]
mod testing;

pub use names::NameStyle;

/// Messages pushed to a connection to update its view
///
/// Participant and administrator main views travel on the `update` event;
/// the administrator roster travels on `update_left`.
#[derive(Debug, Serialize, Clone, PartialEq, derive_more::From)]
pub enum UpdateMessage {
    /// The current question as seen by one participant
    Participant(view::ParticipantView),
    /// The current question and its responses as seen by an administrator
    Admin(view::AdminView),
    /// The participant roster shown next to the administrator view
    Sidebar(view::SidebarView),
    /// A request from this connection was refused
    Error(hub::Error),
}

impl UpdateMessage {
    /// Name of the client event this message is delivered on
    pub fn event(&self) -> &'static str {
        match self {
            Self::Participant(_) | Self::Admin(_) => "update",
            Self::Sidebar(_) => "update_left",
            Self::Error(_) => "error",
        }
    }

    /// Converts the update message to a JSON string for transmission
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_message(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Alarm messages for timed session events
///
/// An alarm is self-contained: it names the session and the exact
/// transition it was scheduled for, so a late alarm can be recognised and
/// dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmMessage {
    /// A speed question ran out of time
    ProceedFromQuestion {
        /// Name of the session
        session: String,
        /// The question that armed the timer
        index: usize,
        /// The question to advance to
        to: usize,
        /// Activation of `index` the timer was armed in
        activation: u64,
    },
}

impl AlarmMessage {
    /// Name of the session the alarm belongs to
    pub fn session(&self) -> &str {
        match self {
            Self::ProceedFromQuestion { session, .. } => session,
        }
    }
}

/// A truncated vector that maintains the exact count while limiting displayed items
///
/// Used for the administrator roster: a session may have hundreds of
/// participants while only the first few names are rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[derive_where(Default)]
pub struct TruncatedVec<T> {
    /// The exact total count of items
    exact_count: usize,
    /// The truncated list of items (up to the limit)
    items: Vec<T>,
}

impl<T: Clone> TruncatedVec<T> {
    /// Creates a new truncated vector from an iterator
    ///
    /// # Arguments
    ///
    /// * `list` - An iterator over items to include
    /// * `limit` - Maximum number of items to include in the truncated vector
    /// * `exact_count` - The exact total count of items (may be larger than limit)
    pub fn new<I: Iterator<Item = T>>(list: I, limit: usize, exact_count: usize) -> Self {
        let items = list.take(limit).collect_vec();
        Self { exact_count, items }
    }

    /// Returns the exact count of items
    pub fn exact_count(&self) -> usize {
        self.exact_count
    }

    /// Returns the truncated items
    pub fn items(&self) -> &[T] {
        &self.items
    }
}
