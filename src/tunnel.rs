//! Connection transport boundary
//!
//! This module defines the traits used to hand outgoing messages to the
//! transport that reaches connected participants and administrators. The
//! core never assumes a particular transport; it only needs to find the
//! tunnel for a connection id and ask it to deliver a message.

use serde::Serialize;
use thiserror::Error;

use crate::{UpdateMessage, registry::Id};

/// Errors a tunnel may report when a message cannot be handed over
#[derive(Error, Serialize, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The connection behind the tunnel is gone
    #[error("tunnel is closed")]
    Closed,
    /// Any other transport failure
    #[error("tunnel failure: {0}")]
    Other(String),
}

/// Trait for sending messages through a communication tunnel
///
/// Implementations might use WebSockets, Server-Sent Events, or other
/// real-time protocols. Sending must not block on delivery completion: a
/// typical implementation pushes onto a per-connection queue and returns.
pub trait Tunnel {
    /// Hands a message to the connection
    ///
    /// The message carries the template reference and the context bundle;
    /// rendering it into a displayable payload is the transport's concern.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection can no longer accept messages.
    fn send_message(&self, message: &UpdateMessage) -> Result<(), Error>;
}

/// Resolves a connection id to its tunnel
///
/// Any `Fn(Id) -> Option<T>` closure is a tunnel finder, so transports can
/// pass a lookup into their own socket table.
pub trait TunnelFinder: Send + Sync + 'static {
    /// The tunnel type returned by this finder
    type Tunnel: Tunnel;

    /// Finds the tunnel for a connection, or `None` if it is not reachable
    fn find(&self, id: Id) -> Option<Self::Tunnel>;
}

impl<T, F> TunnelFinder for F
where
    T: Tunnel,
    F: Fn(Id) -> Option<T> + Send + Sync + 'static,
{
    type Tunnel = T;

    fn find(&self, id: Id) -> Option<T> {
        self(id)
    }
}
