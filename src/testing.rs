//! Test tunnels

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use crate::{
    UpdateMessage,
    registry::Id,
    tunnel::{Error, Tunnel},
};

#[derive(Debug, Default)]
struct Recorded {
    messages: HashMap<Id, Vec<UpdateMessage>>,
    broken: HashSet<Id>,
}

/// Records every message per connection
#[derive(Debug, Clone, Default)]
pub struct RecordingTunnels {
    inner: Arc<Mutex<Recorded>>,
}

impl RecordingTunnels {
    /// A finder that resolves every id to a recording tunnel
    pub fn finder(
        &self,
    ) -> impl Fn(Id) -> Option<RecordingTunnel> + Send + Sync + 'static + use<> {
        let inner = Arc::clone(&self.inner);
        move |id| {
            Some(RecordingTunnel {
                id,
                inner: Arc::clone(&inner),
            })
        }
    }

    /// Makes every later send to `id` fail
    pub fn break_connection(&self, id: Id) {
        self.inner.lock().unwrap().broken.insert(id);
    }

    /// Every message delivered to `id`, oldest first
    pub fn messages(&self, id: Id) -> Vec<UpdateMessage> {
        self.inner
            .lock()
            .unwrap()
            .messages
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    /// Event names of the messages delivered to `id`
    pub fn events(&self, id: Id) -> Vec<&'static str> {
        self.messages(id)
            .iter()
            .map(UpdateMessage::event)
            .collect()
    }

    /// Forgets everything delivered so far
    pub fn clear(&self) {
        self.inner.lock().unwrap().messages.clear();
    }
}

/// Tunnel handed out by [`RecordingTunnels`]
#[derive(Debug, Clone)]
pub struct RecordingTunnel {
    id: Id,
    inner: Arc<Mutex<Recorded>>,
}

impl Tunnel for RecordingTunnel {
    fn send_message(&self, message: &UpdateMessage) -> Result<(), Error> {
        let mut recorded = self.inner.lock().unwrap();
        if recorded.broken.contains(&self.id) {
            return Err(Error::Closed);
        }
        recorded
            .messages
            .entry(self.id)
            .or_default()
            .push(message.clone());
        Ok(())
    }
}

/// A tunnel whose every send fails
#[derive(Debug, Clone, Copy)]
pub struct FailingTunnel;

impl Tunnel for FailingTunnel {
    fn send_message(&self, _message: &UpdateMessage) -> Result<(), Error> {
        Err(Error::Other("connection reset".to_owned()))
    }
}
