//! Waiting and admitted client sets.
//!
//! Both sets keep insertion order, so fan-out reaches clients in the order they
//! registered. A client is in at most one set at a time.

use crate::client::{same_client, ClientHandle};

#[derive(Default)]
pub(crate) struct ClientRegistry {
    waiting: Vec<ClientHandle>,
    admitted: Vec<ClientHandle>,
}

impl ClientRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue `client` for the session outcome.
    ///
    /// Returns `false` without change if it is already waiting or admitted.
    pub(crate) fn add_waiting(&mut self, client: ClientHandle) -> bool {
        if self.contains(&client) {
            return false;
        }
        self.waiting.push(client);
        true
    }

    /// Drop `client` from whichever set holds it.
    pub(crate) fn remove(&mut self, client: &ClientHandle) -> bool {
        let before = self.waiting.len() + self.admitted.len();
        self.waiting.retain(|c| !same_client(c, client));
        self.admitted.retain(|c| !same_client(c, client));
        before != self.waiting.len() + self.admitted.len()
    }

    /// Move `client` from waiting to admitted. Returns `false` if it was not waiting.
    pub(crate) fn admit(&mut self, client: &ClientHandle) -> bool {
        match self.waiting.iter().position(|c| same_client(c, client)) {
            Some(index) => {
                let client = self.waiting.remove(index);
                self.admitted.push(client);
                true
            }
            None => false,
        }
    }

    pub(crate) fn waiting_snapshot(&self) -> Vec<ClientHandle> {
        self.waiting.clone()
    }

    pub(crate) fn admitted_snapshot(&self) -> Vec<ClientHandle> {
        self.admitted.clone()
    }

    pub(crate) fn is_waiting(&self, client: &ClientHandle) -> bool {
        self.waiting.iter().any(|c| same_client(c, client))
    }

    pub(crate) fn is_admitted(&self, client: &ClientHandle) -> bool {
        self.admitted.iter().any(|c| same_client(c, client))
    }

    pub(crate) fn contains(&self, client: &ClientHandle) -> bool {
        self.is_waiting(client) || self.is_admitted(client)
    }

    pub(crate) fn waiting_len(&self) -> usize {
        self.waiting.len()
    }

    pub(crate) fn admitted_len(&self) -> usize {
        self.admitted.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.waiting.len() + self.admitted.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.waiting.is_empty() && self.admitted.is_empty()
    }
}
