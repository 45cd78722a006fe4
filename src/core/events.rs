//! Provider event wiring.
//!
//! Wallet callbacks only enqueue; [`EventPump`] drains the queue one event
//! at a time so reconciliations never overlap.

use std::rc::Rc;

use futures::FutureExt;
use futures::StreamExt;
use futures::channel::mpsc::{self, UnboundedReceiver};
use log::debug;

use super::error::WalletError;
use super::provider::{Eip1193Provider, EventKind, Listener, ListenerId, ProviderEvent};
use super::wallet::WalletManager;

/// Registered `accountsChanged` / `chainChanged` listeners.
///
/// Dropping the bridge removes them from the provider, which also ends the
/// paired [`EventPump`].
pub struct EventBridge {
    provider: Rc<dyn Eip1193Provider>,
    listeners: Vec<ListenerId>,
}

pub struct EventPump {
    manager: WalletManager,
    events: UnboundedReceiver<ProviderEvent>,
}

impl EventBridge {
    pub fn attach(manager: &WalletManager) -> Result<(Self, EventPump), WalletError> {
        let provider = manager.provider();
        if !provider.is_available() {
            return Err(WalletError::ProviderMissing);
        }

        let (tx, rx) = mpsc::unbounded();
        let mut listeners = Vec::with_capacity(2);
        for kind in [EventKind::AccountsChanged, EventKind::ChainChanged] {
            let tx = tx.clone();
            let listener: Listener = Rc::new(move |event| {
                // Receiver gone means the pump stopped; nothing to do.
                let _ = tx.unbounded_send(event);
            });
            match provider.on(kind, listener) {
                Ok(id) => listeners.push(id),
                Err(e) => {
                    for id in listeners {
                        provider.remove_listener(id);
                    }
                    return Err(WalletError::Rpc(e));
                }
            }
        }
        debug!("event bridge attached");

        let pump = EventPump {
            manager: manager.clone(),
            events: rx,
        };
        Ok((Self { provider, listeners }, pump))
    }
}

impl Drop for EventBridge {
    fn drop(&mut self) {
        for id in self.listeners.drain(..) {
            self.provider.remove_listener(id);
        }
        debug!("event bridge detached");
    }
}

impl EventPump {
    /// Reconcile events in arrival order until the bridge is dropped.
    pub async fn run(mut self) {
        while let Some(event) = self.events.next().await {
            self.manager.reconcile(event).await;
        }
        debug!("event pump stopped");
    }

    /// Reconcile whatever is queued right now, without waiting for more.
    pub async fn drain(&mut self) -> usize {
        let mut handled = 0;
        while let Some(Some(event)) = self.events.next().now_or_never() {
            self.manager.reconcile(event).await;
            handled += 1;
        }
        handled
    }
}
