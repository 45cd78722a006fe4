//! Wallet connection lifecycle.
//!
//! [`WalletManager`] is the only writer of the [`ConnectionState`]. It drives
//! connect/disconnect, delegates chain enforcement to [`NetworkEnforcer`],
//! and re-derives state from the provider when the wallet reports account or
//! chain changes.
//!
//! # State machine
//!
//! ```text
//! Disconnected --connect()--> Connecting
//! Connecting   --accounts + chain ok-------------> Connected
//! Connecting   --rejected / no accounts / switch failed--> Disconnected
//! Connected    --disconnect() / zero accounts-----------> Disconnected
//! Connected    --chain changed, mismatch----------------> Disconnected
//! Connected    --accounts or chain changed, still valid-> Connected
//! ```
//!
//! Everything runs on one thread. Concurrent `connect()` calls share one
//! attempt, and every reset bumps an epoch so an attempt that resolves after
//! a disconnect discards its result instead of resurrecting the connection.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use alloy_primitives::Address;
use futures::FutureExt;
use futures::future::{LocalBoxFuture, Shared};
use log::{debug, info, warn};
use serde_json::Value;

use super::error::{ProviderError, WalletError};
use super::network::NetworkEnforcer;
use super::provider::{Eip1193Provider, ProviderEvent, methods};
use super::store::{StateStore, Subscription};
use crate::models::{ChainConfig, ConnectionState, Phase, Session};

type Attempt = Shared<LocalBoxFuture<'static, Result<Session, WalletError>>>;

/// Owns the connection state for one provider and one required chain.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct WalletManager {
    inner: Rc<Inner>,
}

struct Inner {
    provider: Rc<dyn Eip1193Provider>,
    chain: ChainConfig,
    store: Rc<StateStore>,
    /// Bumped on every reset; attempts started in an older epoch are stale.
    epoch: Cell<u64>,
    next_attempt: Cell<u64>,
    in_flight: RefCell<Option<(u64, Attempt)>>,
    /// Set when a wallet event lands while connecting.
    resync: Cell<bool>,
}

/// Outcome of querying the provider for its authoritative state.
enum Derived {
    Valid(Session),
    NoAccounts,
    WrongChain(u64),
}

impl WalletManager {
    pub fn new(provider: Rc<dyn Eip1193Provider>, chain: ChainConfig) -> Self {
        Self {
            inner: Rc::new(Inner {
                provider,
                chain,
                store: StateStore::new(),
                epoch: Cell::new(0),
                next_attempt: Cell::new(0),
                in_flight: RefCell::new(None),
                resync: Cell::new(false),
            }),
        }
    }

    pub fn is_provider_available(&self) -> bool {
        self.inner.provider.is_available()
    }

    pub fn required_chain(&self) -> &ChainConfig {
        &self.inner.chain
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.store.snapshot()
    }

    /// Called with every new state until the returned guard is dropped.
    pub fn subscribe(&self, f: impl Fn(&ConnectionState) + 'static) -> Subscription {
        self.inner.store.subscribe(f)
    }

    pub(crate) fn provider(&self) -> Rc<dyn Eip1193Provider> {
        Rc::clone(&self.inner.provider)
    }

    /// Ask the wallet for an account and put it on the required chain.
    ///
    /// While an attempt is in flight, further calls wait for that attempt
    /// instead of prompting again. Failures are recorded in the state and
    /// returned; nothing is retried.
    pub async fn connect(&self) -> Result<Session, WalletError> {
        if !self.is_provider_available() {
            let err = WalletError::ProviderMissing;
            warn!("connect: {err}");
            self.inner.reset(Some(&err));
            return Err(err);
        }

        let pending = self
            .inner
            .in_flight
            .borrow()
            .as_ref()
            .map(|(_, attempt)| attempt.clone());
        let attempt = match pending {
            Some(attempt) => {
                debug!("connect already in flight, joining it");
                attempt
            }
            None => self.start_attempt(),
        };
        attempt.await
    }

    fn start_attempt(&self) -> Attempt {
        let id = self.inner.next_attempt.get();
        self.inner.next_attempt.set(id + 1);

        let inner = Rc::clone(&self.inner);
        let attempt = async move { inner.run_attempt(id).await }
            .boxed_local()
            .shared();
        *self.inner.in_flight.borrow_mut() = Some((id, attempt.clone()));
        attempt
    }

    /// Local reset only; the wallet keeps its authorization, so a later
    /// `connect()` may succeed without a prompt.
    pub fn disconnect(&self) {
        info!("wallet disconnected");
        self.inner.reset(None);
    }

    /// Re-hydrate from what the wallet already remembers, without prompting.
    ///
    /// Becomes `Connected` only when an account is authorized and the wallet
    /// is on the required chain. Leaves any other phase untouched.
    pub async fn restore(&self) -> Result<Option<Session>, WalletError> {
        if !self.is_provider_available() || self.state().phase() != Phase::Disconnected {
            return Ok(self.state().session().cloned());
        }

        let revision = self.inner.store.revision();
        let derived = self.inner.derive().await?;
        if self.inner.store.revision() != revision {
            debug!("state changed during restore, keeping it");
            return Ok(self.state().session().cloned());
        }

        match derived {
            Derived::Valid(session) => {
                info!("restored session for {}", session.checksum_address());
                self.inner
                    .store
                    .publish(ConnectionState::connected(session.clone()));
                Ok(Some(session))
            }
            Derived::NoAccounts => Ok(None),
            Derived::WrongChain(actual) => {
                debug!("authorized but on chain {actual}, not restoring");
                Ok(None)
            }
        }
    }

    /// Put the wallet on the required chain outside of `connect()`.
    ///
    /// On failure the error is recorded and the state reset. On success while
    /// connected, the state is re-validated against a fresh provider query.
    pub async fn ensure_required_chain(&self) -> Result<(), WalletError> {
        if !self.is_provider_available() {
            let err = WalletError::ProviderMissing;
            self.inner.reset(Some(&err));
            return Err(err);
        }

        let enforcer = NetworkEnforcer::new(self.inner.provider.as_ref(), &self.inner.chain);
        if let Err(err) = enforcer.ensure_required_chain().await {
            warn!("network switch failed: {err}");
            self.inner.reset(Some(&err));
            return Err(err);
        }

        if self.state().is_connected() {
            self.inner.revalidate().await;
        }
        Ok(())
    }

    /// Reconcile a provider notification into the state.
    ///
    /// Only a connected state is reconciled; the payload is used solely to
    /// short-circuit an empty account list, everything else is re-queried.
    /// While connecting, the event only forces the attempt to re-derive its
    /// result before committing.
    pub async fn reconcile(&self, event: ProviderEvent) {
        let state = self.state();
        if state.phase() == Phase::Connecting {
            debug!("{:?} during connect, attempt will re-derive", event.kind());
            self.inner.resync.set(true);
            return;
        }
        if !state.is_connected() {
            debug!("ignoring {:?} while {:?}", event.kind(), state.phase());
            return;
        }

        if let ProviderEvent::AccountsChanged(accounts) = &event
            && accounts.is_empty()
        {
            info!("wallet reported no accounts, disconnecting");
            self.inner.reset(None);
            return;
        }

        debug!("reconciling after {event:?}");
        self.inner.revalidate().await;
    }

    /// Read-only access to the live provider, present iff connected.
    pub fn provider_handle(&self) -> Option<ProviderHandle> {
        self.state().session().cloned().map(|session| ProviderHandle {
            provider: Rc::clone(&self.inner.provider),
            session,
        })
    }

    /// Permission check for actions that need a connected wallet.
    pub fn require_session(&self) -> Result<Session, WalletError> {
        self.state()
            .session()
            .cloned()
            .ok_or(WalletError::NotConnected)
    }
}

impl Inner {
    async fn run_attempt(self: Rc<Self>, id: u64) -> Result<Session, WalletError> {
        let epoch = self.epoch.get();
        self.store.publish(ConnectionState::connecting());
        info!("connecting to {}", self.chain.chain_name);

        let outcome = self.handshake(epoch).await;
        self.in_flight.borrow_mut().take_if(|(attempt, _)| *attempt == id);

        if self.epoch.get() != epoch {
            info!("connect resolved after a reset, discarding result");
            return Err(WalletError::Superseded);
        }

        match outcome {
            Ok(session) => {
                info!(
                    "connected {} on chain {}",
                    session.checksum_address(),
                    session.chain_id
                );
                self.store
                    .publish(ConnectionState::connected(session.clone()));
                Ok(session)
            }
            Err(err) => {
                if let WalletError::Rpc(e) = &err
                    && e.is_request_pending()
                {
                    info!("wallet already has a connection prompt open");
                }
                warn!("connect failed: {err}");
                self.store.publish(ConnectionState::failed(err.to_string()));
                Err(err)
            }
        }
    }

    /// Stale attempts stop after the round-trip that observed the reset,
    /// so no further wallet prompt goes out on their behalf.
    async fn handshake(&self, epoch: u64) -> Result<Session, WalletError> {
        let accounts = self
            .provider
            .request(methods::REQUEST_ACCOUNTS, Value::Null)
            .await
            .map_err(WalletError::from_request)?;
        self.ensure_current(epoch)?;
        if let Some(account) = parse_accounts(&accounts)?.first() {
            parse_address(account)?;
        } else {
            return Err(WalletError::NoAccounts);
        }

        let enforcer = NetworkEnforcer::new(self.provider.as_ref(), &self.chain);
        let current = enforcer.current_chain_id().await.ok();
        self.ensure_current(epoch)?;
        if current != Some(self.chain.chain_id) {
            enforcer.switch_to_required().await?;
            self.ensure_current(epoch)?;
        }

        // Never trust the grant or the switch alone; commit only what the
        // wallet reports now.
        loop {
            self.resync.set(false);
            let derived = self.derive().await?;
            self.ensure_current(epoch)?;
            if self.resync.get() {
                debug!("wallet changed while connecting, re-deriving");
                continue;
            }
            return match derived {
                Derived::Valid(session) => Ok(session),
                Derived::NoAccounts => Err(WalletError::NoAccounts),
                Derived::WrongChain(actual) => Err(WalletError::WrongNetworkObserved {
                    expected: self.chain.chain_id,
                    actual,
                }),
            };
        }
    }

    fn ensure_current(&self, epoch: u64) -> Result<(), WalletError> {
        if self.epoch.get() == epoch {
            Ok(())
        } else {
            Err(WalletError::Superseded)
        }
    }

    /// Fresh, prompt-free query of accounts and active chain.
    async fn derive(&self) -> Result<Derived, WalletError> {
        let accounts = self
            .provider
            .request(methods::ACCOUNTS, Value::Null)
            .await
            .map_err(WalletError::from_request)?;
        let address = match parse_accounts(&accounts)?.first() {
            Some(account) => parse_address(account)?,
            None => return Ok(Derived::NoAccounts),
        };

        let chain_id = NetworkEnforcer::new(self.provider.as_ref(), &self.chain)
            .current_chain_id()
            .await?;
        if chain_id != self.chain.chain_id {
            return Ok(Derived::WrongChain(chain_id));
        }

        Ok(Derived::Valid(Session { address, chain_id }))
    }

    /// Re-derive a connected state; anything but a valid session disconnects.
    async fn revalidate(&self) {
        let revision = self.store.revision();
        let derived = self.derive().await;
        if self.store.revision() != revision {
            debug!("state changed during reconciliation, dropping result");
            return;
        }

        match derived {
            Ok(Derived::Valid(session)) => {
                self.store.publish(ConnectionState::connected(session));
            }
            Ok(Derived::NoAccounts) => {
                info!("no authorized accounts left, disconnecting");
                self.reset(None);
            }
            Ok(Derived::WrongChain(actual)) => {
                let err = WalletError::WrongNetworkObserved {
                    expected: self.chain.chain_id,
                    actual,
                };
                warn!("{err}");
                self.reset(Some(&err));
            }
            Err(err) => {
                warn!("reconciliation failed: {err}");
                self.reset(Some(&err));
            }
        }
    }

    /// Back to the initial state, invalidating any in-flight attempt.
    fn reset(&self, error: Option<&WalletError>) {
        self.epoch.set(self.epoch.get() + 1);
        self.in_flight.borrow_mut().take();
        self.store.publish(match error {
            Some(err) => ConnectionState::failed(err.to_string()),
            None => ConnectionState::default(),
        });
    }
}

fn parse_accounts(value: &Value) -> Result<Vec<String>, WalletError> {
    serde_json::from_value(value.clone())
        .map_err(|e| WalletError::MalformedResponse(format!("accounts: {e}")))
}

fn parse_address(account: &str) -> Result<Address, WalletError> {
    account
        .parse()
        .map_err(|e| WalletError::MalformedResponse(format!("address {account}: {e}")))
}

/// Provider access for layers that issue their own calls (e.g. transaction
/// submission). Only handed out while connected.
#[derive(Clone)]
pub struct ProviderHandle {
    provider: Rc<dyn Eip1193Provider>,
    session: Session,
}

impl ProviderHandle {
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        self.provider.request(method, params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mock::{DEFAULT_ACCOUNT, MockProvider};
    use serde_json::json;

    const CHECKSUMMED: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";
    const OTHER: &str = "0xfb6916095ca1df60bb79ce92ce3ea74c37c5d359";

    fn setup(mock: &MockProvider) -> WalletManager {
        WalletManager::new(Rc::new(mock.clone()), ChainConfig::mantle())
    }

    async fn connected(mock: &MockProvider) -> WalletManager {
        let manager = setup(mock);
        manager.connect().await.unwrap();
        manager
    }

    #[tokio::test]
    async fn test_connect_on_correct_chain() {
        let mock = MockProvider::new().with_chain(5000);
        let manager = setup(&mock);

        let session = manager.connect().await.unwrap();

        assert_eq!(session.checksum_address(), CHECKSUMMED);
        assert_eq!(session.chain_id, 5000);
        let state = manager.state();
        assert_eq!(state.phase(), Phase::Connected);
        assert_eq!(state.address().as_deref(), Some(CHECKSUMMED));
        assert_eq!(mock.calls_to(methods::SWITCH_CHAIN), 0);
    }

    #[tokio::test]
    async fn test_connect_switches_wrong_chain() {
        let mock = MockProvider::new().with_chain(1).with_known_chain(5000);
        let manager = setup(&mock);

        manager.connect().await.unwrap();

        assert_eq!(mock.calls_to(methods::SWITCH_CHAIN), 1);
        assert_eq!(manager.state().session().map(|s| s.chain_id), Some(5000));
    }

    #[tokio::test]
    async fn test_connect_without_provider() {
        let mock = MockProvider::uninstalled();
        let manager = setup(&mock);

        assert_eq!(manager.connect().await, Err(WalletError::ProviderMissing));
        assert_eq!(manager.state().phase(), Phase::Disconnected);
        assert!(manager.state().error_message().is_some());
        assert_eq!(mock.calls_to(methods::REQUEST_ACCOUNTS), 0);
    }

    #[tokio::test]
    async fn test_provider_injected_after_startup() {
        let mock = MockProvider::uninstalled().with_chain(5000);
        let manager = setup(&mock);
        assert!(!manager.is_provider_available());
        assert_eq!(manager.connect().await, Err(WalletError::ProviderMissing));

        mock.set_installed(true);

        assert!(manager.is_provider_available());
        manager.connect().await.unwrap();
        assert!(manager.state().is_connected());
        assert!(manager.state().error_message().is_none());
    }

    #[tokio::test]
    async fn test_connect_with_no_accounts() {
        let mock = MockProvider::new().with_chain(5000).with_accounts(&[]);
        let manager = setup(&mock);

        assert_eq!(manager.connect().await, Err(WalletError::NoAccounts));
        assert_eq!(manager.state().phase(), Phase::Disconnected);
        assert_eq!(
            manager.state().error_message(),
            Some("No accounts returned from wallet")
        );
    }

    #[tokio::test]
    async fn test_connect_rejected_by_user() {
        let mock = MockProvider::new().with_chain(5000);
        mock.fail(methods::REQUEST_ACCOUNTS, ProviderError::user_rejected());
        let manager = setup(&mock);

        let err = manager.connect().await.unwrap_err();

        assert_eq!(err, WalletError::UserRejected);
        assert_eq!(manager.state().phase(), Phase::Disconnected);
        assert_eq!(mock.calls_to(methods::SWITCH_CHAIN), 0);
    }

    #[tokio::test]
    async fn test_switch_reported_ok_but_chain_unchanged() {
        let mock = MockProvider::new().with_chain(1).with_known_chain(5000);
        mock.respond(methods::SWITCH_CHAIN, Value::Null);
        let manager = setup(&mock);

        let err = manager.connect().await.unwrap_err();

        assert_eq!(
            err,
            WalletError::WrongNetworkObserved {
                expected: 5000,
                actual: 1
            }
        );
        assert_eq!(manager.state().phase(), Phase::Disconnected);
    }

    #[tokio::test]
    async fn test_malformed_account_is_rejected() {
        let mock = MockProvider::new().with_chain(5000);
        mock.respond(methods::REQUEST_ACCOUNTS, json!(["not-an-address"]));
        let manager = setup(&mock);

        let err = manager.connect().await.unwrap_err();

        assert!(matches!(err, WalletError::MalformedResponse(_)));
        assert!(!manager.state().is_connected());
    }

    #[tokio::test]
    async fn test_new_attempt_clears_previous_error() {
        let mock = MockProvider::new().with_chain(5000);
        mock.fail(methods::REQUEST_ACCOUNTS, ProviderError::user_rejected());
        let manager = setup(&mock);
        let _ = manager.connect().await;
        assert!(manager.state().error_message().is_some());

        mock.clear_failure(methods::REQUEST_ACCOUNTS);
        manager.connect().await.unwrap();

        assert_eq!(manager.state().error_message(), None);
    }

    #[tokio::test]
    async fn test_disconnect_keeps_provider_authorization() {
        let mock = MockProvider::new().with_chain(5000);
        let manager = connected(&mock).await;

        manager.disconnect();
        assert_eq!(manager.state(), ConnectionState::default());

        // Wallet still remembers the grant; reconnecting needs no new state.
        manager.connect().await.unwrap();
        assert!(manager.state().is_connected());
    }

    #[tokio::test]
    async fn test_account_switch_updates_address() {
        let mock = MockProvider::new().with_chain(5000);
        let manager = connected(&mock).await;

        mock.set_accounts(&[OTHER]);
        manager
            .reconcile(ProviderEvent::AccountsChanged(vec![OTHER.to_string()]))
            .await;

        let state = manager.state();
        assert!(state.is_connected());
        assert_eq!(
            state.address().map(|a| a.to_lowercase()).as_deref(),
            Some(OTHER)
        );
    }

    #[tokio::test]
    async fn test_empty_accounts_event_disconnects() {
        let mock = MockProvider::new().with_chain(5000);
        let manager = connected(&mock).await;

        manager
            .reconcile(ProviderEvent::AccountsChanged(Vec::new()))
            .await;

        assert_eq!(manager.state(), ConnectionState::default());
    }

    #[tokio::test]
    async fn test_chain_change_to_other_network_disconnects() {
        let mock = MockProvider::new().with_chain(5000);
        let manager = connected(&mock).await;

        mock.change_chain(1);
        manager
            .reconcile(ProviderEvent::ChainChanged("0x1".to_string()))
            .await;

        let state = manager.state();
        assert_eq!(state.phase(), Phase::Disconnected);
        assert_eq!(state.address(), None);
        assert!(state.error_message().unwrap().starts_with("Wrong network"));
    }

    #[tokio::test]
    async fn test_chain_event_payload_is_not_trusted() {
        let mock = MockProvider::new().with_chain(5000);
        let manager = connected(&mock).await;
        let revision = manager.inner.store.revision();

        // Payload claims a foreign chain, but the wallet is still on Mantle.
        manager
            .reconcile(ProviderEvent::ChainChanged("0x1".to_string()))
            .await;

        assert!(manager.state().is_connected());
        assert_eq!(manager.inner.store.revision(), revision);
    }

    #[tokio::test]
    async fn test_events_ignored_while_disconnected() {
        let mock = MockProvider::new().with_chain(5000).with_authorized();
        let manager = setup(&mock);

        manager
            .reconcile(ProviderEvent::AccountsChanged(vec![DEFAULT_ACCOUNT.to_string()]))
            .await;

        assert_eq!(manager.state().phase(), Phase::Disconnected);
        assert_eq!(mock.calls_to(methods::ACCOUNTS), 0);
    }

    #[tokio::test]
    async fn test_restore_from_authorized_wallet() {
        let mock = MockProvider::new().with_chain(5000).with_authorized();
        let manager = setup(&mock);

        let session = manager.restore().await.unwrap();

        assert_eq!(session.map(|s| s.checksum_address()).as_deref(), Some(CHECKSUMMED));
        assert!(manager.state().is_connected());
        assert_eq!(mock.calls_to(methods::REQUEST_ACCOUNTS), 0);
    }

    #[tokio::test]
    async fn test_restore_skips_unauthorized_or_wrong_chain() {
        let mock = MockProvider::new().with_chain(5000);
        let manager = setup(&mock);
        assert_eq!(manager.restore().await, Ok(None));

        let mock = MockProvider::new().with_chain(1).with_authorized();
        let manager = setup(&mock);
        assert_eq!(manager.restore().await, Ok(None));
        assert_eq!(manager.state().phase(), Phase::Disconnected);
        assert_eq!(mock.calls_to(methods::SWITCH_CHAIN), 0);
    }

    #[tokio::test]
    async fn test_provider_handle_only_while_connected() {
        let mock = MockProvider::new().with_chain(5000);
        let manager = setup(&mock);
        assert!(manager.provider_handle().is_none());
        assert_eq!(manager.require_session(), Err(WalletError::NotConnected));

        manager.connect().await.unwrap();
        let handle = manager.provider_handle().unwrap();
        assert_eq!(handle.session().chain_id, 5000);
        assert_eq!(
            handle.request(methods::CHAIN_ID, Value::Null).await,
            Ok(json!("0x1388"))
        );
        assert!(manager.require_session().is_ok());

        manager.disconnect();
        assert!(manager.provider_handle().is_none());
    }

    #[tokio::test]
    async fn test_ensure_required_chain_recovers_connected_state() {
        let mock = MockProvider::new().with_chain(5000);
        let manager = connected(&mock).await;

        // Wallet drifted without an event reaching us yet.
        mock.change_chain(1);
        manager.ensure_required_chain().await.unwrap();

        assert_eq!(mock.chain_id(), 5000);
        assert!(manager.state().is_connected());
    }

    #[tokio::test]
    async fn test_ensure_required_chain_failure_resets() {
        let mock = MockProvider::new().with_chain(5000);
        let manager = connected(&mock).await;

        mock.change_chain(1);
        mock.fail(methods::SWITCH_CHAIN, ProviderError::user_rejected());
        let err = manager.ensure_required_chain().await.unwrap_err();

        assert!(err.is_user_rejection());
        assert_eq!(manager.state().phase(), Phase::Disconnected);
    }

    #[tokio::test]
    async fn test_subscribers_see_each_transition() {
        let mock = MockProvider::new().with_chain(5000);
        let manager = setup(&mock);
        let phases = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&phases);
        let _sub = manager.subscribe(move |s| sink.borrow_mut().push(s.phase()));

        manager.connect().await.unwrap();
        manager.disconnect();

        assert_eq!(
            *phases.borrow(),
            vec![Phase::Connecting, Phase::Connected, Phase::Disconnected]
        );
    }
}
