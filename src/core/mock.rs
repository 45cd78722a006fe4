//! Scriptable in-memory wallet for tests.
//!
//! Behaves like an injected EIP-1193 wallet: it remembers authorization,
//! tracks the active and known chains, emits `chainChanged` when the active
//! chain moves, and can hold a method's response until released so tests
//! can interleave calls deterministically.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use async_trait::async_trait;
use futures::channel::oneshot;
use serde_json::{Value, json};

use super::error::ProviderError;
use super::network::parse_chain_id;
use super::provider::{Eip1193Provider, EventKind, Listener, ListenerId, ProviderEvent, methods};

/// Account returned by default, lowercase as most wallets report it.
pub const DEFAULT_ACCOUNT: &str = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed";

#[derive(Clone)]
pub struct MockProvider {
    inner: Rc<MockInner>,
}

struct MockInner {
    installed: Cell<bool>,
    authorized: Cell<bool>,
    accounts: RefCell<Vec<String>>,
    chain_id: Cell<u64>,
    known_chains: RefCell<HashSet<u64>>,
    failures: RefCell<HashMap<String, ProviderError>>,
    responses: RefCell<HashMap<String, Value>>,
    calls: RefCell<Vec<(String, Value)>>,
    held: RefCell<HashSet<String>>,
    waiters: RefCell<Vec<(String, oneshot::Sender<()>)>>,
    listeners: RefCell<Vec<(ListenerId, EventKind, Listener)>>,
    next_listener: Cell<u64>,
}

impl MockProvider {
    /// Installed wallet on Ethereum mainnet holding [`DEFAULT_ACCOUNT`],
    /// not yet authorized for this site.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(MockInner {
                installed: Cell::new(true),
                authorized: Cell::new(false),
                accounts: RefCell::new(vec![DEFAULT_ACCOUNT.to_string()]),
                chain_id: Cell::new(1),
                known_chains: RefCell::new(HashSet::from([1])),
                failures: RefCell::new(HashMap::new()),
                responses: RefCell::new(HashMap::new()),
                calls: RefCell::new(Vec::new()),
                held: RefCell::new(HashSet::new()),
                waiters: RefCell::new(Vec::new()),
                listeners: RefCell::new(Vec::new()),
                next_listener: Cell::new(0),
            }),
        }
    }

    pub fn uninstalled() -> Self {
        let mock = Self::new();
        mock.inner.installed.set(false);
        mock
    }

    /// Active chain; also marks it as known.
    pub fn with_chain(self, chain_id: u64) -> Self {
        self.inner.chain_id.set(chain_id);
        self.inner.known_chains.borrow_mut().insert(chain_id);
        self
    }

    pub fn with_known_chain(self, chain_id: u64) -> Self {
        self.inner.known_chains.borrow_mut().insert(chain_id);
        self
    }

    pub fn with_accounts(self, accounts: &[&str]) -> Self {
        self.set_accounts(accounts);
        self
    }

    /// Site already authorized, as after a previous session.
    pub fn with_authorized(self) -> Self {
        self.inner.authorized.set(true);
        self
    }

    pub fn set_installed(&self, installed: bool) {
        self.inner.installed.set(installed);
    }

    pub fn set_accounts(&self, accounts: &[&str]) {
        *self.inner.accounts.borrow_mut() = accounts.iter().map(|a| a.to_string()).collect();
    }

    pub fn chain_id(&self) -> u64 {
        self.inner.chain_id.get()
    }

    /// Every call to `method` fails with `err` until cleared.
    pub fn fail(&self, method: &str, err: ProviderError) {
        self.inner.failures.borrow_mut().insert(method.to_string(), err);
    }

    pub fn clear_failure(&self, method: &str) {
        self.inner.failures.borrow_mut().remove(method);
    }

    /// Every call to `method` returns `value` verbatim.
    pub fn respond(&self, method: &str, value: Value) {
        self.inner.responses.borrow_mut().insert(method.to_string(), value);
    }

    /// Calls to `method` are recorded but stay pending until [`Self::release`].
    pub fn hold(&self, method: &str) {
        self.inner.held.borrow_mut().insert(method.to_string());
    }

    pub fn release(&self, method: &str) {
        self.inner.held.borrow_mut().remove(method);
        let ready: Vec<_> = {
            let mut waiters = self.inner.waiters.borrow_mut();
            let (ready, pending): (Vec<_>, Vec<_>) = waiters.drain(..).partition(|(m, _)| m == method);
            *waiters = pending;
            ready
        };
        for (_, tx) in ready {
            let _ = tx.send(());
        }
    }

    pub fn calls_to(&self, method: &str) -> usize {
        self.inner
            .calls
            .borrow()
            .iter()
            .filter(|(m, _)| m == method)
            .count()
    }

    pub fn last_params(&self, method: &str) -> Option<Value> {
        self.inner
            .calls
            .borrow()
            .iter()
            .rev()
            .find(|(m, _)| m == method)
            .map(|(_, p)| p.clone())
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    /// User picks different accounts in the wallet UI.
    pub fn change_accounts(&self, accounts: &[&str]) {
        self.set_accounts(accounts);
        self.emit(ProviderEvent::AccountsChanged(
            accounts.iter().map(|a| a.to_string()).collect(),
        ));
    }

    /// User switches network in the wallet UI.
    pub fn change_chain(&self, chain_id: u64) {
        self.inner.known_chains.borrow_mut().insert(chain_id);
        self.activate_chain(chain_id);
    }

    pub fn emit(&self, event: ProviderEvent) {
        let kind = event.kind();
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(_, _, l)| Rc::clone(l))
            .collect();
        for listener in listeners {
            listener(event.clone());
        }
    }

    fn activate_chain(&self, chain_id: u64) {
        if self.inner.chain_id.replace(chain_id) != chain_id {
            self.emit(ProviderEvent::ChainChanged(format!("0x{:x}", chain_id)));
        }
    }

    async fn wait_if_held(&self, method: &str) {
        let pending = if self.inner.held.borrow().contains(method) {
            let (tx, rx) = oneshot::channel();
            self.inner.waiters.borrow_mut().push((method.to_string(), tx));
            Some(rx)
        } else {
            None
        };
        if let Some(rx) = pending {
            let _ = rx.await;
        }
    }

    fn requested_chain(params: &Value) -> Result<u64, ProviderError> {
        params
            .pointer("/0/chainId")
            .and_then(parse_chain_id)
            .ok_or_else(|| ProviderError::new(-32602, "Invalid params"))
    }

    fn answer(&self, method: &str, params: &Value) -> Result<Value, ProviderError> {
        if let Some(err) = self.inner.failures.borrow().get(method) {
            return Err(err.clone());
        }
        if let Some(value) = self.inner.responses.borrow().get(method) {
            return Ok(value.clone());
        }

        match method {
            methods::REQUEST_ACCOUNTS => {
                self.inner.authorized.set(true);
                Ok(json!(*self.inner.accounts.borrow()))
            }
            methods::ACCOUNTS if self.inner.authorized.get() => {
                Ok(json!(*self.inner.accounts.borrow()))
            }
            methods::ACCOUNTS => Ok(json!([])),
            methods::CHAIN_ID => Ok(json!(format!("0x{:x}", self.inner.chain_id.get()))),
            methods::SWITCH_CHAIN => {
                let chain_id = Self::requested_chain(params)?;
                if !self.inner.known_chains.borrow().contains(&chain_id) {
                    return Err(ProviderError::unrecognized_chain(&format!("0x{:x}", chain_id)));
                }
                self.activate_chain(chain_id);
                Ok(Value::Null)
            }
            methods::ADD_CHAIN => {
                let chain_id = Self::requested_chain(params)?;
                self.inner.known_chains.borrow_mut().insert(chain_id);
                self.activate_chain(chain_id);
                Ok(Value::Null)
            }
            _ => Err(ProviderError::new(4200, "The requested method is not supported")),
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl Eip1193Provider for MockProvider {
    fn is_available(&self) -> bool {
        self.inner.installed.get()
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        if !self.inner.installed.get() {
            return Err(ProviderError::other("no injected provider"));
        }
        self.inner
            .calls
            .borrow_mut()
            .push((method.to_string(), params.clone()));
        self.wait_if_held(method).await;
        self.answer(method, &params)
    }

    fn on(&self, kind: EventKind, listener: Listener) -> Result<ListenerId, ProviderError> {
        let id = ListenerId(self.inner.next_listener.get());
        self.inner.next_listener.set(id.0 + 1);
        self.inner.listeners.borrow_mut().push((id, kind, listener));
        Ok(id)
    }

    fn remove_listener(&self, id: ListenerId) {
        self.inner.listeners.borrow_mut().retain(|(lid, _, _)| *lid != id);
    }
}
