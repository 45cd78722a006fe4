//! Injected browser wallet (`window.ethereum`) via web-sys.
//!
//! Provides MetaMask-compatible (EIP-1193) connectivity through
//! direct JavaScript interop via Reflect API.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use async_trait::async_trait;
use js_sys::{Function, Object, Promise, Reflect};
use serde::Serialize;
use serde_json::Value;
use wasm_bindgen::prelude::Closure;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;

use super::error::ProviderError;
use super::provider::{Eip1193Provider, EventKind, Listener, ListenerId, ProviderEvent, methods};
use crate::config::WALLET_TIMEOUT_MS;
use crate::utils::{RaceResult, dom, race_with_timeout};

type JsListener = Closure<dyn Fn(JsValue)>;

/// Handle to whatever wallet the browser injected.
///
/// `window.ethereum` is looked up on every call since extensions may inject
/// after the page has loaded.
#[derive(Default)]
pub struct InjectedProvider {
    listeners: RefCell<HashMap<ListenerId, (EventKind, JsListener)>>,
    next_listener: Cell<u64>,
}

impl InjectedProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Get the window.ethereum object injected by the wallet extension.
fn get_ethereum() -> Result<Object, ProviderError> {
    let window = dom::window().ok_or_else(|| ProviderError::other("Browser window not available"))?;
    Reflect::get(&window, &"ethereum".into())
        .ok()
        .and_then(|v| v.dyn_into::<Object>().ok())
        .ok_or_else(|| ProviderError::other("No injected wallet provider"))
}

fn get_function(target: &Object, name: &str) -> Result<Function, ProviderError> {
    Reflect::get(target, &name.into())
        .ok()
        .and_then(|f| f.dyn_into::<Function>().ok())
        .ok_or_else(|| ProviderError::other(format!("ethereum.{name} is not a function")))
}

fn to_js(value: &Value) -> Result<JsValue, ProviderError> {
    // json_compatible: objects become plain JS objects, not `Map`s.
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| ProviderError::other(format!("Failed to encode params: {e}")))
}

fn from_js(value: JsValue) -> Result<Value, ProviderError> {
    if value.is_undefined() || value.is_null() {
        return Ok(Value::Null);
    }
    serde_wasm_bindgen::from_value(value)
        .map_err(|e| ProviderError::other(format!("Failed to decode response: {e}")))
}

/// Map a rejected `request()` promise onto [`ProviderError`].
fn error_from_js(err: &JsValue) -> ProviderError {
    let code = Reflect::get(err, &"code".into())
        .ok()
        .and_then(|c| c.as_f64())
        .map(|c| c as i64);
    let message = Reflect::get(err, &"message".into())
        .ok()
        .and_then(|m| m.as_string())
        .or_else(|| err.as_string())
        .unwrap_or_else(|| "Unknown wallet error".to_string());
    let data = Reflect::get(err, &"data".into())
        .ok()
        .and_then(|d| from_js(d).ok())
        .filter(|d| !d.is_null());

    ProviderError {
        code,
        message,
        data,
    }
}

fn event_from_js(kind: EventKind, payload: &JsValue) -> Option<ProviderEvent> {
    match kind {
        EventKind::AccountsChanged => {
            let accounts = js_sys::Array::from(payload)
                .iter()
                .filter_map(|a| a.as_string())
                .collect();
            Some(ProviderEvent::AccountsChanged(accounts))
        }
        EventKind::ChainChanged => payload
            .as_string()
            .or_else(|| payload.as_f64().map(|n| format!("0x{:x}", n as u64)))
            .map(ProviderEvent::ChainChanged),
    }
}

#[async_trait(?Send)]
impl Eip1193Provider for InjectedProvider {
    fn is_available(&self) -> bool {
        get_ethereum().is_ok()
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let ethereum = get_ethereum()?;

        // Create { method, params } object
        let args = Object::new();
        Reflect::set(&args, &"method".into(), &method.into())
            .map_err(|_| ProviderError::other("Failed to create wallet request"))?;
        if !params.is_null() {
            Reflect::set(&args, &"params".into(), &to_js(&params)?)
                .map_err(|_| ProviderError::other("Failed to create wallet request"))?;
        }

        let request = get_function(&ethereum, "request")?;
        let promise: Promise = request
            .call1(&ethereum, &args)
            .map_err(|e| error_from_js(&e))?
            .into();

        let outcome = if methods::is_silent(method) {
            match race_with_timeout(JsFuture::from(promise), WALLET_TIMEOUT_MS).await {
                RaceResult::Completed(result) => result,
                RaceResult::TimedOut => {
                    return Err(ProviderError::other(format!("{method} timed out")));
                }
            }
        } else {
            JsFuture::from(promise).await
        };

        match outcome {
            Ok(value) => from_js(value),
            Err(e) => Err(error_from_js(&e)),
        }
    }

    fn on(&self, kind: EventKind, listener: Listener) -> Result<ListenerId, ProviderError> {
        let ethereum = get_ethereum()?;

        let closure: JsListener = Closure::wrap(Box::new(move |payload: JsValue| {
            if let Some(event) = event_from_js(kind, &payload) {
                listener(event);
            }
        }) as Box<dyn Fn(JsValue)>);

        get_function(&ethereum, "on")?
            .call2(&ethereum, &kind.as_str().into(), closure.as_ref())
            .map_err(|e| error_from_js(&e))?;

        let id = ListenerId(self.next_listener.get());
        self.next_listener.set(id.0 + 1);
        self.listeners.borrow_mut().insert(id, (kind, closure));
        Ok(id)
    }

    fn remove_listener(&self, id: ListenerId) {
        let Some((kind, closure)) = self.listeners.borrow_mut().remove(&id) else {
            return;
        };
        if let Ok(ethereum) = get_ethereum()
            && let Ok(remove) = get_function(&ethereum, "removeListener")
        {
            let _ = remove.call2(&ethereum, &kind.as_str().into(), closure.as_ref());
        }
        // `closure` drops here, after the wallet no longer references it.
    }
}
