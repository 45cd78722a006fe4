//! Root application module.
//!
//! Wires the wallet core into Leptos: the [`WalletManager`] stays the single
//! writer, and a subscription mirrors every published state into a signal
//! that components read.

use std::rc::Rc;

use leptos::prelude::*;
use leptos::task::spawn_local;
use log::{info, warn};

use crate::config::{self, APP_NAME, APP_VERSION, WALLET_INSTALL_URL};
use crate::core::preference::{self, GameMode, StorageWatch};
use crate::core::{EventBridge, InjectedProvider, WalletManager};
use crate::models::{ConnectionState, Phase};

// ============================================================================
// WalletContext
// ============================================================================

/// Wallet state and commands shared through the component tree.
#[derive(Clone, Copy)]
pub struct WalletContext {
    /// Mirror of the manager's state; never written by components.
    pub state: RwSignal<ConnectionState>,
    /// Last observed presence of `window.ethereum`; re-checked on connect.
    pub provider_available: RwSignal<bool>,
    manager: StoredValue<WalletManager, LocalStorage>,
    bridge: StoredValue<Option<EventBridge>, LocalStorage>,
}

impl WalletContext {
    /// Re-probe the provider, which an extension may inject after load, and
    /// attach wallet events the first time it is seen.
    pub fn refresh_provider(&self) -> bool {
        let manager = self.manager.get_value();
        let available = manager.is_provider_available();
        self.provider_available.set(available);

        if available && self.bridge.with_value(Option::is_none) {
            match EventBridge::attach(&manager) {
                Ok((bridge, pump)) => {
                    spawn_local(pump.run());
                    self.bridge.set_value(Some(bridge));
                }
                Err(e) => warn!("failed to attach wallet events: {e}"),
            }
        }
        available
    }

    /// Errors are recorded in `state`, so the result is not needed here.
    pub fn connect(&self) {
        self.refresh_provider();
        let manager = self.manager.get_value();
        spawn_local(async move {
            let _ = manager.connect().await;
        });
    }

    pub fn disconnect(&self) {
        self.manager.with_value(WalletManager::disconnect);
    }

    pub fn toggle_connection(&self) {
        if self.state.with_untracked(ConnectionState::is_connected) {
            self.disconnect();
        } else {
            self.connect();
        }
    }
}

/// Build the wallet core for the injected provider and provide it as context.
///
/// The subscription and event bridge live as long as the current reactive
/// owner; disposing it releases the wallet listeners.
pub fn provide_wallet_context() -> WalletContext {
    let manager = WalletManager::new(Rc::new(InjectedProvider::new()), config::required_chain());

    let state = RwSignal::new(manager.state());
    let subscription = manager.subscribe(move |next| state.set(next.clone()));
    let _subscription = StoredValue::new_local(subscription);

    let restoring = manager.clone();
    spawn_local(async move {
        if let Err(e) = restoring.restore().await {
            warn!("session restore failed: {e}");
        }
    });

    let ctx = WalletContext {
        state,
        provider_available: RwSignal::new(false),
        manager: StoredValue::new_local(manager),
        bridge: StoredValue::new_local(None),
    };
    if !ctx.refresh_provider() {
        info!("no wallet provider yet, events attach on connect");
    }
    provide_context(ctx);
    ctx
}

pub fn use_wallet_context() -> WalletContext {
    use_context::<WalletContext>().expect("WalletContext must be provided")
}

// ============================================================================
// Game mode
// ============================================================================

/// Game mode signal, kept in sync with writes from other tabs.
pub fn provide_game_mode() -> RwSignal<GameMode> {
    let mode = RwSignal::new(preference::load_game_mode());
    match StorageWatch::game_mode(move |next| mode.set(next)) {
        Ok(watch) => {
            let _watch = StoredValue::new_local(watch);
        }
        Err(e) => warn!("game mode sync disabled: {e}"),
    }
    provide_context(mode);
    mode
}

fn set_game_mode(mode: RwSignal<GameMode>, next: GameMode) {
    mode.set(next);
    if let Err(e) = preference::store_game_mode(next) {
        warn!("failed to persist game mode: {e}");
    }
}

// ============================================================================
// Components
// ============================================================================

#[component]
pub fn App() -> impl IntoView {
    provide_wallet_context();
    provide_game_mode();

    view! {
        <main class="app">
            <h1>{APP_NAME}</h1>
            <WalletPanel />
            <GameModeToggle />
            <footer>{format!("{APP_NAME} v{APP_VERSION}")}</footer>
        </main>
    }
}

#[component]
fn WalletPanel() -> impl IntoView {
    let wallet = use_wallet_context();

    let status = move || wallet.state.with(ConnectionState::display_name);
    let network = move || {
        wallet
            .state
            .with(|s| s.session().map(|session| config::chain_name(session.chain_id)))
    };
    let error = move || wallet.state.with(|s| s.error_message().map(str::to_string));
    let busy = move || wallet.state.with(|s| s.phase() == Phase::Connecting);
    let label = move || {
        if wallet.state.with(ConnectionState::is_connected) {
            "Disconnect"
        } else {
            "Connect Wallet"
        }
    };

    view! {
        <section class="wallet">
            <p class="status">{status}</p>
            {move || network().map(|name| view! { <p class="network">{name}</p> })}
            <button disabled=busy on:click=move |_| wallet.toggle_connection()>
                {label}
            </button>
            <Show when=move || !wallet.provider_available.get()>
                <a href=WALLET_INSTALL_URL target="_blank" rel="noopener noreferrer">
                    "Install a wallet"
                </a>
            </Show>
            {move || error().map(|e| view! { <p class="error">{e}</p> })}
        </section>
    }
}

#[component]
fn GameModeToggle() -> impl IntoView {
    let mode = use_context::<RwSignal<GameMode>>().expect("GameMode signal must be provided");

    view! {
        <button class="mode" on:click=move |_| set_game_mode(mode, mode.get_untracked().toggled())>
            {move || mode.get().label()}
        </button>
    }
}
