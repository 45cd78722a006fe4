//! Game mode preference persisted in localStorage.
//!
//! Other tabs writing the key are picked up through the window `storage`
//! event, which the browser only fires for writes from *other* documents.

use std::fmt;

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::Closure;
use web_sys::StorageEvent;

use super::error::StorageError;
use crate::config::GAME_MODE_KEY;
use crate::utils::dom;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GameMode {
    #[default]
    PlayerVsComputer,
    PlayerVsPlayer,
}

impl GameMode {
    /// Unknown or missing values fall back to the default.
    pub fn from_stored(value: Option<&str>) -> Self {
        match value {
            Some("pvp") => Self::PlayerVsPlayer,
            _ => Self::PlayerVsComputer,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PlayerVsComputer => "pvc",
            Self::PlayerVsPlayer => "pvp",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::PlayerVsComputer => "Player vs Computer",
            Self::PlayerVsPlayer => "Player vs Player",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::PlayerVsComputer => Self::PlayerVsPlayer,
            Self::PlayerVsPlayer => Self::PlayerVsComputer,
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub fn load_game_mode() -> GameMode {
    let stored = dom::local_storage().and_then(|s| s.get_item(GAME_MODE_KEY).ok().flatten());
    GameMode::from_stored(stored.as_deref())
}

pub fn store_game_mode(mode: GameMode) -> Result<(), StorageError> {
    dom::local_storage()
        .ok_or(StorageError::StorageUnavailable)?
        .set_item(GAME_MODE_KEY, mode.as_str())
        .map_err(|_| StorageError::SaveFailed)
}

/// Cross-tab game mode updates; the listener is removed on drop.
pub struct StorageWatch {
    callback: Closure<dyn Fn(StorageEvent)>,
}

impl StorageWatch {
    pub fn game_mode(on_change: impl Fn(GameMode) + 'static) -> Result<Self, StorageError> {
        let window = dom::window().ok_or(StorageError::StorageUnavailable)?;

        let callback = Closure::wrap(Box::new(move |event: StorageEvent| {
            // `key` is null when another tab cleared the whole storage.
            match event.key().as_deref() {
                Some(GAME_MODE_KEY) | None => {
                    on_change(GameMode::from_stored(event.new_value().as_deref()));
                }
                Some(_) => {}
            }
        }) as Box<dyn Fn(StorageEvent)>);

        window
            .add_event_listener_with_callback("storage", callback.as_ref().unchecked_ref())
            .map_err(|_| StorageError::ListenerFailed)?;

        Ok(Self { callback })
    }
}

impl Drop for StorageWatch {
    fn drop(&mut self) {
        if let Some(window) = dom::window() {
            let _ = window.remove_event_listener_with_callback(
                "storage",
                self.callback.as_ref().unchecked_ref(),
            );
        }
    }
}
