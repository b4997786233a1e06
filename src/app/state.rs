//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::{Arena, ArenaHandle};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub arena: ArenaHandle,
}

impl AppState {
    /// Create the shared state and the arena it talks to; the caller spawns
    /// the returned arena onto the runtime.
    pub fn new(config: Config) -> (Self, Arena) {
        let config = Arc::new(config);
        let (arena, handle) = Arena::new();

        (
            Self {
                config,
                arena: handle,
            },
            arena,
        )
    }
}
