//! Shared application state injected into all Axum handlers.

use crate::config::SessionLimits;
use crate::domain::HubHandle;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Handle to the hub task.
    pub hub: HubHandle,
    /// Limits applied to every new session.
    pub limits: SessionLimits,
}
