//! Application state shared across handlers

use std::sync::Arc;

use crate::handlers::analytics::AnalyticsService;
use crate::messaging::MessagingService;
use crate::wallet::WalletService;
use crate::websocket::WsState;

use axum::extract::FromRef;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub wallet_service: Arc<WalletService>,
    pub messaging_service: Arc<MessagingService>,
    pub analytics_service: Arc<AnalyticsService>,
    pub ws_state: WsState,
    pub webhook_secret: Option<String>,
}

impl AppState {
    pub fn new(
        wallet_service: Arc<WalletService>,
        messaging_service: Arc<MessagingService>,
        analytics_service: Arc<AnalyticsService>,
        ws_state: WsState,
        webhook_secret: Option<String>,
    ) -> Self {
        Self {
            wallet_service,
            messaging_service,
            analytics_service,
            ws_state,
            webhook_secret,
        }
    }
}

impl FromRef<AppState> for WsState {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.ws_state.clone()
    }
}

impl FromRef<AppState> for Arc<WalletService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.wallet_service.clone()
    }
}

impl FromRef<AppState> for Arc<MessagingService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.messaging_service.clone()
    }
}

impl FromRef<AppState> for Arc<AnalyticsService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.analytics_service.clone()
    }
}
