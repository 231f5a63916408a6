//! Settings and event methods on ToolchainApi.

use tokio::sync::broadcast;

use crate::error::Result;
use crate::settings::{AppSettings, Theme};
use crate::state::ManagerEvent;
use crate::ToolchainApi;

impl ToolchainApi {
    pub async fn get_settings(&self) -> AppSettings {
        self.settings.get().await
    }

    pub async fn set_theme(&self, theme: Theme) -> Result<AppSettings> {
        self.settings.update(|s| s.theme = theme).await
    }

    /// Enable or disable download mirrors. When disabled only the upstream host is used.
    pub async fn set_use_mirrors(&self, use_mirrors: bool) -> Result<AppSettings> {
        self.settings.update(|s| s.use_mirrors = use_mirrors).await
    }

    /// Subscribe to discovery, switch and download events.
    pub async fn subscribe_events(&self) -> broadcast::Receiver<ManagerEvent> {
        self.state.read().await.subscribe()
    }
}
