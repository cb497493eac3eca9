//! Shared remote server state
use crate::auth::RemoteAuth;
use crate::hub::Hub;
use fermata_playback::ControllerHandle;
use std::time::Duration;

/// State shared by every handler and session
pub struct AppState {
    pub controller: ControllerHandle,
    pub hub: Hub,
    pub auth: RemoteAuth,
    pub http: reqwest::Client,
    pub auth_timeout: Duration,
}

impl AppState {
    pub fn new(
        controller: ControllerHandle,
        hub: Hub,
        auth: RemoteAuth,
        http: reqwest::Client,
        auth_timeout: Duration,
    ) -> Self {
        Self {
            controller,
            hub,
            auth,
            http,
            auth_timeout,
        }
    }
}
