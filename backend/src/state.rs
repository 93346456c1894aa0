use std::sync::Arc;

use crate::{config::Config, services::session::SessionService, utils::cookies::CookieOptions};

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionService>,
    pub config: Config,
}

impl AppState {
    pub fn new(sessions: SessionService, config: Config) -> Self {
        Self {
            sessions: Arc::new(sessions),
            config,
        }
    }

    pub fn cookie_options(&self) -> CookieOptions {
        CookieOptions {
            secure: self.config.cookie_secure,
            same_site: self.config.cookie_same_site,
        }
    }
}
