use std::sync::Arc;

use database::TriviaStore;
use types::ScoringRules;

use crate::auth::AuthService;
use crate::config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TriviaStore>,
    pub auth: AuthService,
    pub scoring: ScoringRules,
    pub time_limit_ms: u64,
}

impl AppState {
    pub fn new(store: Arc<dyn TriviaStore>, config: &ServerConfig) -> Self {
        Self {
            store,
            auth: AuthService::new(&config.jwt_secret, config.token_ttl_secs, config.cookie_secure),
            scoring: config.scoring,
            time_limit_ms: config.time_limit_ms,
        }
    }
}
