use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::notify::{self, Notifier};
use crate::payments::stripe::StripeClient;

/// Everything a handler needs, constructed once at startup and injected
/// through axum's state. No module-level globals.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub stripe: StripeClient,
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        let stripe = StripeClient::new(
            config.stripe_secret_key.clone(),
            config.frontend_url.clone(),
        );
        let notifier = notify::notifier_from_config(&config);
        Self {
            pool,
            config: Arc::new(config),
            stripe,
            notifier,
        }
    }
}
