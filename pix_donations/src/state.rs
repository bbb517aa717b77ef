use std::sync::Arc;

use common::{DonationStore, PaymentGateway};

/// Shared by every request handler. Holds no mutable state of its own; all
/// coordination goes through the store.
pub struct AppState {
    pub db: Arc<dyn DonationStore>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub environment: String,
}

impl AppState {
    pub fn new(
        db: Arc<dyn DonationStore>,
        gateway: Arc<dyn PaymentGateway>,
        environment: &str,
    ) -> Self {
        AppState {
            db,
            gateway,
            environment: environment.to_string(),
        }
    }
}
