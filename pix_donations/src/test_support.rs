use std::sync::Arc;

use async_trait::async_trait;
use common::{
    DonationStore, PaymentGateway, PixPaymentRequest, ProviderError, ProviderPayment,
    SqliteDonationStore,
};
use mockall::mock;

use crate::state::AppState;

mock! {
    pub Gateway {}

    #[async_trait]
    impl PaymentGateway for Gateway {
        fn is_test_mode(&self) -> bool;

        async fn create_pix_payment(
            &self,
            request: &PixPaymentRequest,
        ) -> Result<ProviderPayment, ProviderError>;

        async fn get_payment(&self, id: &str) -> Result<ProviderPayment, ProviderError>;
    }
}

/// A gateway that is never expected to be called.
pub fn idle_gateway() -> MockGateway {
    let mut gateway = MockGateway::new();
    gateway.expect_is_test_mode().return_const(true);
    gateway
}

pub fn provider_payment(id: &str, status: &str) -> ProviderPayment {
    ProviderPayment {
        id: id.to_string(),
        status: status.to_string(),
        qr_code: format!("00020126qr{}", id),
        qr_code_base64: "iVBORw0KGgo=".to_string(),
    }
}

pub async fn memory_store() -> Arc<dyn DonationStore> {
    let store = SqliteDonationStore::in_memory().await.unwrap();
    store.init().await.unwrap();
    Arc::new(store)
}

pub async fn state_with(gateway: MockGateway) -> AppState {
    AppState::new(memory_store().await, Arc::new(gateway), "test")
}
