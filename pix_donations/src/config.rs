use std::sync::Arc;

use anyhow::Context;
use common::{GatewayConfig, MercadoPagoGateway, StorageConfig, connect_store};

use crate::state::AppState;

pub struct AppConfig {
    pub environment: String,
    pub host: String,
    pub port: u16,
    pub storage: StorageConfig,
    pub gateway: GatewayConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let environment = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .context("PORT must be a valid port number")?;

        let storage = StorageConfig::from_env().context("Invalid storage configuration")?;

        let gateway = GatewayConfig::from_env().context("Invalid payment provider configuration")?;

        Ok(Self {
            environment,
            host,
            port,
            storage,
            gateway,
        })
    }

    /// Opens the store, brings its schema up to date and wires the gateway.
    /// Any failure here aborts startup.
    pub async fn create_app_state(&self) -> anyhow::Result<AppState> {
        let db = connect_store(&self.storage).await?;
        db.init().await.context("Failed to initialize database schema")?;

        if self.gateway.is_configured() {
            log::info!(
                "Mercado Pago configured ({} credentials)",
                if self.gateway.is_test_mode() { "test" } else { "production" }
            );
        } else {
            log::warn!("MP_ACCESS_TOKEN is not set, payments will run in demo mode");
        }
        let gateway = MercadoPagoGateway::new(&self.gateway)
            .context("Failed to build payment provider client")?;

        Ok(AppState::new(db, Arc::new(gateway), &self.environment))
    }
}
