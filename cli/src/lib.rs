mod args;

pub use args::{Args, Commands, SimulatePaymentArgs};
use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use common::{
    DonationStatus, DonationStore, GatewayConfig, StorageConfig, connect_store, format_brl,
};
use std::sync::Arc;

/// Runs the CLI command parser and executes the selected command.
/// Returns `Ok(true)` if a CLI command was handled, `Ok(false)` when the
/// server should start instead, and an error when the command failed.
pub async fn run_cli() -> anyhow::Result<bool> {
    let args = Args::parse();
    match &args.command {
        Some(command) => run_command(command).await.map(|()| true),
        None => Ok(false),
    }
}

async fn run_command(command: &Commands) -> anyhow::Result<()> {
    match command {
        Commands::InitDb => {
            let engine = init_db().await.context("Failed to initialize database")?;
            println!("Database ready ({})", engine);
        }
        Commands::SimulatePayment(simulate_args) => simulate_payment(&simulate_args.payment_id)
            .await
            .context("Failed to simulate payment")?,
        Commands::Stats => print_stats().await.context("Failed to read stats")?,
        Commands::CheckConfig => check_config().context("Invalid configuration")?,
    }
    Ok(())
}

/// Opens the configured store with its schema in place.
async fn open_store() -> anyhow::Result<Arc<dyn DonationStore>> {
    let config = StorageConfig::from_env()?;
    let store = connect_store(&config).await?;
    store.init().await?;
    Ok(store)
}

async fn init_db() -> anyhow::Result<&'static str> {
    let store = open_store().await?;
    let engine = store.engine();
    store.close().await;
    Ok(engine)
}

async fn simulate_payment(payment_id: &str) -> anyhow::Result<()> {
    let store = open_store().await?;
    let result = approve(store.as_ref(), payment_id).await;
    store.close().await;
    result
}

async fn approve(store: &dyn DonationStore, payment_id: &str) -> anyhow::Result<()> {
    let Some(donation) = store.get_by_payment_id(payment_id).await? else {
        return Err(anyhow::anyhow!("No donation with payment id '{}'", payment_id));
    };
    if donation.status.is_paid() {
        println!("Payment '{}' was already paid", payment_id);
        return Ok(());
    }

    if store
        .update_status(payment_id, DonationStatus::Paid, Some(Utc::now()))
        .await?
    {
        println!(
            "Payment '{}' marked as paid ({})",
            payment_id,
            format_brl(donation.amount)
        );
    } else {
        println!("Payment '{}' was already paid", payment_id);
    }
    Ok(())
}

async fn print_stats() -> anyhow::Result<()> {
    let store = open_store().await?;
    let stats = store.get_stats().await;
    store.close().await;
    let stats = stats?;

    println!("Paid donations: {}", stats.count);
    println!("Total raised:   {}", format_brl(stats.total_amount));
    Ok(())
}

fn check_config() -> anyhow::Result<()> {
    let environment = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
    let storage = StorageConfig::from_env()?;
    let gateway = GatewayConfig::from_env()?;

    println!("APP_ENV:        {}", environment);
    match &storage {
        StorageConfig::Sqlite { path } => println!("Database:       sqlite ({})", path),
        StorageConfig::MySql { .. } => println!("Database:       mysql"),
    }
    for var in [
        "MYSQL_URL",
        "MYSQLHOST",
        "MYSQLPORT",
        "MYSQLUSER",
        "MYSQLPASSWORD",
        "MYSQLDATABASE",
    ] {
        let state = if std::env::var(var).is_ok() { "set" } else { "missing" };
        println!("  {:<14}{}", var, state);
    }
    if storage.engine() == "sqlite" && environment == "production" {
        println!(
            "Warning: production is running on SQLite; set MYSQL_URL or MYSQLHOST for MySQL"
        );
    }

    if gateway.is_configured() {
        println!(
            "Mercado Pago:   configured ({} credentials, timeout {}s)",
            if gateway.is_test_mode() { "test" } else { "production" },
            gateway.timeout.as_secs()
        );
    } else {
        println!("Mercado Pago:   not configured, payments run in demo mode");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{NewDonation, SqliteDonationStore};

    async fn store_with(payment_id: &str) -> SqliteDonationStore {
        let store = SqliteDonationStore::in_memory().await.unwrap();
        store.init().await.unwrap();
        store
            .insert(&NewDonation::new(payment_id, 10.into()))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn approve_marks_donation_paid_once() {
        let store = store_with("DEMO_1_abcdef").await;

        approve(&store, "DEMO_1_abcdef").await.unwrap();
        let first = store.get_by_payment_id("DEMO_1_abcdef").await.unwrap().unwrap();
        approve(&store, "DEMO_1_abcdef").await.unwrap();
        let second = store.get_by_payment_id("DEMO_1_abcdef").await.unwrap().unwrap();

        assert_eq!(first.status, DonationStatus::Paid);
        assert_eq!(first.paid_at, second.paid_at);
    }

    #[tokio::test]
    async fn failing_command_reports_error() {
        // SAFETY: no other test in this crate reads the environment.
        unsafe {
            std::env::remove_var("APP_ENV");
            std::env::set_var("MYSQLHOST", "localhost");
            std::env::set_var("MYSQLPORT", "not-a-port");
        }

        let err = run_command(&Commands::InitDb).await.unwrap_err();
        assert!(format!("{err:#}").starts_with("Failed to initialize database"));
        assert!(run_command(&Commands::CheckConfig).await.is_err());
    }

    #[tokio::test]
    async fn approve_unknown_payment_fails() {
        let store = store_with("1").await;
        assert!(approve(&store, "2").await.is_err());
    }
}
