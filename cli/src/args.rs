use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "PIX donations backend - runs the server, or a maintenance command when one is given"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create or upgrade the donations table in the configured database
    InitDb,

    /// Mark a recorded donation as paid (for testing only)
    ///
    /// Applies the same one-way pending to paid transition as a provider
    /// approval. Donations that are already paid are left untouched.
    SimulatePayment(SimulatePaymentArgs),

    /// Print the total and number of paid donations
    Stats,

    /// Show which database and payment provider settings are in effect
    ///
    /// Secrets are never printed, only whether they are set.
    CheckConfig,
}

#[derive(ClapArgs, Debug)]
pub struct SimulatePaymentArgs {
    /// Payment id as returned by /create-pix-payment
    #[arg(help = "Payment id to approve")]
    pub payment_id: String,
}
