use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "floortrack",
    version,
    about = "Track factory-floor barcode scan sessions from the terminal"
)]
pub struct Cli {
    /// Operator user id (overrides FLOORTRACK_USER_ID and the config file).
    #[arg(long, value_name = "USER_ID", global = true)]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print a one-shot operational status snapshot.
    Status,
    /// Run health diagnostics for setup and backend connectivity.
    Doctor,
}
