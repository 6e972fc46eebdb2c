//! CLI parser
use clap::Parser;
use std::num::NonZeroU16;

#[derive(Parser, Debug)]
/// CLI Options
pub struct CliOptions {
    #[clap(long, help = "Enable debug logging", env = "SOPHIA_DEBUG")]
    /// Enable debug logging. Env: SOPHIA_DEBUG
    pub debug: bool,
    #[clap(long, short, default_value = "8000", env = "SOPHIA_PORT")]
    /// http listener, defaults to `8000`.
    /// Env: SOPHIA_PORT
    pub port: NonZeroU16,
    #[clap(
        long,
        short,
        default_value = "127.0.0.1",
        env = "SOPHIA_LISTEN_ADDRESS"
    )]
    /// Listen address, defaults to `127.0.0.1`.
    /// Env: SOPHIA_LISTEN_ADDRESS
    pub listen_address: String,

    #[clap(long, short, env = "SOPHIA_DATABASE_PATH")]
    /// Path to the database file, eg `/data/sophia.sqlite`.
    /// Env: SOPHIA_DATABASE_PATH
    pub database_path: Option<String>,
}
