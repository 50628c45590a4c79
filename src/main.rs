use clap::Parser;

use assetdesk::cli::{self, Args};
use assetdesk::config::Config;

#[tokio::main]
async fn main() {
    // .env values behave like exported variables; a missing file is fine
    let _ = dotenvy::dotenv();

    env_logger::init();

    let args = Args::parse();
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(2);
        }
    };

    if let Err(e) = cli::run(args, config).await {
        log::debug!("Command failed: {:?}", e);
        eprintln!("error: {}", e);
        if e.requires_login() {
            eprintln!("Run `assetdesk login <username>` to sign in again.");
        }
        std::process::exit(1);
    }
}
