//! Stonebench CLI entry point.

use clap::Parser;
use colored::Colorize;
use stonebench_cli::Cli;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let code = match stonebench_cli::run(cli).await {
        Ok(status) => status.code(),
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            1
        }
    };
    std::process::exit(code);
}
