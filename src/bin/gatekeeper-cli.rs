use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gatekeeper-cli")]
#[command(about = "Query a running gatekeeper daemon", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:8090")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Liveness status
    Health,
    /// Full health report with checks and dependencies
    Detailed,
    /// Security counters and rate limiter state
    Security,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let path = match cli.command {
        Commands::Health => "/health",
        Commands::Detailed => "/health/detailed",
        Commands::Security => "/security/metrics",
    };

    let res = client
        .get(format!("{}{}", cli.url.trim_end_matches('/'), path))
        .send()
        .await?;
    let healthy = print_response(res).await?;
    if !healthy {
        std::process::exit(1);
    }
    Ok(())
}

/// Pretty-print the JSON body. Returns whether the status was a success.
async fn print_response(res: reqwest::Response) -> Result<bool, Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    if !status.is_success() {
        eprintln!("Error: daemon returned status {}", status);
    }
    Ok(status.is_success())
}
