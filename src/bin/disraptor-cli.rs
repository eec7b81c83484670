use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "disraptor-cli")]
#[command(about = "Route management CLI for the Disraptor gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[arg(short, long, env = "DISRAPTOR_ADMIN_KEY", default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    /// Reserved administrative prefix the API is mounted under
    #[arg(long, default_value = "/admin")]
    prefix: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gateway status and table version
    Status,
    /// List all routes
    List,
    /// Show a single route
    Get { id: String },
    /// Create or replace a route
    Put {
        id: String,
        #[arg(long)]
        source_path: String,
        #[arg(long)]
        target_url: String,
        #[arg(long, default_value = "get")]
        method: String,
    },
    /// Delete a route (no-op if absent)
    Delete { id: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let base = format!("{}{}", cli.url.trim_end_matches('/'), cli.prefix);

    let request = match cli.command {
        Commands::Status => client.get(format!("{base}/status")),
        Commands::List => client.get(format!("{base}/routes")),
        Commands::Get { id } => client.get(format!("{base}/routes/{id}")),
        Commands::Put {
            id,
            source_path,
            target_url,
            method,
        } => client.put(format!("{base}/routes/{id}")).json(&json!({
            "sourcePath": source_path,
            "targetUrl": target_url,
            "requestMethod": method,
        })),
        Commands::Delete { id } => client.delete(format!("{base}/routes/{id}")),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
