use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "reqbin-cli")]
#[command(about = "Inspect a running request bin", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List captured requests, newest first
    List {
        #[arg(short, long)]
        limit: Option<usize>,
        #[arg(short, long)]
        offset: Option<usize>,
    },
    /// Show one captured request
    Get { id: String },
    /// Delete every captured request
    Clear,
    /// Follow the live event stream
    Tail,
    /// Server health and counters
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::List { limit, offset } => {
            let mut query = Vec::new();
            if let Some(limit) = limit {
                query.push(("limit", limit));
            }
            if let Some(offset) = offset {
                query.push(("offset", offset));
            }
            let res = client
                .get(format!("{}/api/requests", base))
                .query(&query)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Get { id } => {
            let res = client.get(format!("{}/api/requests/{}", base, id)).send().await?;
            print_response(res).await?;
        }
        Commands::Clear => {
            let res = client.delete(format!("{}/api/requests", base)).send().await?;
            if res.status().is_success() {
                println!("History cleared");
            } else {
                print_response(res).await?;
            }
        }
        Commands::Tail => {
            let res = client.get(format!("{}/api/events", base)).send().await?;
            tail(res).await?;
        }
        Commands::Health => {
            let res = client.get(format!("{}/health", base)).send().await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

/// Print each `data:` event as it arrives until the server ends the stream.
async fn tail(mut res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    if !res.status().is_success() {
        return print_response(res).await;
    }

    let mut buffer = String::new();
    while let Some(chunk) = res.chunk().await? {
        buffer.push_str(&String::from_utf8_lossy(&chunk));
        while let Some(end) = buffer.find("\n\n") {
            let block: String = buffer.drain(..end + 2).collect();
            for line in block.lines() {
                if let Some(data) = line.strip_prefix("data:") {
                    let data = data.trim_start();
                    match serde_json::from_str::<Value>(data) {
                        Ok(event) => println!("{}", serde_json::to_string(&event)?),
                        Err(_) => println!("{}", data),
                    }
                }
            }
        }
    }
    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: request bin returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
