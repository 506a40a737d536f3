use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "sidecar-cli")]
#[command(about = "Management CLI for sidecar access logs", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, env = "SIDECAR_ADMIN_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check sidecar status
    Status,
    /// List access logs and their state
    AccessLogs,
    /// Enable the access log writing to OUTPUT
    Enable { output: String },
    /// Disable the access log writing to OUTPUT
    Disable { output: String },
    /// Disable every access log, including ones created later
    DisableAll,
    /// List registered variables and prefixes
    Variables,
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

    let request = match cli.command {
        Commands::Status => client.get(format!("{}/admin/status", cli.url)),
        Commands::AccessLogs => client.get(format!("{}/admin/accesslogs", cli.url)),
        Commands::Enable { output } => toggle(&client, &cli.url, output, false),
        Commands::Disable { output } => toggle(&client, &cli.url, output, true),
        Commands::DisableAll => client.post(format!("{}/admin/accesslogs/disable_all", cli.url)),
        Commands::Variables => client.get(format!("{}/admin/variables", cli.url)),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

fn toggle(
    client: &reqwest::Client,
    url: &str,
    output: String,
    disabled: bool,
) -> reqwest::RequestBuilder {
    client
        .post(format!("{}/admin/accesslogs/toggle", url))
        .json(&serde_json::json!({ "output": output, "disabled": disabled }))
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
