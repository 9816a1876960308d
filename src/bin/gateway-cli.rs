use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Command-line client for the release gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:44133")]
    url: String,

    /// Bearer token; falls back to $GATEWAY_TOKEN.
    #[arg(short, long, env = "GATEWAY_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gateway status
    Status,
    /// List releases
    List {
        #[arg(long)]
        limit: Option<i64>,
        #[arg(long)]
        namespace: Option<String>,
    },
    /// Show a release
    Get {
        name: String,
        #[arg(long)]
        revision: Option<i32>,
    },
    /// Show the revision history of a release
    History {
        name: String,
        #[arg(long)]
        max: Option<i32>,
    },
    /// Uninstall a release
    Uninstall {
        name: String,
        #[arg(long)]
        purge: bool,
    },
    /// Roll a release back to a revision
    Rollback { name: String, revision: i32 },
}

/// Release names are percent-encoded so any name survives as one path segment.
fn release_path(name: &str) -> String {
    format!("/v1/releases/{}", urlencoding::encode(name))
}

impl Commands {
    fn request(&self) -> (Method, String, Vec<(&'static str, String)>) {
        match self {
            Commands::Status => (Method::GET, "/".to_string(), Vec::new()),
            Commands::List { limit, namespace } => {
                let mut query = Vec::new();
                if let Some(limit) = limit {
                    query.push(("limit", limit.to_string()));
                }
                if let Some(ns) = namespace {
                    query.push(("namespace", ns.clone()));
                }
                (Method::GET, "/v1/releases".to_string(), query)
            }
            Commands::Get { name, revision } => {
                let query = revision
                    .map(|r| vec![("revision", r.to_string())])
                    .unwrap_or_default();
                (Method::GET, release_path(name), query)
            }
            Commands::History { name, max } => {
                let query = max.map(|m| vec![("max", m.to_string())]).unwrap_or_default();
                (Method::GET, format!("{}/history", release_path(name)), query)
            }
            Commands::Uninstall { name, purge } => {
                let query = if *purge {
                    vec![("purge", "true".to_string())]
                } else {
                    Vec::new()
                };
                (Method::DELETE, release_path(name), query)
            }
            Commands::Rollback { name, revision } => (
                Method::POST,
                format!("{}/history/{}", release_path(name), revision),
                Vec::new(),
            ),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if let Some(token) = &cli.token {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", token))?);
    }

    let (method, path, query) = cli.command.request();
    let res = client
        .request(method, format!("{}{}", cli.url.trim_end_matches('/'), path))
        .headers(headers)
        .query(&query)
        .send()
        .await?;

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_names_are_encoded() {
        let get = Commands::Get {
            name: "my app/v2".into(),
            revision: Some(3),
        };
        let (method, path, query) = get.request();
        assert_eq!(method, Method::GET);
        assert_eq!(path, "/v1/releases/my%20app%2Fv2");
        assert_eq!(query, vec![("revision", "3".to_string())]);

        let rollback = Commands::Rollback {
            name: "web".into(),
            revision: 2,
        };
        assert_eq!(rollback.request().1, "/v1/releases/web/history/2");
    }
}
