use std::sync::Arc;

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

use dashboard_sharing::client::{
    boot_payload_from_env, HttpTransport, SharingSettingsCache,
    INVARIANT_SHARING_SETTINGS_NOT_CHANGED,
};
use dashboard_sharing::SharingError;

#[derive(Parser)]
#[command(name = "sharing-cli")]
#[command(about = "Inspect and edit dashboard sharing settings", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Admin API key, sent as a bearer token
    #[arg(short, long)]
    key: Option<String>,

    /// User ID recorded as the new owner of modules you change
    #[arg(long)]
    user_id: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the sharing settings of every module
    Show,
    /// List the roles modules can be shared with
    ///
    /// Read from SITEKIT_DASHBOARD_SHARING_DATA when set.
    Roles,
    /// Set who may manage a module's sharing (owner or all_admins)
    SetManagement { slug: String, management: String },
    /// Replace the roles a module is shared with
    SetRoles { slug: String, roles: Vec<String> },
    /// Deactivate a module and drop its sharing settings
    Deactivate { slug: String },
    /// Check server status
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut transport = HttpTransport::new(&cli.url);
    if let Some(key) = &cli.key {
        transport = transport.with_api_key(key.clone());
    }
    if let Some(user_id) = cli.user_id {
        transport = transport.with_user_id(user_id);
    }
    let cache =
        SharingSettingsCache::new(Arc::new(transport)).with_boot_payload(boot_payload_from_env()?);

    match cli.command {
        Commands::Show => {
            let payload = cache.fetch_sharing_settings().await?;
            println!("{}", serde_json::to_string_pretty(&payload.settings)?);
        }
        Commands::Roles => {
            let roles = cache.resolve_shareable_roles().await?.unwrap_or_default();
            for (id, role) in &roles {
                println!("{:<16} {}", id, role.display_name);
            }
        }
        Commands::SetManagement { slug, management } => {
            cache.fetch_sharing_settings().await?;
            cache.set_sharing_management(&slug, &management)?;
            save(&cache).await?;
        }
        Commands::SetRoles { slug, roles } => {
            cache.fetch_sharing_settings().await?;
            cache.set_shared_roles(&slug, roles)?;
            save(&cache).await?;
        }
        Commands::Deactivate { slug } => {
            let url = format!("{}/admin/modules/{}/deactivate", cli.url, slug);
            let res = reqwest::Client::new()
                .post(url)
                .headers(auth_headers(cli.key.as_deref())?)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Status => {
            let res = reqwest::Client::new()
                .get(format!("{}/admin/status", cli.url))
                .headers(auth_headers(cli.key.as_deref())?)
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn save(cache: &SharingSettingsCache) -> Result<(), Box<dyn std::error::Error>> {
    match cache.save_sharing_settings().await {
        Ok(response) => {
            println!("{}", serde_json::to_string_pretty(&response.settings)?);
            for (slug, owner_id) in &response.new_owner_ids {
                println!("{} is now owned by user {}", slug, owner_id);
            }
            Ok(())
        }
        Err(SharingError::Precondition(msg)) if msg == INVARIANT_SHARING_SETTINGS_NOT_CHANGED => {
            println!("No changes to save.");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn auth_headers(key: Option<&str>) -> Result<HeaderMap, Box<dyn std::error::Error>> {
    let mut headers = HeaderMap::new();
    if let Some(key) = key {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", key))?);
    }
    Ok(headers)
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: server returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
