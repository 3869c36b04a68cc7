use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding `api.base_url`.
pub const API_URL_ENV: &str = "CIVICLINK_API_URL";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub paging: PagingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Where the session blob lives. Defaults to the platform data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagingConfig {
    #[serde(default = "default_dispatcher_page_size")]
    pub dispatcher_page_size: u32,
    #[serde(default = "default_admin_users_page_size")]
    pub admin_users_page_size: u32,
    #[serde(default = "default_admin_overview_page_size")]
    pub admin_overview_page_size: u32,
}

fn default_dispatcher_page_size() -> u32 {
    20
}

fn default_admin_users_page_size() -> u32 {
    50
}

fn default_admin_overview_page_size() -> u32 {
    200
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            dispatcher_page_size: default_dispatcher_page_size(),
            admin_users_page_size: default_admin_users_page_size(),
            admin_overview_page_size: default_admin_overview_page_size(),
        }
    }
}

fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", "civiclink").context("Could not determine config directory")
}

pub fn config_dir() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().to_path_buf())
}

pub fn default_config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Path of the persisted session file.
pub fn session_storage_path(config: &Config) -> Result<PathBuf> {
    match &config.session.storage_path {
        Some(path) => Ok(path.clone()),
        None => Ok(project_dirs()?.data_dir().join("session.json")),
    }
}

/// Load configuration.
///
/// An explicit `path` must exist. Without one, the default location is used
/// if present and built-in defaults otherwise. `CIVICLINK_API_URL` wins over
/// the file either way.
pub fn load(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(p) => {
            if !p.exists() {
                anyhow::bail!("Config file not found at {}.", p.display());
            }
            load_from_path(p)?
        }
        None => {
            let default_path = default_config_path()?;
            if default_path.exists() {
                load_from_path(&default_path)?
            } else {
                tracing::debug!(
                    "No config at {}, using defaults. Run `civiclink --init` to create one.",
                    default_path.display()
                );
                Config::default()
            }
        }
    };

    if let Ok(url) = std::env::var(API_URL_ENV) {
        apply_api_url_override(&mut config, &url);
    }

    Ok(config)
}

fn apply_api_url_override(config: &mut Config, url: &str) {
    let url = url.trim();
    if !url.is_empty() {
        config.api.base_url = url.to_string();
    }
}

pub fn load_from_path(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config from {}", path.display()))?;

    Ok(config)
}

pub async fn init_wizard() -> Result<()> {
    use std::io::{self, Write};

    println!("CivicLink Configuration Wizard");
    println!("==============================\n");

    let config_path = default_config_path()?;
    if config_path.exists() {
        print!("Config already exists at {}. Overwrite? [y/N] ", config_path.display());
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
    }

    print!("API base URL [{}]: ", default_base_url());
    io::stdout().flush()?;
    let mut base_url = String::new();
    io::stdin().read_line(&mut base_url)?;

    let mut config = Config::default();
    if !base_url.trim().is_empty() {
        config.api.base_url = base_url.trim().to_string();
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = toml::to_string_pretty(&config)?;
    std::fs::write(&config_path, content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&config_path, std::fs::Permissions::from_mode(0o600))?;
    }

    println!("\nConfig saved to {}", config_path.display());
    println!("Run `civiclink login --email <email>` to sign in.");

    Ok(())
}
