use crate::plan::PlanDraft;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::{info, warn};
use url::Url;

pub const DEV_ENDPOINT: &str = "ws://localhost:8000/ws";
const DEV_FRONTEND_PORT: u16 = 3000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid address '{0}': {1}")]
    Url(String, url::ParseError),
    #[error("Unsupported scheme '{0}' (expected http, https, ws or wss)")]
    Scheme(String),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ConsoleConfig {
    pub endpoint: Option<String>, // ex: "wss://grid.example.com/ws"
    pub page_url: Option<String>, // adresse de la page hôte, sert à dériver l'endpoint
    pub reconnect_delay_ms: u64,
    pub render_interval_ms: u64,
    pub plan: PlanDraft,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            page_url: None,
            reconnect_delay_ms: 2000,
            render_interval_ms: 500,
            plan: PlanDraft::default(),
        }
    }
}

impl ConsoleConfig {
    /// Endpoint explicite, sinon dérivé de la page hôte, sinon endpoint de dev
    pub fn resolve_endpoint(&self) -> Result<Url, ConfigError> {
        if let Some(endpoint) = &self.endpoint {
            let url = Url::parse(endpoint).map_err(|e| ConfigError::Url(endpoint.clone(), e))?;
            return match url.scheme() {
                "ws" | "wss" => Ok(url),
                other => Err(ConfigError::Scheme(other.to_string())),
            };
        }
        match &self.page_url {
            Some(page) => endpoint_from_page(page),
            None => Url::parse(DEV_ENDPOINT).map_err(|e| ConfigError::Url(DEV_ENDPOINT.into(), e)),
        }
    }
}

/// https → wss, http → ws, même hôte et port, chemin /ws.
/// Une page servie par le front de dev (port 3000) vise l'endpoint de dev.
pub fn endpoint_from_page(page: &str) -> Result<Url, ConfigError> {
    let page_url = Url::parse(page).map_err(|e| ConfigError::Url(page.to_string(), e))?;
    if page_url.port() == Some(DEV_FRONTEND_PORT) {
        return Url::parse(DEV_ENDPOINT).map_err(|e| ConfigError::Url(DEV_ENDPOINT.into(), e));
    }
    let scheme = match page_url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => return Err(ConfigError::Scheme(other.to_string())),
    };
    let host = page_url.host_str().unwrap_or("localhost");
    let raw = match page_url.port() {
        Some(port) => format!("{scheme}://{host}:{port}/ws"),
        None => format!("{scheme}://{host}/ws"),
    };
    Url::parse(&raw).map_err(|e| ConfigError::Url(raw, e))
}

pub async fn read_config(path: &Path) -> Result<ConsoleConfig, ConfigError> {
    let txt = fs::read_to_string(path).await?;
    if txt.trim().is_empty() {
        return Ok(ConsoleConfig::default());
    }
    Ok(serde_yaml::from_str(&txt)?)
}

pub async fn load_config() -> ConsoleConfig {
    let path = std::env::var("LOADGRID_CONSOLE_CONFIG").unwrap_or_else(|_| "console.yaml".into());
    let mut cfg = if Path::new(&path).exists() {
        read_config(Path::new(&path)).await.unwrap_or_else(|e| {
            warn!("[config] invalid {path}: {e}, using defaults");
            ConsoleConfig::default()
        })
    } else {
        info!("[config] no {path}, using defaults");
        ConsoleConfig::default()
    };
    if let Ok(endpoint) = std::env::var("LOADGRID_ENDPOINT") {
        cfg.endpoint = Some(endpoint);
    }
    cfg
}
