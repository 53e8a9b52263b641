use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// HTTP client parameters shared by both sources (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Overall per-request timeout in seconds.
    pub timeout_secs: u64,
    /// User-Agent header sent with every page request.
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 15,
            timeout_secs: 30,
            user_agent: format!("harvest/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Candle (kline) endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CandleSourceConfig {
    /// Klines endpoint, e.g. `https://api.binance.com/api/v3/klines`.
    pub base_url: String,
    /// Quote asset appended to the asset id to form the market symbol.
    pub quote_asset: String,
    /// Candle interval as understood by the endpoint (`1h`, `1d`, ...).
    pub interval: String,
    /// Maximum candles per page.
    pub limit: u32,
}

impl Default for CandleSourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.binance.com/api/v3/klines".to_string(),
            quote_asset: "USDT".to_string(),
            interval: "1h".to_string(),
            limit: 1000,
        }
    }
}

/// Message stream endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageSourceConfig {
    /// Stream base, the symbol path is appended: `{base_url}/{ASSET}{suffix}.json`.
    pub base_url: String,
    /// Suffix appended to the asset id in the stream path (`.X` for crypto).
    pub symbol_suffix: String,
    /// Stream filter query parameter.
    pub filter: String,
}

impl Default for MessageSourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.stocktwits.com/api/2/streams/symbol".to_string(),
            symbol_suffix: ".X".to_string(),
            filter: "top".to_string(),
        }
    }
}

/// Global configuration loaded from `~/.config/harvest/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// Root of the dataset tree (checkpoints under `raw/tmp/`, merged files under `raw/`).
    pub data_dir: PathBuf,
    /// Asset catalog produced by the selection step.
    pub catalog_path: PathBuf,
    /// Catalog column holding the asset identifier.
    pub catalog_column: String,
    /// Maximum concurrent workers. None = available parallelism.
    #[serde(default)]
    pub max_workers: Option<usize>,
    /// Supervisor sleep between channel drains, in milliseconds.
    pub poll_interval_ms: u64,
    /// Rows shown in the live summary beyond the worker count.
    pub summary_extra_rows: usize,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub candles: CandleSourceConfig,
    #[serde(default)]
    pub messages: MessageSourceConfig,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("datasets"),
            catalog_path: PathBuf::from("datasets/raw/cryptomap.csv"),
            catalog_column: "base_asset".to_string(),
            max_workers: None,
            poll_interval_ms: 10,
            summary_extra_rows: 10,
            http: HttpConfig::default(),
            candles: CandleSourceConfig::default(),
            messages: MessageSourceConfig::default(),
        }
    }
}

impl HarvestConfig {
    /// Directory holding per-asset checkpoints for one subsystem.
    pub fn checkpoint_dir(&self, subsystem: &str) -> PathBuf {
        self.data_dir.join("raw").join("tmp").join(subsystem)
    }

    /// Path of the merged dataset for one subsystem.
    pub fn merged_path(&self, subsystem: &str) -> PathBuf {
        self.data_dir.join("raw").join(format!("{subsystem}.csv"))
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("harvest")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<HarvestConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = HarvestConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: HarvestConfig = toml::from_str(&data)?;
    Ok(cfg)
}
