// src/config.rs
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://textile-defect-detection.onrender.com/";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
    #[error("Could not determine a data directory; set TEXTILEGUARD_DATA_DIR")]
    NoDataDir,
}

#[derive(Clone, Debug)]
pub struct Config {
    /// Base URL of the TextileGuard backend.
    pub api_url: String,
    /// Where the credential file and upload previews live.
    pub data_dir: PathBuf,
    pub http_timeout: Duration,
    /// Longest edge of the generated upload preview, in pixels.
    pub preview_size: u32,
}

impl Config {
    /// Reads `TEXTILEGUARD_*` variables, honouring a `.env` file in the
    /// working directory.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let api_url = std::env::var("TEXTILEGUARD_API_URL")
            .unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        if !api_url.starts_with("http://") && !api_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "TEXTILEGUARD_API_URL".to_string(),
                format!("'{}' is not an http(s) URL", api_url),
            ));
        }

        let data_dir = match std::env::var("TEXTILEGUARD_DATA_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => dirs::data_dir()
                .ok_or(ConfigError::NoDataDir)?
                .join("textileguard"),
        };

        let http_timeout = Duration::from_secs(parse_var("TEXTILEGUARD_HTTP_TIMEOUT_SECS", 120)?);
        let preview_size = parse_var("TEXTILEGUARD_PREVIEW_SIZE", 256)?;

        Ok(Self {
            api_url,
            data_dir,
            http_timeout,
            preview_size,
        })
    }

    /// Configuration rooted at `data_dir`, pointing at `api_url`.
    pub fn new(api_url: impl Into<String>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            api_url: api_url.into(),
            data_dir: data_dir.into(),
            http_timeout: Duration::from_secs(120),
            preview_size: 256,
        }
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.data_dir.join("credentials.json")
    }

    pub fn preview_dir(&self) -> PathBuf {
        self.data_dir.join("previews")
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}
