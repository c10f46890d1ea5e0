use std::fmt;
use std::str::FromStr;

use url::Url;

// ── Defaults ─────────────────────────────────────────────────────────────────

const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4";
const DEFAULT_GIPHY_API_BASE: &str = "https://api.giphy.com/v1";
const DEFAULT_GIPHY_LIMIT: u32 = 10;
const DEFAULT_GIPHY_RATING: &str = "pg-13";
const DEFAULT_PORT: u16 = 8000;

const MAX_GIPHY_LIMIT: u32 = 50;
const GIPHY_RATINGS: &[&str] = &["g", "pg", "pg-13", "r"];

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is required but not set")]
    Missing(&'static str),
    #[error("{key} has an invalid value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

// ── Caption mode ─────────────────────────────────────────────────────────────

/// How the caption and search query are obtained from the chat model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptionMode {
    /// One call returning `{topText, bottomText, searchQuery}` as JSON.
    Structured,
    /// One call for the caption, a second one for the search query.
    TwoStep,
}

impl FromStr for CaptionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "structured" => Ok(CaptionMode::Structured),
            "two-step" | "two_step" | "twostep" => Ok(CaptionMode::TwoStep),
            other => Err(format!("unknown caption mode `{}`", other)),
        }
    }
}

// ── Config ───────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Config {
    pub openai_api_key: String,
    pub openai_api_base: Url,
    pub openai_model: String,
    pub giphy_api_key: String,
    pub giphy_api_base: Url,
    pub giphy_limit: u32,
    pub giphy_rating: String,
    pub caption_mode: CaptionMode,
    pub port: u16,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("openai_api_key", &"<redacted>")
            .field("openai_api_base", &self.openai_api_base.as_str())
            .field("openai_model", &self.openai_model)
            .field("giphy_api_key", &"<redacted>")
            .field("giphy_api_base", &self.giphy_api_base.as_str())
            .field("giphy_limit", &self.giphy_limit)
            .field("giphy_rating", &self.giphy_rating)
            .field("caption_mode", &self.caption_mode)
            .field("port", &self.port)
            .finish()
    }
}

impl Config {
    /// Reads the process environment. A local `.env` file is only consulted
    /// when one of the API keys is absent.
    pub fn from_env() -> Result<Self, ConfigError> {
        let has_key = |key: &str| std::env::var(key).map(|v| !v.is_empty()).unwrap_or(false);
        if !has_key("OPENAI_API_KEY") || !has_key("GIPHY_API_KEY") {
            match dotenvy::dotenv() {
                Ok(path) => tracing::debug!(path = %path.display(), "loaded .env file"),
                Err(e) => tracing::debug!(error = %e, "no .env file loaded"),
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let openai_api_key = get("OPENAI_API_KEY").ok_or(ConfigError::Missing("OPENAI_API_KEY"))?;
        let giphy_api_key = get("GIPHY_API_KEY").ok_or(ConfigError::Missing("GIPHY_API_KEY"))?;

        let openai_api_base = parse_base_url(
            "OPENAI_API_BASE",
            get("OPENAI_API_BASE").as_deref().unwrap_or(DEFAULT_OPENAI_API_BASE),
        )?;
        let giphy_api_base = parse_base_url(
            "GIPHY_API_BASE",
            get("GIPHY_API_BASE").as_deref().unwrap_or(DEFAULT_GIPHY_API_BASE),
        )?;

        let openai_model = get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string());

        let giphy_limit = match get("GIPHY_LIMIT") {
            Some(raw) => {
                let limit: u32 = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                    key: "GIPHY_LIMIT",
                    value: raw.clone(),
                    reason: "not a positive integer".to_string(),
                })?;
                if limit == 0 || limit > MAX_GIPHY_LIMIT {
                    return Err(ConfigError::Invalid {
                        key: "GIPHY_LIMIT",
                        value: raw,
                        reason: format!("must be between 1 and {}", MAX_GIPHY_LIMIT),
                    });
                }
                limit
            }
            None => DEFAULT_GIPHY_LIMIT,
        };

        let giphy_rating = match get("GIPHY_RATING") {
            Some(raw) => {
                let rating = raw.trim().to_ascii_lowercase();
                if !GIPHY_RATINGS.contains(&rating.as_str()) {
                    return Err(ConfigError::Invalid {
                        key: "GIPHY_RATING",
                        value: raw,
                        reason: format!("expected one of {}", GIPHY_RATINGS.join(", ")),
                    });
                }
                rating
            }
            None => DEFAULT_GIPHY_RATING.to_string(),
        };

        let caption_mode = match get("MEME_CAPTION_MODE") {
            Some(raw) => raw.parse::<CaptionMode>().map_err(|reason| ConfigError::Invalid {
                key: "MEME_CAPTION_MODE",
                value: raw.clone(),
                reason,
            })?,
            None => CaptionMode::Structured,
        };

        let port = match get("PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::Invalid {
                key: "PORT",
                value: raw.clone(),
                reason: "not a valid port number".to_string(),
            })?,
            None => DEFAULT_PORT,
        };

        Ok(Config {
            openai_api_key,
            openai_api_base,
            openai_model,
            giphy_api_key,
            giphy_api_base,
            giphy_limit,
            giphy_rating,
            caption_mode,
            port,
        })
    }
}

fn parse_base_url(key: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: &str| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        reason: reason.to_string(),
    };
    let url = Url::parse(raw.trim()).map_err(|_| invalid("not a valid URL"))?;
    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(invalid("only http and https URLs are allowed"));
    }
    Ok(url)
}

#[cfg(test)]
impl Config {
    /// Points both upstreams at local mock servers (their `/v1` prefix included).
    pub fn for_tests(openai_server: &str, giphy_server: &str, caption_mode: CaptionMode) -> Config {
        Config {
            openai_api_key: "sk-test".to_string(),
            openai_api_base: Url::parse(&format!("{}/v1", openai_server)).unwrap(),
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            giphy_api_key: "gk-test".to_string(),
            giphy_api_base: Url::parse(&format!("{}/v1", giphy_server)).unwrap(),
            giphy_limit: DEFAULT_GIPHY_LIMIT,
            giphy_rating: DEFAULT_GIPHY_RATING.to_string(),
            caption_mode,
            port: 0,
        }
    }
}

/// Joins an endpoint path onto a configured base URL, keeping any path the
/// base already carries (`https://host/v1` + `chat/completions`).
pub fn endpoint(base: &Url, path: &str) -> String {
    format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
