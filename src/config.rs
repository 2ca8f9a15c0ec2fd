use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "gmail-counter.toml";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Atom feed that carries the unread count
    #[serde(default = "default_feed_url")]
    pub feed_url: String,
    /// Web address opened when the button is activated
    #[serde(default = "default_mail_url")]
    pub mail_url: String,
    /// Poll interval in milliseconds while signed in
    #[serde(default = "default_fast_interval_ms")]
    pub fast_interval_ms: u64,
    /// Poll interval in milliseconds while signed out
    #[serde(default = "default_slow_interval_ms")]
    pub slow_interval_ms: u64,
    /// Badge color, `#RRGGBB`
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Session cookie sent with every feed request
    #[serde(default)]
    pub cookie: Option<String>,
}

fn default_feed_url() -> String {
    "https://mail.google.com/mail/feed/atom".to_string()
}

fn default_mail_url() -> String {
    "https://mail.google.com".to_string()
}

fn default_fast_interval_ms() -> u64 {
    5400
}

fn default_slow_interval_ms() -> u64 {
    32000
}

fn default_color() -> String {
    "#186DEE".to_string()
}

fn default_listen() -> String {
    "127.0.0.1:3000".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed_url: default_feed_url(),
            mail_url: default_mail_url(),
            fast_interval_ms: default_fast_interval_ms(),
            slow_interval_ms: default_slow_interval_ms(),
            color: default_color(),
            listen: default_listen(),
            cookie: None,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Like [`Config::load`], but a missing file yields the defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.fast_interval_ms == 0 || self.slow_interval_ms == 0 {
            anyhow::bail!("poll intervals must be greater than zero");
        }
        if !crate::host::is_valid_color(&self.color) {
            anyhow::bail!("invalid color '{}', expected #RRGGBB", self.color);
        }
        Ok(())
    }

    pub fn fast_interval(&self) -> Duration {
        Duration::from_millis(self.fast_interval_ms)
    }

    pub fn slow_interval(&self) -> Duration {
        Duration::from_millis(self.slow_interval_ms)
    }
}
