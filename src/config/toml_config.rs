use crate::domain::hours::{parse_utc_offset, WorkingHours};
use crate::domain::pricing::{PromoRule, ServiceCatalog};
use crate::utils::error::{Result, StorefrontError};
use crate::utils::validation::{
    is_valid_email, validate_non_empty_string, validate_path, validate_range, validate_url,
    Validate,
};
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorefrontConfig {
    pub business: BusinessConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub promo: PromoRule,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    pub telegram: Option<TelegramConfig>,
    pub feed: Option<FeedConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessConfig {
    #[serde(default = "default_business_name")]
    pub name: String,
    pub owner_email: String,
    /// 顯示用名稱；實際換算使用 utc_offset
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    /// 遠端尚未設定營業時間時的初始值，只在管理員初始化時寫入
    pub default_hours: Option<WorkingHours>,
    pub payment_card: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub prices: ServiceCatalog,
    pub games: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Local,
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub r#type: BackendKind,
    pub endpoint: Option<String>,
    pub auth_token: Option<String>,
    /// 本地模式的 JSON 檔案
    #[serde(default = "default_store_path")]
    pub path: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            r#type: BackendKind::Local,
            endpoint: None,
            auth_token: None,
            path: default_store_path(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub r#type: BackendKind,
    #[serde(default = "default_storage_path")]
    pub base_path: String,
    pub public_base_url: Option<String>,
    pub endpoint: Option<String>,
    pub bucket: Option<String>,
    pub auth_token: Option<String>,
    #[serde(default = "default_upload_timeout_seconds")]
    pub upload_timeout_seconds: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            r#type: BackendKind::Local,
            base_path: default_storage_path(),
            public_base_url: None,
            endpoint: None,
            bucket: None,
            auth_token: None,
            upload_timeout_seconds: default_upload_timeout_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    #[serde(default = "default_telegram_api")]
    pub api_base: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl TelegramConfig {
    /// 環境變數未替換或為空時視為未設定
    pub fn is_configured(&self) -> bool {
        let resolved = |v: &str| !v.trim().is_empty() && !v.contains("${");
        resolved(&self.bot_token) && resolved(&self.chat_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_poll_interval_seconds")]
    pub poll_interval_seconds: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
    #[serde(default)]
    pub json: bool,
}

fn default_business_name() -> String {
    "Elbek Design".to_string()
}

fn default_timezone() -> String {
    "Asia/Tashkent".to_string()
}

fn default_utc_offset() -> String {
    "+05:00".to_string()
}

fn default_currency() -> String {
    "UZS".to_string()
}

fn default_store_path() -> String {
    "./storefront-data.json".to_string()
}

fn default_storage_path() -> String {
    "./storefront-objects".to_string()
}

fn default_timeout_seconds() -> u64 {
    15
}

fn default_upload_timeout_seconds() -> u64 {
    20
}

fn default_poll_interval_seconds() -> u64 {
    10
}

fn default_telegram_api() -> String {
    "https://api.telegram.org".to_string()
}

impl StorefrontConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(StorefrontError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| StorefrontError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${TELEGRAM_BOT_TOKEN})，未定義的保持原樣
    fn substitute_env_vars(content: &str) -> String {
        use regex::Regex;
        use std::sync::OnceLock;

        static RE: OnceLock<Regex> = OnceLock::new();
        let re = RE.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("static regex pattern"));

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .to_string()
    }

    pub fn validate_config(&self) -> Result<()> {
        if !is_valid_email(self.business.owner_email.trim()) {
            return Err(StorefrontError::InvalidConfigValueError {
                field: "business.owner_email".to_string(),
                value: self.business.owner_email.clone(),
                reason: "Owner email must be a valid address".to_string(),
            });
        }
        validate_non_empty_string("business.name", &self.business.name)?;
        validate_non_empty_string("business.currency", &self.business.currency)?;
        self.utc_offset()?;

        if let Some(hours) = &self.business.default_hours {
            hours.bounds().map_err(|e| StorefrontError::InvalidConfigValueError {
                field: "business.default_hours".to_string(),
                value: hours.to_string(),
                reason: e.to_string(),
            })?;
        }

        if self.catalog.prices.is_empty() {
            return Err(StorefrontError::InvalidConfigValueError {
                field: "catalog.prices".to_string(),
                value: String::new(),
                reason: "At least one service must be priced".to_string(),
            });
        }
        self.promo.check()?;

        match self.store.r#type {
            BackendKind::Remote => {
                let endpoint = self.store.endpoint.as_deref().ok_or_else(|| {
                    StorefrontError::MissingConfigError {
                        field: "store.endpoint".to_string(),
                    }
                })?;
                validate_url("store.endpoint", endpoint)?;
            }
            BackendKind::Local => validate_path("store.path", &self.store.path)?,
        }
        validate_range("store.timeout_seconds", self.store.timeout_seconds, 1, 300)?;

        match self.storage.r#type {
            BackendKind::Remote => {
                let endpoint = self.storage.endpoint.as_deref().ok_or_else(|| {
                    StorefrontError::MissingConfigError {
                        field: "storage.endpoint".to_string(),
                    }
                })?;
                validate_url("storage.endpoint", endpoint)?;
                let bucket = self.storage.bucket.as_deref().unwrap_or_default();
                validate_non_empty_string("storage.bucket", bucket)?;
            }
            BackendKind::Local => {
                validate_path("storage.base_path", &self.storage.base_path)?;
                if let Some(url) = &self.storage.public_base_url {
                    validate_url("storage.public_base_url", url)?;
                }
            }
        }
        validate_range(
            "storage.upload_timeout_seconds",
            self.storage.upload_timeout_seconds,
            1,
            600,
        )?;

        if let Some(telegram) = &self.telegram {
            validate_url("telegram.api_base", &telegram.api_base)?;
        }
        if let Some(feed) = &self.feed {
            validate_range("feed.poll_interval_seconds", feed.poll_interval_seconds, 1, 3600)?;
        }

        Ok(())
    }

    pub fn utc_offset(&self) -> Result<FixedOffset> {
        parse_utc_offset(&self.business.utc_offset).map_err(|e| {
            StorefrontError::InvalidConfigValueError {
                field: "business.utc_offset".to_string(),
                value: self.business.utc_offset.clone(),
                reason: e.to_string(),
            }
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(
            self.feed
                .as_ref()
                .map(|f| f.poll_interval_seconds)
                .unwrap_or_else(default_poll_interval_seconds),
        )
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.storage.upload_timeout_seconds)
    }

    pub fn games(&self) -> Option<&[String]> {
        self.catalog.games.as_deref()
    }

    pub fn json_logging(&self) -> bool {
        self.logging.as_ref().map(|l| l.json).unwrap_or(false)
    }

    pub fn log_level(&self) -> Option<&str> {
        self.logging.as_ref().and_then(|l| l.level.as_deref())
    }
}

impl Validate for StorefrontConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
