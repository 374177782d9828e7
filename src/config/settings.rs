// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use config::{builder::DefaultState, Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// 应用程序配置设置
///
/// 包含抓取、检索、验证、哈希去重、质量、浏览器、OCR 和存储等所有配置项
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// 网络请求配置
    pub fetcher: FetcherSettings,
    /// 检索级联配置
    pub search: SearchSettings,
    /// 相关性验证配置
    pub verification: VerificationSettings,
    /// 感知哈希去重配置
    pub hashing: HashingSettings,
    /// 图片质量配置
    pub quality: QualitySettings,
    /// 无头浏览器配置
    pub browser: BrowserSettings,
    /// OCR 配置
    pub ocr: OcrSettings,
    /// 存储配置
    pub storage: StorageSettings,
}

/// 网络请求配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherSettings {
    /// 页面请求超时时间（秒）
    pub timeout_secs: u64,
    /// 每次请求的尝试次数
    pub retries: u32,
    /// 超时或连接错误后的退避时间（毫秒）
    pub retry_backoff_ms: u64,
    /// 检测到验证码后的退避时间（毫秒）
    pub captcha_backoff_ms: u64,
    /// 403 后切换身份前的等待时间（毫秒）
    pub forbidden_backoff_ms: u64,
    /// HEAD 探测超时时间（秒）
    pub head_timeout_secs: u64,
    /// 图片下载超时时间（秒）
    pub download_timeout_secs: u64,
    /// 伪装来源页
    pub referer: String,
}

impl FetcherSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn head_timeout(&self) -> Duration {
        Duration::from_secs(self.head_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn captcha_backoff(&self) -> Duration {
        Duration::from_millis(self.captcha_backoff_ms)
    }

    pub fn forbidden_backoff(&self) -> Duration {
        Duration::from_millis(self.forbidden_backoff_ms)
    }
}

/// 检索级联配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct SearchSettings {
    /// 聚合搜索引擎根地址
    pub engine_base_url: String,
    /// 站内检索过滤条件，例如 `site:amazon.com`
    pub site_filters: Vec<String>,
    /// 零售商探测之间的礼貌等待（毫秒）
    pub politeness_delay_ms: u64,
    /// 查询之间的等待（毫秒）
    pub query_delay_ms: u64,
    /// 反爬零售商预热后的等待（毫秒）
    pub warmup_delay_ms: u64,
    /// 每个查询最多成功命中的零售商数量
    pub retailer_hit_cap: usize,
    /// 每个商品页最多提取的图片数量
    pub images_per_product: usize,
}

impl SearchSettings {
    pub fn politeness_delay(&self) -> Duration {
        Duration::from_millis(self.politeness_delay_ms)
    }

    pub fn query_delay(&self) -> Duration {
        Duration::from_millis(self.query_delay_ms)
    }

    pub fn warmup_delay(&self) -> Duration {
        Duration::from_millis(self.warmup_delay_ms)
    }
}

/// 相关性验证配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct VerificationSettings {
    /// 接受阈值 (0.0-1.0)
    pub confidence_threshold: f64,
    /// 是否启用 OCR 挽救
    pub ocr_enabled: bool,
    /// OCR 命中时的加分
    pub ocr_boost: f64,
    /// 可信零售商域名
    pub reliable_retailers: Vec<String>,
}

/// 哈希去重配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct HashingSettings {
    /// 感知哈希汉明距离阈值
    pub similarity_threshold: u32,
    /// 索引文件名（相对于下载目录）
    pub index_file: String,
}

/// 图片质量配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct QualitySettings {
    pub min_width: u32,
    pub min_height: u32,
}

/// 无头浏览器配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserSettings {
    /// 是否允许使用浏览器兜底
    pub enabled: bool,
    /// 是否无头模式
    pub headless: bool,
    /// 页面超时时间（毫秒）
    pub timeout_ms: u64,
}

/// OCR 配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct OcrSettings {
    /// tesseract 可执行文件
    pub command: String,
    /// 单张图片识别超时（秒）
    pub timeout_secs: u64,
}

/// 存储配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// 图片下载目录
    pub download_path: String,
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 依次叠加内置默认值、配置文件和 `GARMENTRS__` 前缀的环境变量
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        Self::with_defaults()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("GARMENTRS").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// 仅使用内置默认值构建配置
    pub fn defaults() -> Result<Self, ConfigError> {
        Self::with_defaults()?.build()?.try_deserialize()
    }

    /// 哈希索引文件的完整路径
    pub fn index_path(&self) -> PathBuf {
        PathBuf::from(&self.storage.download_path).join(&self.hashing.index_file)
    }

    fn with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            // Fetcher
            .set_default("fetcher.timeout_secs", 15)?
            .set_default("fetcher.retries", 2)?
            .set_default("fetcher.retry_backoff_ms", 2000)?
            .set_default("fetcher.captcha_backoff_ms", 3000)?
            .set_default("fetcher.forbidden_backoff_ms", 1000)?
            .set_default("fetcher.head_timeout_secs", 5)?
            .set_default("fetcher.download_timeout_secs", 15)?
            .set_default("fetcher.referer", "https://www.google.com/")?
            // Search cascade
            .set_default("search.engine_base_url", "https://www.google.com")?
            .set_default(
                "search.site_filters",
                vec![
                    "site:amazon.com",
                    "site:ebay.com",
                    "site:zappos.com",
                    "site:nordstrom.com",
                    "site:dsw.com",
                ],
            )?
            .set_default("search.politeness_delay_ms", 500)?
            .set_default("search.query_delay_ms", 1000)?
            .set_default("search.warmup_delay_ms", 2000)?
            .set_default("search.retailer_hit_cap", 5)?
            .set_default("search.images_per_product", 3)?
            // Verification
            .set_default("verification.confidence_threshold", 0.3)?
            .set_default("verification.ocr_enabled", true)?
            .set_default("verification.ocr_boost", 0.15)?
            .set_default(
                "verification.reliable_retailers",
                vec![
                    "zappos.com",
                    "nordstrom.com",
                    "macys.com",
                    "amazon.com",
                    "nike.com",
                    "adidas.com",
                    "dsw.com",
                    "newbalance.com",
                    "puma.com",
                    "converse.com",
                    "vans.com",
                    "walmart.com",
                    "target.com",
                    "6pm.com",
                    "stuartweitzman.com",
                    "samedelman.com",
                    "stevemadden.com",
                    "ebay.com",
                ],
            )?
            // Hashing
            .set_default("hashing.similarity_threshold", 10)?
            .set_default("hashing.index_file", "image_hashes.json")?
            // Quality
            .set_default("quality.min_width", 500)?
            .set_default("quality.min_height", 500)?
            // Browser
            .set_default("browser.enabled", true)?
            .set_default("browser.headless", true)?
            .set_default("browser.timeout_ms", 30000)?
            // OCR
            .set_default("ocr.command", "tesseract")?
            .set_default("ocr.timeout_secs", 5)?
            // Storage
            .set_default("storage.download_path", "./downloaded_images")
    }
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;
