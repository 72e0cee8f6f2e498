use std::{env, path::PathBuf, str::FromStr};

use anyhow::Result;
use config::{Config as config_config, File as config_file};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::listing::ratio::MissingValue;

const CONFIG_PATH: &str = "app.json";

#[derive(Serialize, Deserialize, Default, Debug, Clone)]
pub struct App {
    #[serde(default)]
    pub http: Http,
    #[serde(default)]
    pub retry: Retry,
    #[serde(default)]
    pub listing: Listing,
    #[serde(default)]
    pub log: Log,
}

const HTTP_CONNECT_TIMEOUT_SECS: &str = "HTTP_CONNECT_TIMEOUT_SECS";
const HTTP_TIMEOUT_SECS: &str = "HTTP_TIMEOUT_SECS";
const HTTP_REQUEST_DELAY_MS: &str = "HTTP_REQUEST_DELAY_MS";

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Http {
    pub connect_timeout_secs: u64,
    pub timeout_secs: u64,
    /// 每次請求後的間隔，避免被目標網站封禁
    pub request_delay_ms: u64,
}

impl Default for Http {
    fn default() -> Self {
        Http {
            connect_timeout_secs: 8,
            timeout_secs: 30,
            request_delay_ms: 300,
        }
    }
}

const RETRY_ATTEMPTS: &str = "RETRY_ATTEMPTS";
const RETRY_BASE_DELAY_MS: &str = "RETRY_BASE_DELAY_MS";
const RETRY_MAX_DELAY_MS: &str = "RETRY_MAX_DELAY_MS";

/// 「抓到表格為止」的重試上限與退避設定
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Retry {
    pub attempts: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for Retry {
    fn default() -> Self {
        Retry {
            attempts: 5,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
        }
    }
}

const LISTING_MISSING_VALUE: &str = "LISTING_MISSING_VALUE";
const LISTING_ROUND_DIGITS: &str = "LISTING_ROUND_DIGITS";
const LISTING_NAVER_MAX_PAGES: &str = "LISTING_NAVER_MAX_PAGES";

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Listing {
    pub missing_value: MissingValue,
    pub round_digits: u32,
    pub naver_max_pages: u32,
    pub naver_page_size: u32,
}

impl Default for Listing {
    fn default() -> Self {
        Listing {
            missing_value: MissingValue::ZeroFill,
            round_digits: 3,
            naver_max_pages: 100,
            naver_page_size: 60,
        }
    }
}

const LOG_DIR: &str = "LOG_DIR";

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Log {
    pub dir: String,
    pub max_size_mb: u64,
    pub max_age_days: i64,
}

impl Default for Log {
    fn default() -> Self {
        Log {
            dir: "log".to_string(),
            max_size_mb: 10,
            max_age_days: 7,
        }
    }
}

/// 設定檔不存在或無法解析時使用預設值，這裡不能寫檔案日誌（日誌器本身依賴此設定）
pub static SETTINGS: Lazy<App> = Lazy::new(|| {
    App::get().unwrap_or_else(|why| {
        eprintln!("I can't read the config context because {:?}", why);
        App::default().override_with_env()
    })
});

impl App {
    fn get() -> Result<Self> {
        dotenv::dotenv().ok();

        let config_path = config_path();
        if config_path.exists() {
            let config: App = config_config::builder()
                .add_source(config_file::from(config_path))
                .build()?
                .try_deserialize()?;
            return Ok(config.override_with_env());
        }

        Ok(App::default().override_with_env())
    }

    /// 將來至於 env 的設定值覆蓋掉 json 上的設定值
    fn override_with_env(mut self) -> Self {
        override_parsed(HTTP_CONNECT_TIMEOUT_SECS, &mut self.http.connect_timeout_secs);
        override_parsed(HTTP_TIMEOUT_SECS, &mut self.http.timeout_secs);
        override_parsed(HTTP_REQUEST_DELAY_MS, &mut self.http.request_delay_ms);

        override_parsed(RETRY_ATTEMPTS, &mut self.retry.attempts);
        override_parsed(RETRY_BASE_DELAY_MS, &mut self.retry.base_delay_ms);
        override_parsed(RETRY_MAX_DELAY_MS, &mut self.retry.max_delay_ms);

        override_parsed(LISTING_MISSING_VALUE, &mut self.listing.missing_value);
        override_parsed(LISTING_ROUND_DIGITS, &mut self.listing.round_digits);
        override_parsed(LISTING_NAVER_MAX_PAGES, &mut self.listing.naver_max_pages);

        if let Ok(dir) = env::var(LOG_DIR) {
            if !dir.is_empty() {
                self.log.dir = dir;
            }
        }

        self
    }
}

/// 環境變數存在且可解析時才覆蓋
fn override_parsed<T: FromStr>(key: &str, target: &mut T) {
    if let Some(value) = env::var(key).ok().and_then(|v| T::from_str(v.trim()).ok()) {
        *target = value;
    }
}

/// 回傳設定檔的路徑
fn config_path() -> PathBuf {
    PathBuf::from(CONFIG_PATH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let app = App::default();
        assert_eq!(app.listing.missing_value, MissingValue::ZeroFill);
        assert_eq!(app.listing.round_digits, 3);
        assert_eq!(app.listing.naver_page_size, 60);
        assert_eq!(app.retry.attempts, 5);
        assert_eq!(app.log.dir, "log");
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let app: App =
            serde_json::from_str(r#"{"listing":{"missing_value":"propagate"}}"#).unwrap();
        assert_eq!(app.listing.missing_value, MissingValue::Propagate);
        assert_eq!(app.listing.round_digits, 3);
        assert_eq!(app.http.timeout_secs, 30);
    }

    #[test]
    fn test_override_parsed_ignores_garbage() {
        let mut digits = 3u32;
        env::set_var("LISTING_TEST_GARBAGE_DIGITS", "abc");
        override_parsed("LISTING_TEST_GARBAGE_DIGITS", &mut digits);
        assert_eq!(digits, 3);

        env::set_var("LISTING_TEST_GOOD_DIGITS", " 5 ");
        override_parsed("LISTING_TEST_GOOD_DIGITS", &mut digits);
        assert_eq!(digits, 5);
    }
}
