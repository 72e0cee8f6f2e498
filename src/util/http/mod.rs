use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use once_cell::sync::{Lazy, OnceCell};
use reqwest::{
    header::{self, HeaderMap, HeaderName, HeaderValue},
    Client, Method, RequestBuilder, Response, StatusCode,
};

use crate::{config::SETTINGS, error::ListingError, logging::Logger, util};

pub mod element;
pub mod user_agent;

/// A singleton instance of the reqwest client.
static CLIENT: OnceCell<Client> = OnceCell::new();

static LOGGER: Lazy<Logger> = Lazy::new(|| Logger::new("http"));

/// HTTP 請求失敗時的最大重試次數，只針對連線層的錯誤
const MAX_RETRIES: usize = 3;

/// Forces the body of a `reqwest::Response` to be decoded as EUC-KR.
///
/// KIND serves its downloadable lists as `application/vnd.ms-excel` without a
/// charset, so `Response::text` would guess wrong.
#[async_trait]
pub trait TextForceEucKr {
    async fn text_force_euc_kr(self) -> Result<String>;
}

#[async_trait]
impl TextForceEucKr for Response {
    async fn text_force_euc_kr(self) -> Result<String> {
        Ok(util::text::euc_kr_to_utf8(self.bytes().await?.as_ref()))
    }
}

/// Returns the reqwest client singleton instance or creates one if it doesn't exist.
fn get_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        util::ensure_rustls_crypto_provider();

        Client::builder()
            // ===== 壓縮 =====
            .brotli(true)
            .gzip(true)
            .zstd(true)
            // ===== 超時設置 =====
            .connect_timeout(Duration::from_secs(SETTINGS.http.connect_timeout_secs))
            .timeout(Duration::from_secs(SETTINGS.http.timeout_secs))
            // ===== TCP =====
            .tcp_nodelay(true)
            .tcp_keepalive(Duration::from_secs(60))
            // ===== 連接池 =====
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90))
            // ===== Cookie 和重定向 =====
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            // ===== Headers =====
            .referer(true)
            .user_agent(user_agent::gen_random_ua())
            .build()
            .map_err(|e| anyhow!("Failed to create reqwest client: {:?}", e))
    })
}

/// 由 (名稱, 值) 組出 HeaderMap
pub fn header_map(pairs: &[(&str, &str)]) -> Result<HeaderMap> {
    let mut headers = HeaderMap::with_capacity(pairs.len());
    for (name, value) in pairs {
        headers.insert(
            HeaderName::from_bytes(name.as_bytes())
                .map_err(|why| anyhow!("Invalid header name '{}': {:?}", name, why))?,
            HeaderValue::from_str(value)
                .map_err(|why| anyhow!("Invalid header value '{}': {:?}", value, why))?,
        );
    }

    Ok(headers)
}

pub async fn get_response(url: &str, headers: Option<HeaderMap>) -> Result<Response> {
    send(Method::GET, url, headers, None::<fn(_) -> _>).await
}

/// Performs an HTTP GET request and returns the response as text.
pub async fn get(url: &str, headers: Option<HeaderMap>) -> Result<String> {
    get_response(url, headers)
        .await?
        .text()
        .await
        .map_err(|e| anyhow!("Error parsing response text: {:?}", e))
}

/// GET 並解析 JSON，無法解析時回傳帶有 HTTP 狀態的 `ListingError::Upstream`
pub async fn get_json_with_status(
    url: &str,
    headers: Option<HeaderMap>,
) -> Result<serde_json::Value> {
    let response = get_response(url, headers).await?;
    read_json(url, response).await
}

/// Performs an HTTP GET request and returns the body decoded as EUC-KR.
pub async fn get_use_euc_kr(url: &str, headers: Option<HeaderMap>) -> Result<String> {
    get_response(url, headers)
        .await?
        .text_force_euc_kr()
        .await
        .map_err(|e| anyhow!("Error parsing response text use EUC-KR: {:?}", e))
}

async fn post_form_response(
    url: &str,
    headers: Option<HeaderMap>,
    params: &[(&str, &str)],
) -> Result<Response> {
    send(
        Method::POST,
        url,
        headers,
        Some(|rb: RequestBuilder| rb.form(params)),
    )
    .await
}

/// POST 表單並解析 JSON，無法解析時回傳帶有 HTTP 狀態的 `ListingError::Upstream`
pub async fn post_form_json(
    url: &str,
    headers: Option<HeaderMap>,
    params: &[(&str, &str)],
) -> Result<serde_json::Value> {
    let response = post_form_response(url, headers, params).await?;
    read_json(url, response).await
}

async fn read_json(url: &str, response: Response) -> Result<serde_json::Value> {
    let status = response.status();
    let body = response
        .bytes()
        .await
        .map_err(|e| anyhow!("Error reading response body: {}", e))?;

    Ok(decode_json(url, status, &body)?)
}

/// 上游偶爾回傳 HTML 錯誤頁而非 JSON，此時保留狀態碼與原因給呼叫端
pub(crate) fn decode_json(
    url: &str,
    status: StatusCode,
    body: &[u8],
) -> Result<serde_json::Value, ListingError> {
    serde_json::from_slice(body).map_err(|_| ListingError::Upstream {
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or_default().to_string(),
        url: url.to_string(),
    })
}

/// Sends an HTTP request with retries on transport failure.
///
/// Every attempt is followed by the configured politeness delay so that
/// consecutive page fetches never hit the same site back to back.
async fn send(
    method: Method,
    url: &str,
    headers: Option<header::HeaderMap>,
    body: Option<impl FnOnce(RequestBuilder) -> RequestBuilder>,
) -> Result<Response> {
    let visit_log = format!("{method}:{url}");
    let client = get_client()?;
    let mut rb = client.request(method, url);
    let mut last_error = String::new();

    if let Some(h) = headers {
        rb = rb.headers(h);
    }

    if let Some(body_fn) = body {
        rb = body_fn(rb);
    }

    for attempt in 1..=MAX_RETRIES {
        let msg = format!("Attempt {} to send {}", attempt, visit_log);
        let rb_clone = rb
            .try_clone()
            .ok_or_else(|| anyhow!("Failed to clone RequestBuilder"))?;
        let start = Instant::now();
        let res = rb_clone.send().await;
        let elapsed = start.elapsed().as_millis();

        tokio::time::sleep(Duration::from_millis(SETTINGS.http.request_delay_ms)).await;

        match res {
            Ok(response) => {
                LOGGER.info(format!("{} {} {} ms", msg, response.status(), elapsed));
                return Ok(response);
            }
            Err(why) => {
                last_error = format!("{:?}", why);
                LOGGER.error(format!("{} failed because {:?}. {} ms", msg, why, elapsed));
                if attempt < MAX_RETRIES {
                    tokio::time::sleep(Duration::from_secs(2u64.pow(attempt as u32))).await;
                }
            }
        }
    }

    Err(anyhow!(
        "Failed to send request to {} after {} attempts; last error: {}",
        url,
        MAX_RETRIES,
        last_error
    ))
}
