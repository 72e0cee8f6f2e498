use std::sync::Once;

pub mod datetime;
pub mod http;
pub mod json;
pub mod text;

static RUSTLS_PROVIDER: Once = Once::new();

/// 安裝 rustls 的 ring 加密實作，重複呼叫無副作用
pub fn ensure_rustls_crypto_provider() {
    RUSTLS_PROVIDER.call_once(|| {
        // 其他地方已經安裝過時會回傳 Err，可以忽略
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
