use std::{
    sync::atomic::{AtomicUsize, Ordering},
    thread,
    time::{Duration, Instant},
};

use chrono::{format::DelayedFormat, Local};
use once_cell::sync::Lazy;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};

use crate::config::SETTINGS;

pub mod rotate;

static LOGGER: Lazy<Logger> = Lazy::new(|| Logger::new("default"));

/// 已送出但尚未寫入檔案的日誌筆數
static PENDING: AtomicUsize = AtomicUsize::new(0);

/// 分級寫檔的日誌器，每個等級各自一個背景寫入線程
pub struct Logger {
    info_writer: UnboundedSender<String>,
    warn_writer: UnboundedSender<String>,
    error_writer: UnboundedSender<String>,
    debug_writer: UnboundedSender<String>,
}

impl Logger {
    pub fn new(log_name: &str) -> Self {
        Logger {
            info_writer: Self::create_writer(&format!("{}_info", log_name)),
            warn_writer: Self::create_writer(&format!("{}_warn", log_name)),
            error_writer: Self::create_writer(&format!("{}_error", log_name)),
            debug_writer: Self::create_writer(&format!("{}_debug", log_name)),
        }
    }

    pub fn info(&self, log: String) {
        self.send(log, &self.info_writer);
    }

    pub fn warn(&self, log: String) {
        self.send(log, &self.warn_writer);
    }

    pub fn error(&self, log: String) {
        self.send(log, &self.error_writer);
    }

    pub fn debug(&self, log: String) {
        self.send(log, &self.debug_writer);
    }

    fn send(&self, msg: String, writer: &UnboundedSender<String>) {
        PENDING.fetch_add(1, Ordering::SeqCst);
        if let Err(why) = writer.send(msg) {
            PENDING.fetch_sub(1, Ordering::SeqCst);
            error_console(why.to_string());
        }
    }

    fn create_writer(log_name: &str) -> UnboundedSender<String> {
        let (tx, mut rx) = unbounded_channel::<String>();
        let log = &SETTINGS.log;
        let pattern = format!("{}/%Y-%m-%d_{}.log", log.dir, log_name);
        let max_size = log.max_size_mb.saturating_mul(1024 * 1024);
        let max_age_days = log.max_age_days;

        // 寫入檔案的操作使用另一個線程處理
        thread::spawn(move || {
            let mut rotate = rotate::Rotate::with_options(pattern, max_size, max_age_days);
            let mut line = String::with_capacity(2048);
            let mut batched = 0;

            while let Some(received) = rx.blocking_recv() {
                let now = Local::now();
                line.push_str(&format!("{} {}\r\n", now.format("%F %X%.6f"), received));
                batched += 1;

                if rx.is_empty() || line.len() >= 2048 {
                    if let Err(why) = rotate.write_msg(now, line.as_bytes()) {
                        error_console(format!(
                            "Failed to write to log file. because:{:#?}\r\nmsg:{}",
                            why, line
                        ));
                    }

                    rotate.flush();
                    line.clear();
                    PENDING.fetch_sub(batched, Ordering::SeqCst);
                    batched = 0;
                }
            }
        });

        tx
    }
}

pub fn info_file_async(log: String) {
    LOGGER.info(log);
}

pub fn warn_file_async(log: String) {
    LOGGER.warn(log);
}

pub fn error_file_async(log: String) {
    LOGGER.error(log);
}

pub fn debug_file_async(log: String) {
    LOGGER.debug(log);
}

/// 等待背景線程把已送出的日誌寫入檔案，逾時回傳 `false`
pub async fn flush(timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while PENDING.load(Ordering::SeqCst) > 0 {
        if Instant::now() >= deadline {
            return false;
        }

        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    true
}

pub fn info_console(log: String) {
    println!(
        "{} Info {}",
        Local::now().format("%Y-%m-%d %H:%M:%S.%3f"),
        log
    );
}

pub fn error_console(log: String) {
    eprintln!(
        "{} Error {}",
        DelayedFormat::to_string(&Local::now().format("%Y-%m-%d %H:%M:%S.%3f")),
        log
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_flush_waits_for_writer() {
        dotenv::dotenv().ok();
        for i in 0..20 {
            error_file_async(format!("flush check {}", i));
        }

        assert!(flush(Duration::from_secs(5)).await);
    }
}
