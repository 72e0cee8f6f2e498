//! 金融商品清單爬蟲
//!
//! 從韓國交易所 (KRX、KIND)、WiseReport、Naver 證券、choicestock 與英為財情抓取股票及 ETF
//! 清單，正規化成固定欄位的表格，並可附加成長率、GP/A、PSR、PFCR 等衍生指標。

pub mod config;
pub mod crawler;
pub mod declare;
pub mod error;
pub mod listing;
pub mod logging;
pub mod util;

pub use crawler::{etf_listing, stock_listing};
pub use listing::{Table, Value};
