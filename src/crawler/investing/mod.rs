/// 各國 ETF 清單
pub mod etf;
