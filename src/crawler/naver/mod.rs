/// choicestock 海外個股財務指標
pub mod choicestock;
/// 韓國 ETF 清單
pub mod etf;
/// 海外交易所個股清單
pub mod listing;
