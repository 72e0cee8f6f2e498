use std::{fmt, str::FromStr};

use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use crate::error::ListingError;

/// 以不分大小寫的方式解析選擇器，失敗時列出所有支援的值
fn parse_enum<T>(kind: &'static str, value: &str) -> Result<T, ListingError>
where
    T: FromStr + IntoEnumIterator + fmt::Display,
{
    T::from_str(value.trim()).map_err(|_| ListingError::unsupported(kind, value, T::iter()))
}

/// 韓國交易所市場別
#[derive(Debug, Copy, Clone, PartialEq, Eq, Display, EnumString, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum KrxMarket {
    /// 全部市場
    #[strum(serialize = "KRX")]
    Krx,
    /// 유가증권시장
    #[strum(serialize = "KOSPI")]
    Kospi,
    /// 코스닥
    #[strum(serialize = "KOSDAQ")]
    Kosdaq,
    /// 코넥스
    #[strum(serialize = "KONEX")]
    Konex,
}

impl KrxMarket {
    pub fn parse(value: &str) -> Result<Self, ListingError> {
        parse_enum("market", value)
    }

    /// `Market` 欄位要保留的值，`KRX` 不過濾
    pub fn filter(&self) -> Option<&'static str> {
        match self {
            KrxMarket::Krx => None,
            KrxMarket::Kospi => Some("KOSPI"),
            KrxMarket::Kosdaq => Some("KOSDAQ"),
            KrxMarket::Konex => Some("KONEX"),
        }
    }
}

/// api.stock.naver.com 支援的海外交易所
#[derive(Debug, Copy, Clone, PartialEq, Eq, Display, EnumString, EnumIter)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum NaverExchange {
    Nyse,
    Nasdaq,
    Amex,
    /// 上海
    Sse,
    /// 深圳
    Szse,
    /// 香港
    Hkex,
    /// 東京
    Tse,
    /// 胡志明市
    Hose,
}

impl NaverExchange {
    pub fn parse(value: &str) -> Result<Self, ListingError> {
        parse_enum("exchange", value)
    }

    /// API 路徑中使用的交易所名稱
    pub fn api_name(&self) -> &'static str {
        match self {
            NaverExchange::Nyse => "NYSE",
            NaverExchange::Nasdaq => "NASDAQ",
            NaverExchange::Amex => "AMEX",
            NaverExchange::Sse => "SHANGHAI",
            NaverExchange::Szse => "SHENZHEN",
            NaverExchange::Hkex => "HONG_KONG",
            NaverExchange::Tse => "TOKYO",
            NaverExchange::Hose => "HOCHIMINH",
        }
    }
}

/// kr.investing.com 的 ETF 國家頁面
#[derive(Debug, Copy, Clone, PartialEq, Eq, Display, EnumString, EnumIter)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum InvestingCountry {
    Us,
    Cn,
    Hk,
    Jp,
    Uk,
    Fr,
    Major,
    /// 美國頁面加上債券資產的篩選
    Bond,
}

impl InvestingCountry {
    pub fn parse(value: &str) -> Result<Self, ListingError> {
        parse_enum("country", value)
    }

    pub fn slug(&self) -> &'static str {
        match self {
            InvestingCountry::Us | InvestingCountry::Bond => "usa",
            InvestingCountry::Cn => "china",
            InvestingCountry::Hk => "hong-kong",
            InvestingCountry::Jp => "japan",
            InvestingCountry::Uk => "uk",
            InvestingCountry::Fr => "france",
            InvestingCountry::Major => "major",
        }
    }

    /// 查詢字串，只有債券頁面需要
    pub fn query(&self) -> &'static str {
        match self {
            InvestingCountry::Bond => "?&asset=2&issuer_filter=0",
            _ => "",
        }
    }
}

/// 股票清單的來源與市場
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StockSelector {
    Krx(KrxMarket),
    KrxDelisting,
    KrxMarcap,
    KrxAdministrative,
    Naver(NaverExchange),
}

const KRX_DELISTING: &str = "KRX-DELISTING";
const KRX_MARCAP: &str = "KRX-MARCAP";
const KRX_ADMINISTRATIVE: &str = "KRX-ADMINISTRATIVE";

impl StockSelector {
    /// 所有可用的選擇器名稱
    pub fn supported() -> Vec<String> {
        KrxMarket::iter()
            .map(|m| m.to_string())
            .chain(
                [KRX_DELISTING, KRX_MARCAP, KRX_ADMINISTRATIVE]
                    .iter()
                    .map(|s| s.to_string()),
            )
            .chain(NaverExchange::iter().map(|e| e.to_string()))
            .collect()
    }

    pub fn parse(value: &str) -> Result<Self, ListingError> {
        let upper = value.trim().to_uppercase();
        match upper.as_str() {
            KRX_DELISTING => return Ok(StockSelector::KrxDelisting),
            KRX_MARCAP => return Ok(StockSelector::KrxMarcap),
            KRX_ADMINISTRATIVE => return Ok(StockSelector::KrxAdministrative),
            _ => {}
        }

        if let Ok(market) = KrxMarket::from_str(&upper) {
            return Ok(StockSelector::Krx(market));
        }

        if let Ok(exchange) = NaverExchange::from_str(&upper) {
            return Ok(StockSelector::Naver(exchange));
        }

        Err(ListingError::unsupported("market", value, Self::supported()))
    }
}

/// ETF 清單的來源
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EtfSelector {
    /// 韓國 ETF，來自 Naver 金融
    Kr,
    Investing(InvestingCountry),
}

impl EtfSelector {
    pub fn supported() -> Vec<String> {
        std::iter::once("KR".to_string())
            .chain(InvestingCountry::iter().map(|c| c.to_string()))
            .collect()
    }

    pub fn parse(value: &str) -> Result<Self, ListingError> {
        if value.trim().eq_ignore_ascii_case("KR") {
            return Ok(EtfSelector::Kr);
        }

        InvestingCountry::from_str(value.trim())
            .map(EtfSelector::Investing)
            .map_err(|_| ListingError::unsupported("country", value, Self::supported()))
    }
}
