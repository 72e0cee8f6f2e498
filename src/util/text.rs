use std::{collections::HashSet, str::FromStr};

use anyhow::{anyhow, Result};
use encoding_rs::EUC_KR;
use once_cell::sync::Lazy;
use regex::Regex;

const NUMBER_ESCAPE_CHAR: &[char] = &['원', '%', ',', ' ', '"', '\n', '\t', '\u{a0}'];

static NON_DIGIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[^0-9]").unwrap_or_else(|why| panic!("invalid digit regex: {:?}", why))
});

/// Converts EUC-KR (CP949) encoded bytes to a UTF-8 `String`.
///
/// Malformed sequences are replaced rather than rejected; KIND pages occasionally
/// carry a stray byte in the company description columns.
pub fn euc_kr_to_utf8(data: &[u8]) -> String {
    let (text, _, _) = EUC_KR.decode(data);
    text.into_owned()
}

/// Parses an `f64` value from a given string.
///
/// Thousands separators and the escape characters in `NUMBER_ESCAPE_CHAR` are
/// removed before parsing, so `"1,234.5"` and `" 12 % "` both succeed.
///
/// # Example
///
/// ```
/// use listing_crawler::util::text::parse_f64;
///
/// let v = parse_f64("1,234.56", None).unwrap();
/// assert_eq!(v, 1234.56);
/// ```
pub fn parse_f64(s: &str, escape_chars: Option<Vec<char>>) -> Result<f64> {
    let cleaned = clean_escape_chars(s, escape_chars);
    let value = f64::from_str(&cleaned)
        .map_err(|why| anyhow!("Failed to parse '{}' as f64 because {:?}", cleaned, why))?;

    if !value.is_finite() {
        return Err(anyhow!("'{}' is not a finite number", cleaned));
    }

    Ok(value)
}

/// Keeps only the ASCII digits of `s` and parses them.
///
/// Summary pages print market capitalisation like `"4,316,425억원"`; every
/// non-digit is dropped, including a sign or decimal point.
pub fn parse_digits(s: &str) -> Result<f64> {
    let digits = NON_DIGIT.replace_all(s, "");
    if digits.is_empty() {
        return Err(anyhow!("'{}' contains no digits", s));
    }

    parse_f64(&digits, None)
}

/// 將數字代碼補零到固定寬度，例︰5930 => "005930"
///
/// 非純數字的代碼（如 "0000J0"）原樣回傳。
pub fn zero_pad_symbol(code: &str, width: usize) -> String {
    let trimmed = code.trim();
    let numeric = trimmed.strip_suffix(".0").unwrap_or(trimmed);

    match numeric.parse::<u64>() {
        Ok(n) => format!("{:0width$}", n, width = width),
        Err(_) => trimmed.to_string(),
    }
}

/// Removes `NUMBER_ESCAPE_CHAR` plus any extra `escape_chars` from a given string.
pub(crate) fn clean_escape_chars(s: &str, escape_chars: Option<Vec<char>>) -> String {
    let mut combined: Vec<char> = NUMBER_ESCAPE_CHAR.to_vec();
    if let Some(ec) = escape_chars {
        combined.extend(ec);
    }

    let filters = combined.iter().collect::<HashSet<_>>();
    s.chars().filter(|c| !filters.contains(c)).collect()
}
