use chrono::NaiveDate;

/// 清單頁面上常見的日期格式
const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%Y%m%d"];

/// Parses a date using the given format, returning `None` when the text is
/// blank or does not match.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use listing_crawler::util::datetime::parse_date_with;
///
/// let d = parse_date_with("1990/01/03", "%Y/%m/%d");
/// assert_eq!(d, NaiveDate::from_ymd_opt(1990, 1, 3));
/// ```
pub fn parse_date_with(s: &str, format: &str) -> Option<NaiveDate> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }

    NaiveDate::parse_from_str(trimmed, format).ok()
}

/// 依序嘗試 `DATE_FORMATS` 中的格式
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| parse_date_with(s, format))
}
