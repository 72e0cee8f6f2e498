const CHROME_VERSIONS: [&str; 12] = [
    "133.0.6943.88", "132.0.6834.110", "131.0.6778.108", "130.0.6723.117", "129.0.6668.89",
    "128.0.6613.138", "127.0.6533.119", "126.0.6478.182", "125.0.6422.176", "124.0.6367.243",
    "123.0.6312.122", "122.0.6261.129",
];

const FIREFOX_VERSIONS: [&str; 8] = [
    "133.0", "132.0", "131.0", "130.0", "129.0", "128.0", "127.0", "126.0",
];

const EDGE_VERSIONS: [&str; 6] = [
    "133.0.3048.56", "132.0.2957.63", "131.0.2903.112", "130.0.2849.80", "129.0.2792.65",
    "128.0.2739.90",
];

/// 只用桌面平台，wisereport 與 choicestock 對行動版會回傳不同的版面
const DESKTOP_OS: [&str; 8] = [
    "Windows NT 10.0; Win64; x64",
    "Windows NT 10.0; Win64; x64",
    "Windows NT 10.0; WOW64",
    "Macintosh; Intel Mac OS X 10_15_7",
    "Macintosh; Intel Mac OS X 13_6_5",
    "Macintosh; Intel Mac OS X 14_7_1",
    "X11; Linux x86_64",
    "X11; Ubuntu; Linux x86_64",
];

fn pick<'a>(items: &[&'a str]) -> &'a str {
    items[rand::random_range(0..items.len())]
}

fn gen_chrome_ua() -> String {
    format!(
        "Mozilla/5.0 ({}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{} Safari/537.36",
        pick(&DESKTOP_OS),
        pick(&CHROME_VERSIONS)
    )
}

fn gen_firefox_ua() -> String {
    let version = pick(&FIREFOX_VERSIONS);
    format!(
        "Mozilla/5.0 ({}; rv:{}) Gecko/20100101 Firefox/{}",
        pick(&DESKTOP_OS),
        version,
        version
    )
}

fn gen_edge_ua() -> String {
    let version = pick(&EDGE_VERSIONS);
    let chrome_ver = version.split('.').next().unwrap_or("133");
    format!(
        "Mozilla/5.0 ({}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{}.0.0.0 Safari/537.36 Edg/{}",
        pick(&DESKTOP_OS),
        chrome_ver,
        version
    )
}

pub fn gen_random_ua() -> String {
    match rand::random_range(0..10) {
        0..=5 => gen_chrome_ua(),
        6..=7 => gen_firefox_ua(),
        _ => gen_edge_ua(),
    }
}
