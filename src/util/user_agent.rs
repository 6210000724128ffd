//! Small user-agent classifier for the `browser`, `device` and `os` labels of the base log.

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserAgentInfo {
    pub browser_name: Option<String>,
    pub browser_version: Option<String>,
    pub device_model: Option<String>,
    pub device_vendor: Option<String>,
    pub os_name: Option<String>,
    pub os_version: Option<String>,
}

// First match wins. Vendor tokens come before the engine tokens they also carry:
// Edge, Opera and Samsung advertise Chrome; every iOS browser advertises Safari.
const BROWSER_TOKENS: &[(&str, &str)] = &[
    ("Edg/", "Edge"),
    ("EdgA/", "Edge"),
    ("EdgiOS/", "Edge"),
    ("OPR/", "Opera"),
    ("OPT/", "Opera"),
    ("OPiOS/", "Opera"),
    ("SamsungBrowser/", "Samsung Browser"),
    ("YaBrowser/", "Yandex"),
    ("UCBrowser/", "UC Browser"),
    ("FxiOS/", "Firefox"),
    ("Firefox/", "Firefox"),
    ("CriOS/", "Chrome"),
    ("Chrome/", "Chrome"),
    ("Version/", "Safari"),
];

impl UserAgentInfo {
    pub fn parse(user_agent: &str) -> Self {
        let mut info = UserAgentInfo::default();
        for (token, name) in BROWSER_TOKENS {
            if let Some(version) = token_value(user_agent, token) {
                if *name == "Safari" && !user_agent.contains("Safari/") {
                    continue;
                }
                info.browser_name = Some((*name).to_string());
                info.browser_version = Some(version);
                break;
            }
        }
        info.parse_platform(user_agent);
        info
    }

    fn parse_platform(&mut self, user_agent: &str) {
        let Some(platform) = platform_section(user_agent) else {
            return;
        };
        let parts: Vec<&str> = platform.split(';').map(str::trim).collect();

        if let Some(part) = parts.iter().find(|part| part.starts_with("Windows NT")) {
            self.os_name = Some("Windows".into());
            self.os_version = part
                .strip_prefix("Windows NT ")
                .map(|version| windows_release(version).to_string());
        } else if parts.iter().any(|part| *part == "iPhone" || *part == "iPad") {
            self.os_name = Some("iOS".into());
            self.os_version = parts
                .iter()
                .find_map(|part| part.split(" OS ").nth(1))
                .and_then(|rest| rest.split_whitespace().next())
                .map(|version| version.replace('_', "."));
            self.device_vendor = Some("Apple".into());
            self.device_model = parts
                .iter()
                .find(|part| **part == "iPhone" || **part == "iPad")
                .map(|model| (*model).to_string());
        } else if let Some(part) = parts.iter().find(|part| part.starts_with("Android")) {
            self.os_name = Some("Android".into());
            self.os_version = part
                .strip_prefix("Android ")
                .map(|version| version.to_string());
            self.device_model = parts
                .iter()
                .skip_while(|candidate| !candidate.starts_with("Android"))
                .nth(1)
                .map(|model| model.split(" Build").next().unwrap_or(model).to_string())
                .filter(|model| {
                    !model.is_empty()
                        && !model.starts_with("rv:")
                        && !matches!(model.as_str(), "K" | "Mobile" | "Tablet")
                });
        } else if let Some(part) = parts.iter().find(|part| part.contains("Mac OS X")) {
            self.os_name = Some("Mac OS".into());
            self.os_version = part
                .split("Mac OS X")
                .nth(1)
                .map(|version| version.trim().replace('_', "."))
                .filter(|version| !version.is_empty());
            self.device_vendor = Some("Apple".into());
            self.device_model = Some("Macintosh".into());
        } else if parts.iter().any(|part| part.contains("CrOS")) {
            self.os_name = Some("Chromium OS".into());
        } else if parts.iter().any(|part| part.contains("Linux")) {
            self.os_name = Some("Linux".into());
        }
    }

    pub fn browser_label(&self) -> String {
        join_label(&self.browser_name, &self.browser_version)
    }

    pub fn device_label(&self) -> String {
        join_label(&self.device_model, &self.device_vendor)
    }

    pub fn os_label(&self) -> String {
        join_label(&self.os_name, &self.os_version)
    }
}

fn token_value(user_agent: &str, token: &str) -> Option<String> {
    let start = user_agent.find(token)? + token.len();
    let version: String = user_agent[start..]
        .chars()
        .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '.')
        .collect();
    (!version.is_empty()).then_some(version)
}

fn platform_section(user_agent: &str) -> Option<&str> {
    let start = user_agent.find('(')?;
    let end = user_agent[start..].find(')')? + start;
    Some(&user_agent[start + 1..end])
}

fn windows_release(nt_version: &str) -> &str {
    match nt_version {
        "10.0" => "10",
        "6.3" => "8.1",
        "6.2" => "8",
        "6.1" => "7",
        other => other,
    }
}

fn join_label(first: &Option<String>, second: &Option<String>) -> String {
    [first.as_deref(), second.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHROME_MAC: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.6099.109 Safari/537.36";
    const EDGE_WINDOWS: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.2210.91";
    const SAFARI_IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_1_2 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1.2 Mobile/15E148 Safari/604.1";
    const FIREFOX_ANDROID: &str = "Mozilla/5.0 (Android 13; Mobile; rv:121.0) Gecko/121.0 Firefox/121.0";
    const CHROME_ANDROID: &str = "Mozilla/5.0 (Linux; Android 14; Pixel 8 Build/UD1A.230803.041) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.6099.144 Mobile Safari/537.36";

    #[test]
    fn chrome_on_mac() {
        let info = UserAgentInfo::parse(CHROME_MAC);
        assert_eq!(info.browser_label(), "Chrome 120.0.6099.109");
        assert_eq!(info.os_label(), "Mac OS 10.15.7");
        assert_eq!(info.device_label(), "Macintosh Apple");
    }

    #[test]
    fn edge_wins_over_chrome() {
        let info = UserAgentInfo::parse(EDGE_WINDOWS);
        assert_eq!(info.browser_label(), "Edge 120.0.2210.91");
        assert_eq!(info.os_label(), "Windows 10");
        assert_eq!(info.device_label(), "");
    }

    #[test]
    fn safari_on_iphone() {
        let info = UserAgentInfo::parse(SAFARI_IPHONE);
        assert_eq!(info.browser_label(), "Safari 17.1.2");
        assert_eq!(info.os_label(), "iOS 17.1.2");
        assert_eq!(info.device_label(), "iPhone Apple");
    }

    #[test]
    fn android_devices() {
        let firefox = UserAgentInfo::parse(FIREFOX_ANDROID);
        assert_eq!(firefox.browser_label(), "Firefox 121.0");
        assert_eq!(firefox.os_label(), "Android 13");

        let chrome = UserAgentInfo::parse(CHROME_ANDROID);
        assert_eq!(chrome.os_label(), "Android 14");
        assert_eq!(chrome.device_model.as_deref(), Some("Pixel 8"));
    }

    #[test]
    fn mobile_vendor_tokens_win_over_engine_tokens() {
        let cases = [
            (
                "Mozilla/5.0 (iPhone; CPU iPhone OS 17_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) FxiOS/121.0 Mobile/15E148 Safari/605.1.15",
                "Firefox 121.0",
                "iOS 17.1",
            ),
            (
                "Mozilla/5.0 (Linux; Android 10; K) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36 EdgA/120.0.2210.115",
                "Edge 120.0.2210.115",
                "Android 10",
            ),
            (
                "Mozilla/5.0 (iPhone; CPU iPhone OS 17_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 EdgiOS/120.2210.126 Mobile/15E148 Safari/605.1.15",
                "Edge 120.2210.126",
                "iOS 17.1",
            ),
            (
                "Mozilla/5.0 (iPhone; CPU iPhone OS 17_1_2 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) CriOS/120.0.6099.119 Mobile/15E148 Safari/604.1",
                "Chrome 120.0.6099.119",
                "iOS 17.1.2",
            ),
            (
                "Mozilla/5.0 (Linux; Android 13; SM-S911B) AppleWebKit/537.36 (KHTML, like Gecko) SamsungBrowser/23.0 Chrome/115.0.0.0 Mobile Safari/537.36",
                "Samsung Browser 23.0",
                "Android 13",
            ),
            (
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 YaBrowser/23.11.0.0 Safari/537.36",
                "Yandex 23.11.0.0",
                "Windows 10",
            ),
        ];
        for (agent, browser, os) in cases {
            let info = UserAgentInfo::parse(agent);
            assert_eq!(info.browser_label(), browser, "{agent}");
            assert_eq!(info.os_label(), os, "{agent}");
        }
    }

    #[test]
    fn unknown_agent_yields_empty_labels() {
        let info = UserAgentInfo::parse("curl/8.4.0");
        assert_eq!(info, UserAgentInfo::default());
        assert_eq!(info.browser_label(), "");
    }
}
