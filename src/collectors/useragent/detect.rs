//! Browser and operating system detection from `User-Agent` strings.
//!
//! Detection is a first-match walk over two priority ordered registries.
//! Agents that embed other agents' tokens, Chrome carrying `Safari` or
//! Android carrying `Linux`, are listed before the agents they embed.

/// A browser or operating system found in a `User-Agent` string.
#[derive(Clone, Debug, PartialEq)]
pub struct Agent {
    /// Canonical name, e.g. `Firefox`.
    pub name: &'static str,
    /// Dotted version, if the string carries one.
    pub version: Option<String>,
}

/// Everything learned from one `User-Agent` string.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Details {
    /// The client program.
    pub browser: Option<Agent>,
    /// The client's operating system.
    pub os: Option<Agent>,
    /// True for crawlers and automated clients.
    pub bot: bool,
}

struct Detector {
    name: &'static str,
    look_for: &'static str,
    version_after: Option<&'static str>,
    bot: bool,
}

const fn detector(
    name: &'static str,
    look_for: &'static str,
    version_after: Option<&'static str>,
    bot: bool,
) -> Detector {
    Detector {
        name,
        look_for,
        version_after,
        bot,
    }
}

static BROWSERS: &[Detector] = &[
    detector("Googlebot", "Googlebot", Some("Googlebot/"), true),
    detector("bingbot", "bingbot", Some("bingbot/"), true),
    detector("CCBot", "CCBot", Some("CCBot/"), true),
    detector("monit", "monit", Some("monit/"), true),
    detector("curl", "curl", Some("curl/"), true),
    detector("Wget", "Wget", Some("Wget/"), true),
    detector("python-requests", "python-requests", Some("python-requests/"), true),
    detector("Edge", "Edg/", Some("Edg/"), false),
    detector("Edge", "Edge/", Some("Edge/"), false),
    detector("Opera", "OPR/", Some("OPR/"), false),
    detector("Opera", "Opera", Some("Version/"), false),
    detector("Chrome", "Chrome/", Some("Chrome/"), false),
    detector("Chrome", "CriOS/", Some("CriOS/"), false),
    detector("Firefox", "Firefox/", Some("Firefox/"), false),
    detector("Safari", "Safari/", Some("Version/"), false),
    detector("MSIE", "MSIE", Some("MSIE "), false),
    detector("MSIE", "Trident/", Some("rv:"), false),
];

static SYSTEMS: &[Detector] = &[
    detector("Windows", "Windows NT", Some("Windows NT "), false),
    detector("Android", "Android", Some("Android "), false),
    detector("iOS", "iPhone OS", Some("iPhone OS "), false),
    detector("iOS", "iPad; CPU OS", Some("CPU OS "), false),
    detector("ChromeOS", "CrOS", None, false),
    detector("MacOS", "Mac OS X", Some("Mac OS X "), false),
    detector("Linux", "Linux", None, false),
];

const BOT_HINTS: &[&str] = &["bot", "spider", "crawl"];

fn version(ua: &str, marker: &str) -> Option<String> {
    let start = ua.find(marker)? + marker.len();
    let version: String = ua[start..]
        .chars()
        .take_while(|c| !(c.is_whitespace() || *c == ';' || *c == ')' || *c == ','))
        .map(|c| if c == '_' { '.' } else { c })
        .collect();
    if version.is_empty() {
        None
    } else {
        Some(version)
    }
}

fn first_match(registry: &'static [Detector], ua: &str) -> Option<&'static Detector> {
    registry.iter().find(|d| ua.contains(d.look_for))
}

/// Detect the browser and operating system behind `ua`.
pub fn detect(ua: &str) -> Details {
    let mut details = Details::default();
    if let Some(d) = first_match(BROWSERS, ua) {
        details.bot = d.bot;
        details.browser = Some(Agent {
            name: d.name,
            version: d.version_after.and_then(|m| version(ua, m)),
        });
    } else {
        let lower = ua.to_lowercase();
        details.bot = BOT_HINTS.iter().any(|h| lower.contains(h));
    }
    details.os = first_match(SYSTEMS, ua).map(|d| Agent {
        name: d.name,
        version: d.version_after.and_then(|m| version(ua, m)),
    });
    details
}

#[cfg(test)]
mod test {
    use super::*;

    fn agent(name: &'static str, version: &str) -> Option<Agent> {
        Some(Agent {
            name: name,
            version: Some(version.to_string()),
        })
    }

    #[test]
    fn chrome_on_windows() {
        let d = detect(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
             (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
        );
        assert_eq!(d.browser, agent("Chrome", "91.0.4472.124"));
        assert_eq!(d.os, agent("Windows", "10.0"));
        assert!(!d.bot);
    }

    #[test]
    fn safari_on_iphone() {
        let d = detect(
            "Mozilla/5.0 (iPhone; CPU iPhone OS 14_6 like Mac OS X) AppleWebKit/605.1.15 \
             (KHTML, like Gecko) Version/14.1.1 Mobile/15E148 Safari/604.1",
        );
        assert_eq!(d.browser, agent("Safari", "14.1.1"));
        assert_eq!(d.os, agent("iOS", "14.6"));
    }

    #[test]
    fn firefox_on_linux() {
        let d = detect("Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:89.0) Gecko/20100101 Firefox/89.0");
        assert_eq!(d.browser, agent("Firefox", "89.0"));
        assert_eq!(
            d.os,
            Some(Agent {
                name: "Linux",
                version: None,
            })
        );
    }

    #[test]
    fn chrome_on_android_is_not_linux() {
        let d = detect(
            "Mozilla/5.0 (Linux; Android 11; Pixel 5) AppleWebKit/537.36 \
             (KHTML, like Gecko) Chrome/90.0.4430.91 Mobile Safari/537.36",
        );
        assert_eq!(d.os, agent("Android", "11"));
        assert_eq!(d.browser, agent("Chrome", "90.0.4430.91"));
    }

    #[test]
    fn edge_wins_over_chrome() {
        let d = detect(
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
             (KHTML, like Gecko) Chrome/91.0.4472.114 Safari/537.36 Edg/91.0.864.54",
        );
        assert_eq!(d.browser, agent("Edge", "91.0.864.54"));
        assert_eq!(d.os, agent("MacOS", "10.15.7"));
    }

    #[test]
    fn old_internet_explorer() {
        let d = detect("Mozilla/4.0 (compatible; MSIE 8.0; Windows NT 6.1; Trident/4.0)");
        assert_eq!(d.browser, agent("MSIE", "8.0"));
        assert_eq!(d.os, agent("Windows", "6.1"));
    }

    #[test]
    fn registered_bots() {
        assert!(detect("curl/7.68.0").bot);
        assert_eq!(detect("curl/7.68.0").browser, agent("curl", "7.68.0"));
        assert!(detect("monit/5.26.0").bot);
        assert!(detect("CCBot/2.0 (https://commoncrawl.org/faq/)").bot);
        assert!(detect(
            "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)"
        )
        .bot);
    }

    #[test]
    fn unknown_crawlers_are_bots() {
        let d = detect("Mozilla/5.0 (compatible; SomeSpider/1.0)");
        assert!(d.bot);
        assert_eq!(d.browser, None);
    }

    #[test]
    fn empty_agent() {
        assert_eq!(detect(""), Details::default());
        assert_eq!(detect("-"), Details::default());
    }
}
