//! Category assignment for blocklist entries.

/// Why a domain is on the blocklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Ads,
    Tracking,
    Annoyances,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Ads => "ads",
            Category::Tracking => "tracking",
            Category::Annoyances => "annoyances",
        }
    }
}

const AD_PATTERNS: &[&str] = &[
    "ads",
    "ad.",
    "adserver",
    "adservice",
    "adsystem",
    "adtech",
    "banner",
    "doubleclick",
    "googlesyndication",
    "googleads",
    "pagead",
    "pubads",
    "advert",
    "adnxs",
    "advertising",
];

const TRACKING_PATTERNS: &[&str] = &[
    "track",
    "tracker",
    "analytics",
    "telemetry",
    "beacon",
    "pixel",
    "metrics",
    "collect",
    "stats",
    "log.",
    "logging",
    "measure",
    "segment",
    "hotjar",
    "mouseflow",
    "clickstream",
];

/// Domains that are never blocked, whatever the list sources say.
pub const PROTECTED_DOMAINS: &[&str] = &[
    "google.com",
    "googleapis.com",
    "gstatic.com",
    "googlevideo.com",
    "youtube.com",
    "ytimg.com",
    "facebook.com",
    "fbcdn.net",
    "twitter.com",
    "twimg.com",
    "instagram.com",
    "cdninstagram.com",
    "reddit.com",
    "redditmedia.com",
    "redditstatic.com",
    "amazon.com",
    "amazonaws.com",
    "cloudfront.net",
    "microsoft.com",
    "live.com",
    "apple.com",
    "icloud.com",
    "akamaihd.net",
    "akamai.net",
    "cloudflare.com",
    "fastly.net",
    "github.com",
    "githubusercontent.com",
    "whatsapp.com",
    "whatsapp.net",
    "discord.com",
    "discordapp.com",
    "spotify.com",
    "scdn.co",
    "netflix.com",
    "nflxvideo.net",
];

/// Assigns a category by the first matching substring rule.
///
/// Rule order matters: a name matching several rules takes the category
/// of whichever rule comes first in the table.
pub struct Classifier {
    rules: Vec<(String, Category)>,
    fallback: Category,
}

impl Classifier {
    pub fn new(rules: Vec<(String, Category)>, fallback: Category) -> Self {
        Self { rules, fallback }
    }

    /// The stock rule table: ad patterns before tracking patterns, with
    /// unmatched entries falling back to `Ads`.
    pub fn defaults() -> Self {
        let mut rules = Vec::with_capacity(AD_PATTERNS.len() + TRACKING_PATTERNS.len());
        rules.extend(
            AD_PATTERNS
                .iter()
                .map(|p| (p.to_string(), Category::Ads)),
        );
        rules.extend(
            TRACKING_PATTERNS
                .iter()
                .map(|p| (p.to_string(), Category::Tracking)),
        );
        Self::new(rules, Category::Ads)
    }

    /// Categorize a normalized (lowercased) domain name.
    pub fn classify(&self, domain: &str) -> Category {
        for (pattern, category) in &self.rules {
            if domain.contains(pattern.as_str()) {
                return *category;
            }
        }
        self.fallback
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::defaults()
    }
}
