//! Policy snapshots: parsed domain lists and match evaluation.

use std::path::PathBuf;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::filter::classifier::{Category, Classifier, PROTECTED_DOMAINS};

/// Per-category enablement, all on by default.
#[derive(Debug, Clone, Copy)]
pub struct FilterToggles {
    pub block_ads: bool,
    pub block_trackers: bool,
    pub block_annoyances: bool,
}

impl Default for FilterToggles {
    fn default() -> Self {
        Self {
            block_ads: true,
            block_trackers: true,
            block_annoyances: true,
        }
    }
}

impl FilterToggles {
    fn enabled(&self, category: Category) -> bool {
        match category {
            Category::Ads => self.block_ads,
            Category::Tracking => self.block_trackers,
            Category::Annoyances => self.block_annoyances,
        }
    }
}

/// Filesystem locations of the domain lists.
#[derive(Debug, Clone)]
pub struct PolicySource {
    pub blocklist: PathBuf,
    pub whitelist: PathBuf,
}

/// The verdict for one evaluated query name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDecision {
    pub blocked: bool,
    pub category: Option<Category>,
    pub matched: Option<String>,
}

impl BlockDecision {
    fn allow() -> Self {
        Self {
            blocked: false,
            category: None,
            matched: None,
        }
    }
}

/// An immutable view of the active policy.
///
/// Built whole on every (re)load and swapped in atomically, so
/// evaluation never sees a half-updated list.
#[derive(Debug, Default)]
pub struct PolicySnapshot {
    whitelist: FxHashSet<String>,
    blocklist: FxHashSet<String>,
    categories: FxHashMap<String, Category>,
}

impl PolicySnapshot {
    /// Build a snapshot from raw list text.
    ///
    /// Blocklist entries covered by the whitelist are dropped up front,
    /// entries whose category toggle is off are dropped next, and
    /// protected domains are dropped last, unconditionally.
    pub fn build(
        blocklist_text: &str,
        whitelist_text: &str,
        toggles: FilterToggles,
        classifier: &Classifier,
    ) -> Self {
        let mut snapshot = Self {
            whitelist: parse_lines(whitelist_text).collect(),
            blocklist: FxHashSet::default(),
            categories: FxHashMap::default(),
        };

        for domain in parse_lines(blocklist_text) {
            if snapshot.is_whitelisted(&domain) {
                continue;
            }
            let category = classifier.classify(&domain);
            if !toggles.enabled(category) {
                continue;
            }
            snapshot.categories.insert(domain.clone(), category);
            snapshot.blocklist.insert(domain);
        }

        for domain in PROTECTED_DOMAINS {
            snapshot.blocklist.remove(*domain);
            snapshot.categories.remove(*domain);
        }

        snapshot
    }

    /// Evaluate one query name. The whitelist wins over the blocklist;
    /// matching walks from the exact name outward one label at a time
    /// and the first hit is the match.
    pub fn evaluate(&self, domain: &str) -> BlockDecision {
        let domain = normalize(domain);

        if ancestor_match(&self.whitelist, &domain).is_some() {
            return BlockDecision::allow();
        }

        match ancestor_match(&self.blocklist, &domain) {
            Some(matched) => BlockDecision {
                blocked: true,
                category: self.categories.get(matched).copied(),
                matched: Some(matched.to_string()),
            },
            None => BlockDecision::allow(),
        }
    }

    /// Check whitelist membership (exact or ancestor).
    pub fn is_whitelisted(&self, domain: &str) -> bool {
        ancestor_match(&self.whitelist, &normalize(domain)).is_some()
    }

    pub fn blocked_len(&self) -> usize {
        self.blocklist.len()
    }

    pub fn whitelisted_len(&self) -> usize {
        self.whitelist.len()
    }
}

/// Parse one list file: trim, skip blank, comment, and wildcard lines,
/// lowercase, strip a single trailing dot.
fn parse_lines(text: &str) -> impl Iterator<Item = String> + '_ {
    text.lines().filter_map(|line| {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('*') {
            return None;
        }
        let line = line.to_lowercase();
        Some(line.strip_suffix('.').unwrap_or(&line).to_string())
    })
}

fn normalize(domain: &str) -> String {
    let domain = domain.trim().to_lowercase();
    domain.strip_suffix('.').unwrap_or(&domain).to_string()
}

fn ancestor_match<'a>(set: &'a FxHashSet<String>, domain: &str) -> Option<&'a str> {
    let mut current = domain;

    loop {
        if let Some(hit) = set.get(current) {
            return Some(hit.as_str());
        }
        match current.find('.') {
            Some(pos) => current = &current[pos + 1..],
            None => return None,
        }
    }
}
