//! Domain policy: list loading, categorization, and match evaluation.

mod classifier;
mod policy;

pub use classifier::{Category, Classifier, PROTECTED_DOMAINS};
pub use policy::{BlockDecision, FilterToggles, PolicySnapshot, PolicySource};

use std::fs;
use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::{info, warn};

/// Counts reported after a (re)load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    pub blocked: usize,
    pub whitelisted: usize,
}

/// Shared policy state with lock-free reads.
///
/// Evaluation loads the current snapshot; `reload` builds a fresh one
/// off to the side and swaps it in whole.
pub struct PolicyEngine {
    snapshot: ArcSwap<PolicySnapshot>,
    classifier: Classifier,
}

impl PolicyEngine {
    /// Start with an empty policy; nothing is blocked until a load.
    pub fn new() -> Self {
        Self::with_classifier(Classifier::defaults())
    }

    pub fn with_classifier(classifier: Classifier) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(PolicySnapshot::default()),
            classifier,
        }
    }

    /// Evaluate a query name against the current snapshot.
    pub fn evaluate(&self, domain: &str) -> BlockDecision {
        self.snapshot.load().evaluate(domain)
    }

    pub fn is_whitelisted(&self, domain: &str) -> bool {
        self.snapshot.load().is_whitelisted(domain)
    }

    /// Number of blocked domains in the active snapshot.
    pub fn blocked_len(&self) -> usize {
        self.snapshot.load().blocked_len()
    }

    /// Rebuild the snapshot from the list files and swap it in.
    ///
    /// An unreadable file degrades to an empty list with a warning; the
    /// caller keeps running either way.
    pub fn reload(&self, source: &PolicySource, toggles: FilterToggles) -> LoadSummary {
        let whitelist_text = read_list(&source.whitelist);
        let blocklist_text = read_list(&source.blocklist);

        let snapshot =
            PolicySnapshot::build(&blocklist_text, &whitelist_text, toggles, &self.classifier);
        let summary = LoadSummary {
            blocked: snapshot.blocked_len(),
            whitelisted: snapshot.whitelisted_len(),
        };
        self.snapshot.store(Arc::new(snapshot));

        info!(
            blocked = summary.blocked,
            whitelisted = summary.whitelisted,
            "policy loaded"
        );
        summary
    }

    /// Swap in a prebuilt snapshot.
    pub fn install(&self, snapshot: PolicySnapshot) {
        self.snapshot.store(Arc::new(snapshot));
    }
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn read_list(path: &Path) -> String {
    match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "policy list unreadable, continuing with an empty list"
            );
            String::new()
        }
    }
}
