//! Run configuration consumed by the engine.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};

/// Default marker word of the suppression tag.
pub const DEFAULT_SUPPRESS_WORD: &str = "nosec";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Worker pool size. 1 is effectively serial.
    pub concurrency: usize,
    /// Report suppressed findings (marked) instead of dropping them.
    pub audit: bool,
    /// Ignore in-source suppression directives entirely.
    pub ignore_suppressions: bool,
    /// Alternate marker word for the suppression tag. `None` keeps the
    /// default; only one alternate is honored at a time.
    pub suppress_tag: Option<String>,
    /// Rule ids silenced globally, regardless of in-source tags.
    pub excluded_rules: HashSet<String>,
    /// Fail the run on the first rule configuration error instead of
    /// skipping the offending rule.
    pub strict_startup: bool,
    /// Dispatch units marked as machine-generated.
    pub include_generated: bool,
    /// Dispatch units belonging to test sources.
    pub include_tests: bool,
    /// Per-rule configuration blobs, keyed by rule id. Opaque to the
    /// engine; each rule interprets its own entry at construction time.
    #[serde(default)]
    pub rule_config: HashMap<String, JsonValue>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            audit: false,
            ignore_suppressions: false,
            suppress_tag: None,
            excluded_rules: HashSet::new(),
            strict_startup: false,
            include_generated: false,
            include_tests: false,
            rule_config: HashMap::new(),
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.concurrency == 0 {
            anyhow::bail!("concurrency must be a positive integer");
        }
        Ok(())
    }

    /// Full suppression tag, marker word included: `#nosec` by default.
    pub fn tag(&self) -> String {
        format!(
            "#{}",
            self.suppress_tag.as_deref().unwrap_or(DEFAULT_SUPPRESS_WORD)
        )
    }

    /// Configuration blob declared for `rule_id`, if any.
    pub fn rule_config(&self, rule_id: &str) -> Option<&JsonValue> {
        self.rule_config.get(rule_id)
    }
}
