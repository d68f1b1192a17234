//! Optional fix suggestions behind a swappable text-generation capability.

use crate::report::Issue;
use tracing::warn;

const PROMPT_HEADER: &str =
    "Provide a brief explanation and a minimal code change that remediates this finding:";

/// A text generator (typically an LLM-backed HTTP client) that turns a
/// prompt into suggested fix text. Implementations live outside this
/// crate.
pub trait FixGenerator: Send + Sync {
    fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}

/// Fills `Issue.fix` for issues that do not carry one yet. Generator
/// failures are logged and leave the issue untouched.
pub fn suggest_fixes(issues: &mut [Issue], generator: &dyn FixGenerator) {
    for issue in issues.iter_mut() {
        if issue.finding.fix.is_some() {
            continue;
        }
        let prompt = format!(
            "{PROMPT_HEADER}\n[{}] {} at {}:{}:{}",
            issue.finding.rule_id,
            issue.finding.message,
            issue.finding.file,
            issue.finding.line,
            issue.finding.column,
        );
        match generator.generate(&prompt) {
            Ok(text) => issue.finding.fix = Some(text),
            Err(e) => {
                warn!(rule = %issue.finding.rule_id, "fix generation failed: {e}");
            }
        }
    }
}
