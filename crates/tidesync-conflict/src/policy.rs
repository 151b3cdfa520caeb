//! Policy engine for automatic conflict resolution
//!
//! Evaluates conflict rules from configuration to determine automatic
//! resolution strategies. Rules are matched against entity keys using glob
//! patterns in first-match-wins order; `manual` means "leave it to an
//! operator" and evaluates to `None`.

use glob::Pattern;
use tracing::{debug, trace};

use tidesync_core::config::ConflictsConfig;
use tidesync_core::domain::ResolutionStrategy;

pub use tidesync_core::config::ConflictRule;

use crate::error::ConflictError;

/// Validates a rule's glob pattern and strategy
pub fn validate_rule(rule: &ConflictRule) -> Result<(), ConflictError> {
    Pattern::new(&rule.pattern).map_err(|e| ConflictError::InvalidRule {
        pattern: rule.pattern.clone(),
        reason: e.to_string(),
    })?;

    parse_strategy(&rule.strategy).ok_or_else(|| ConflictError::InvalidRule {
        pattern: rule.pattern.clone(),
        reason: format!(
            "invalid strategy '{}'; valid: manual, prefer_local, prefer_remote",
            rule.strategy
        ),
    })?;

    Ok(())
}

/// Engine that evaluates conflict resolution rules
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    rules: Vec<(Pattern, Option<ResolutionStrategy>)>,
    default_strategy: Option<ResolutionStrategy>,
}

impl PolicyEngine {
    /// Creates a PolicyEngine from the default strategy string and a list of rules
    ///
    /// Invalid rules are logged and skipped; an invalid default falls back
    /// to manual.
    pub fn new(default_strategy: &str, rules: &[ConflictRule]) -> Self {
        let default = parse_strategy(default_strategy).unwrap_or(None);

        let compiled_rules: Vec<_> = rules
            .iter()
            .filter_map(|rule| {
                let pattern = match Pattern::new(&rule.pattern) {
                    Ok(p) => p,
                    Err(e) => {
                        tracing::warn!(
                            pattern = %rule.pattern,
                            error = %e,
                            "Skipping invalid conflict rule pattern"
                        );
                        return None;
                    }
                };
                let Some(strategy) = parse_strategy(&rule.strategy) else {
                    tracing::warn!(
                        strategy = %rule.strategy,
                        "Skipping invalid conflict rule strategy"
                    );
                    return None;
                };
                Some((pattern, strategy))
            })
            .collect();

        debug!(
            rules_count = compiled_rules.len(),
            default = %display_strategy(default.as_ref()),
            "PolicyEngine initialized"
        );

        Self {
            rules: compiled_rules,
            default_strategy: default,
        }
    }

    pub fn from_config(config: &ConflictsConfig) -> Self {
        Self::new(&config.default_strategy, &config.rules)
    }

    /// A policy that never resolves automatically
    pub fn manual() -> Self {
        Self::new("manual", &[])
    }

    /// Evaluates the policy for an entity key
    ///
    /// Returns `None` when the matching rule (or the default) is manual.
    pub fn evaluate(&self, entity: &str) -> Option<ResolutionStrategy> {
        for (pattern, strategy) in &self.rules {
            if pattern.matches(entity) {
                trace!(
                    entity = %entity,
                    pattern = %pattern,
                    strategy = %display_strategy(strategy.as_ref()),
                    "Conflict rule matched"
                );
                return strategy.clone();
            }
        }

        trace!(entity = %entity, "No conflict rule matched, using default");
        self.default_strategy.clone()
    }

    pub fn default_strategy(&self) -> Option<&ResolutionStrategy> {
        self.default_strategy.as_ref()
    }

    /// Returns the number of compiled rules
    pub fn rules_count(&self) -> usize {
        self.rules.len()
    }
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::manual()
    }
}

/// `Some(None)` is a valid manual strategy; `None` is unparseable.
fn parse_strategy(s: &str) -> Option<Option<ResolutionStrategy>> {
    match s {
        "manual" => Some(None),
        other => ResolutionStrategy::parse_automatic(other).ok().map(Some),
    }
}

fn display_strategy(strategy: Option<&ResolutionStrategy>) -> &'static str {
    strategy.map_or("manual", ResolutionStrategy::name)
}
