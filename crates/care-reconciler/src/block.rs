//! Presentation of a policy refusal.

use care_dispatch::BlockingRule;
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// Holds at most one blocking rule until the user dismisses it.
///
/// The rule is shown verbatim. Nothing here interprets the policy section,
/// the risk text or the details payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct BlockPresentation {
    rule: Option<BlockingRule>,
}

impl BlockPresentation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces whatever was shown before.
    pub fn show(&mut self, rule: BlockingRule) {
        debug!(
            section = %rule.master_spec_section,
            remediation = %rule.remediation_path,
            "Showing policy block"
        );
        self.rule = Some(rule);
    }

    pub fn dismiss(&mut self) -> Option<BlockingRule> {
        self.rule.take()
    }

    pub fn current(&self) -> Option<&BlockingRule> {
        self.rule.as_ref()
    }

    pub fn is_visible(&self) -> bool {
        self.rule.is_some()
    }

    pub fn remediation_target(&self) -> Option<&str> {
        self.rule.as_ref().map(|rule| rule.remediation_path.as_str())
    }

    /// Hand the remediation path to `go` and close the presentation.
    /// Returns false when nothing is shown.
    pub fn navigate<F>(&mut self, go: F) -> bool
    where
        F: FnOnce(&str),
    {
        match self.rule.take() {
            Some(rule) => {
                go(&rule.remediation_path);
                true
            }
            None => false,
        }
    }
}

impl fmt::Display for BlockPresentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(rule) = &self.rule else {
            return Ok(());
        };
        writeln!(f, "Action blocked: {}", rule.reason)?;
        writeln!(f, "  Policy section: {}", rule.master_spec_section)?;
        writeln!(f, "  Risk prevented: {}", rule.risk_prevented)?;
        write!(f, "  Remediation:    {}", rule.remediation_path)?;
        if let Some(details) = &rule.blocking_details {
            write!(f, "\n  Details:        {details}")?;
        }
        Ok(())
    }
}
