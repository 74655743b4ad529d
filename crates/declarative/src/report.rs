//! Per-scope outcome aggregation

use crate::resource::{Action, Resource, ResourceKind};
use crate::types::{ApplyResult, ExecuteSummary};
use serde::{Deserialize, Serialize};

/// What happened to one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceOutcome {
    pub kind: ResourceKind,
    pub name: String,
    pub action: Action,
    #[serde(flatten)]
    pub result: ApplyResult,
}

impl ResourceOutcome {
    pub fn new(resource: &Resource, result: ApplyResult) -> Self {
        Self {
            kind: resource.kind(),
            name: resource.name().to_string(),
            action: resource.action(),
            result,
        }
    }

    /// `Kind[name]`
    pub fn label(&self) -> String {
        format!("{}[{}]", self.kind, self.name)
    }
}

/// Outcomes of every resource realized in a scope, in realization order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeReport {
    pub outcomes: Vec<ResourceOutcome>,
    pub summary: ExecuteSummary,
}

impl ScopeReport {
    pub fn record(&mut self, outcome: ResourceOutcome) {
        self.summary.add_result(&outcome.result);
        self.outcomes.push(outcome);
    }

    /// Fold a nested scope's report into this one
    pub fn absorb(&mut self, other: ScopeReport) {
        self.summary.merge(&other.summary);
        self.outcomes.extend(other.outcomes);
    }

    pub fn is_success(&self) -> bool {
        self.summary.is_success()
    }

    /// Outcomes that changed the host
    pub fn changes(&self) -> impl Iterator<Item = &ResourceOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_change())
    }

    /// Outcomes that failed (ignored failures included)
    pub fn failures(&self) -> impl Iterator<Item = &ResourceOutcome> {
        self.outcomes.iter().filter(|o| !o.result.is_success())
    }
}
