use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// The kinds of resources the deletion workflow walks through, in the order it visits them.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceCategory {
    NodeGroups,
    Cluster,
    LegacyServiceRole,
    LegacyNetwork,
    LegacyDefaultNodeGroup,
    SshKey,
    Kubeconfig,
}

impl ResourceCategory {
    pub fn description(&self) -> &'static str {
        match self {
            ResourceCategory::NodeGroups => "node groups",
            ResourceCategory::Cluster => "cluster",
            ResourceCategory::LegacyServiceRole => "service role (legacy)",
            ResourceCategory::LegacyNetwork => "VPC (legacy)",
            ResourceCategory::LegacyDefaultNodeGroup => "default node group (legacy)",
            ResourceCategory::SshKey => "SSH key",
            ResourceCategory::Kubeconfig => "kubeconfig entry",
        }
    }
}

impl Display for ResourceCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self.description(), f)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeletionOutcome {
    /// The resource is gone.
    Deleted,
    /// Deletion was requested but not waited on.
    DeletionStarted,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub category: ResourceCategory,
    /// What was deleted, e.g. a stack name or a file path.
    pub resource: String,
    pub outcome: DeletionOutcome,
}

impl Display for LedgerEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.outcome {
            DeletionOutcome::Deleted => write!(f, "{} ({})", self.category, self.resource),
            DeletionOutcome::DeletionStarted => write!(
                f,
                "{} ({}, deletion started)",
                self.category, self.resource
            ),
        }
    }
}

/// The record of what a deletion removed, in the order it was removed. An empty ledger means
/// nothing was found to delete.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct DeletionLedger {
    entries: Vec<LedgerEntry>,
}

impl DeletionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record<S: Into<String>>(
        &mut self,
        category: ResourceCategory,
        resource: S,
        outcome: DeletionOutcome,
    ) {
        self.entries.push(LedgerEntry {
            category,
            resource: resource.into(),
            outcome,
        })
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn categories(&self) -> Vec<ResourceCategory> {
        self.entries.iter().map(|entry| entry.category).collect()
    }

    pub fn contains(&self, category: ResourceCategory) -> bool {
        self.entries.iter().any(|entry| entry.category == category)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Display for DeletionLedger {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let entries: Vec<String> = self.entries.iter().map(ToString::to_string).collect();
        write!(f, "{}", entries.join(", "))
    }
}

#[test]
fn ledger_display() {
    let mut ledger = DeletionLedger::new();
    assert!(ledger.is_empty());
    ledger.record(
        ResourceCategory::Cluster,
        "eksflow-dev-cluster",
        DeletionOutcome::DeletionStarted,
    );
    ledger.record(
        ResourceCategory::Kubeconfig,
        "/home/user/.kube/config",
        DeletionOutcome::Deleted,
    );
    assert_eq!(ledger.len(), 2);
    assert!(ledger.contains(ResourceCategory::Cluster));
    assert!(!ledger.contains(ResourceCategory::SshKey));
    assert_eq!(
        ledger.to_string(),
        "cluster (eksflow-dev-cluster, deletion started), kubeconfig entry (/home/user/.kube/config)"
    );
}
