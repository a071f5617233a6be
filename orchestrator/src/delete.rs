use crate::clients::{ClientResult, InfrastructureClient, Workstation};
use crate::error::{self, Resources, Result};
use crate::name::resolve_name;
use eksflow_model::{ClusterIdentity, DeletionLedger, DeletionOutcome, ResourceCategory};
use log::{debug, info, warn};
use snafu::{OptionExt, ResultExt};
use std::fmt::{Display, Formatter};

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DeleteClusterRequest {
    pub name_flag: Option<String>,
    pub name_argument: Option<String>,
    /// Wait for each stack deletion to finish instead of only starting it.
    pub wait: bool,
}

/// One way of deleting the resources of a category.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeletionStrategy {
    NodeGroupStacks,
    ClusterStack,
    LegacyControlPlane,
    LegacyControlPlaneStack,
    LegacyServiceRoleStack,
    LegacyVpcStack,
    LegacyDefaultNodeGroupStack,
    SshKeys,
    KubeconfigEntries,
}

impl Display for DeletionStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let description = match self {
            DeletionStrategy::NodeGroupStacks => "node group stacks",
            DeletionStrategy::ClusterStack => "cluster stack",
            DeletionStrategy::LegacyControlPlane => "legacy control plane",
            DeletionStrategy::LegacyControlPlaneStack => "legacy control plane stack",
            DeletionStrategy::LegacyServiceRoleStack => "legacy service role stack",
            DeletionStrategy::LegacyVpcStack => "legacy VPC stack",
            DeletionStrategy::LegacyDefaultNodeGroupStack => "legacy default node group stack",
            DeletionStrategy::SshKeys => "SSH key pairs",
            DeletionStrategy::KubeconfigEntries => "kubeconfig entries",
        };
        Display::fmt(description, f)
    }
}

/// What happens when every strategy of a category failed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FailurePolicy {
    /// Stop the workflow and return the error.
    Escalate,
    /// Log the error, leave the category out of the ledger and continue.
    Tolerate,
}

/// A row of the deletion table: the strategies are tried in order until one succeeds.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CategoryPolicy {
    pub category: ResourceCategory,
    pub strategies: &'static [DeletionStrategy],
    pub on_failure: FailurePolicy,
}

/// The order and failure handling of a cluster deletion. Node groups go first because the
/// cluster stack cannot be deleted while they exist. Only node group failures stop the deletion.
pub const DELETION_POLICY: &[CategoryPolicy] = &[
    CategoryPolicy {
        category: ResourceCategory::NodeGroups,
        strategies: &[DeletionStrategy::NodeGroupStacks],
        on_failure: FailurePolicy::Escalate,
    },
    CategoryPolicy {
        category: ResourceCategory::Cluster,
        strategies: &[
            DeletionStrategy::ClusterStack,
            DeletionStrategy::LegacyControlPlane,
            DeletionStrategy::LegacyControlPlaneStack,
        ],
        on_failure: FailurePolicy::Tolerate,
    },
    CategoryPolicy {
        category: ResourceCategory::LegacyServiceRole,
        strategies: &[DeletionStrategy::LegacyServiceRoleStack],
        on_failure: FailurePolicy::Tolerate,
    },
    CategoryPolicy {
        category: ResourceCategory::LegacyNetwork,
        strategies: &[DeletionStrategy::LegacyVpcStack],
        on_failure: FailurePolicy::Tolerate,
    },
    CategoryPolicy {
        category: ResourceCategory::LegacyDefaultNodeGroup,
        strategies: &[DeletionStrategy::LegacyDefaultNodeGroupStack],
        on_failure: FailurePolicy::Tolerate,
    },
    CategoryPolicy {
        category: ResourceCategory::SshKey,
        strategies: &[DeletionStrategy::SshKeys],
        on_failure: FailurePolicy::Tolerate,
    },
    CategoryPolicy {
        category: ResourceCategory::Kubeconfig,
        strategies: &[DeletionStrategy::KubeconfigEntries],
        on_failure: FailurePolicy::Tolerate,
    },
];

/// A strategy either removed something, or found nothing to remove.
type Removal = Option<(String, DeletionOutcome)>;

/// Deletes a cluster and everything created for it, including resources of older releases.
pub struct DeleteCluster<'a, I, W>
where
    I: InfrastructureClient,
    W: Workstation,
{
    region: &'a str,
    infra: &'a I,
    workstation: &'a W,
}

impl<'a, I, W> DeleteCluster<'a, I, W>
where
    I: InfrastructureClient,
    W: Workstation,
{
    pub fn new(region: &'a str, infra: &'a I, workstation: &'a W) -> Self {
        Self {
            region,
            infra,
            workstation,
        }
    }

    /// Runs the deletion table top to bottom. Returns what was deleted; an empty ledger means
    /// nothing was found and is not an error.
    pub async fn run(&self, request: &DeleteClusterRequest) -> Result<DeletionLedger> {
        self.infra.check_auth().await.context(error::AuthSnafu)?;
        let name = resolve_name(
            request.name_flag.as_deref(),
            request.name_argument.as_deref(),
        )?
        .context(error::MissingFieldSnafu {
            what: "--name must be set",
        })?;
        let identity = ClusterIdentity::new(name, self.region);
        info!(
            "Deleting cluster '{}' in region {}",
            identity.name, identity.region
        );

        let mut ledger = DeletionLedger::new();
        for policy in DELETION_POLICY {
            self.apply(policy, &identity, request.wait, &mut ledger)
                .await?;
        }

        if ledger.is_empty() {
            info!("No cluster resources were found for '{}'", identity.name);
        } else {
            info!("Deleted {}", ledger);
        }
        Ok(ledger)
    }

    async fn apply(
        &self,
        policy: &CategoryPolicy,
        identity: &ClusterIdentity,
        wait: bool,
        ledger: &mut DeletionLedger,
    ) -> Result<()> {
        let mut failures = Vec::new();
        for strategy in policy.strategies {
            debug!("Trying to delete {} using {}", policy.category, strategy);
            match self.execute(*strategy, identity, wait).await {
                Ok(Some((resource, outcome))) => {
                    ledger.record(policy.category, resource, outcome);
                    return Ok(());
                }
                Ok(None) => return Ok(()),
                Err(e) => {
                    debug!("Deleting {} using {} failed: {}", policy.category, strategy, e);
                    failures.push(e);
                }
            }
        }

        match (policy.on_failure, failures.pop()) {
            (_, None) => Ok(()),
            (FailurePolicy::Escalate, Some(last)) => Err(last),
            (FailurePolicy::Tolerate, Some(last)) => {
                failures.push(last);
                let details = failures
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ");
                let error = error::LegacyResourceSnafu {
                    category: policy.category,
                    details,
                }
                .build();
                warn!("{}", error);
                Ok(())
            }
        }
    }

    async fn execute(
        &self,
        strategy: DeletionStrategy,
        identity: &ClusterIdentity,
        wait: bool,
    ) -> Result<Removal> {
        let outcome = if wait {
            DeletionOutcome::Deleted
        } else {
            DeletionOutcome::DeletionStarted
        };
        match strategy {
            DeletionStrategy::NodeGroupStacks => {
                let errors = self.infra.delete_node_groups(identity).await;
                if errors.is_empty() {
                    Ok(None)
                } else {
                    error::NodeGroupDeletionSnafu {
                        cluster: &identity.name,
                        errors,
                    }
                    .fail()
                }
            }
            DeletionStrategy::ClusterStack => stack(
                strategy,
                self.infra.delete_cluster(identity, wait).await,
                outcome,
            ),
            DeletionStrategy::LegacyControlPlane => stack(
                strategy,
                self.infra.deprecated_delete_control_plane(identity).await,
                DeletionOutcome::DeletionStarted,
            ),
            DeletionStrategy::LegacyControlPlaneStack => stack(
                strategy,
                self.infra
                    .deprecated_delete_stack_control_plane(identity, wait)
                    .await,
                outcome,
            ),
            DeletionStrategy::LegacyServiceRoleStack => stack(
                strategy,
                self.infra
                    .deprecated_delete_stack_service_role(identity, wait)
                    .await,
                outcome,
            ),
            DeletionStrategy::LegacyVpcStack => stack(
                strategy,
                self.infra.deprecated_delete_stack_vpc(identity, wait).await,
                outcome,
            ),
            DeletionStrategy::LegacyDefaultNodeGroupStack => stack(
                strategy,
                self.infra
                    .deprecated_delete_stack_default_node_group(identity, wait)
                    .await,
                outcome,
            ),
            DeletionStrategy::SshKeys => {
                let keys = self
                    .infra
                    .delete_ssh_public_keys(&identity.name)
                    .await
                    .context(client(strategy))?;
                Ok((!keys.is_empty()).then(|| (keys.join(", "), DeletionOutcome::Deleted)))
            }
            DeletionStrategy::KubeconfigEntries => {
                let path = self
                    .workstation
                    .remove_kubeconfig(identity)
                    .context(client(strategy))?;
                Ok(path.map(|path| (path.display().to_string(), DeletionOutcome::Deleted)))
            }
        }
    }
}

fn stack(
    strategy: DeletionStrategy,
    result: ClientResult<String>,
    outcome: DeletionOutcome,
) -> Result<Removal> {
    let name = result.context(client(strategy))?;
    Ok(Some((name, outcome)))
}

fn client(strategy: DeletionStrategy) -> error::ClientSnafu<String, Resources> {
    error::ClientSnafu {
        action: format!("delete {}", strategy),
        resources: Resources::Unknown,
    }
}
