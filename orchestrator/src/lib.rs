/*!

The `eksflow-orchestrator` library sequences the lifecycle of a managed Kubernetes cluster. It
decides what happens in which order and what a failure means; the actual work is done by
implementations of the [`InfrastructureClient`], [`ClusterClient`] and [`Workstation`] traits.

- [`CreateCluster`] validates the request, resolves the network, machine image and SSH key,
  provisions the cluster and its node group, then waits for the cluster to become usable.
- [`DeleteCluster`] walks a table of resource categories, from node groups down to local
  kubeconfig entries, and returns a [`DeletionLedger`] of what it removed.
- [`get_clusters`] lists clusters.
- [`wait`] holds the bounded polling used for readiness.

!*/

#![deny(
    clippy::expect_used,
    clippy::get_unwrap,
    clippy::panic,
    clippy::panic_in_result_fn,
    clippy::panicking_unwrap,
    clippy::unwrap_in_result,
    clippy::unwrap_used
)]

pub mod clients;
mod create;
mod delete;
pub mod error;
mod get;
mod name;
pub mod network;
pub mod wait;

pub use clients::{ClusterClient, InfrastructureClient, Workstation};
pub use create::{
    CreateCluster, CreateClusterRequest, CreationReport, CreationState, CreationStep,
    KubeconfigRequest,
};
pub use delete::{
    CategoryPolicy, DeleteCluster, DeleteClusterRequest, DeletionStrategy, FailurePolicy,
    DELETION_POLICY,
};
pub use eksflow_model::DeletionLedger;
pub use error::{Error, Resources, Result};
pub use get::{get_clusters, GetClustersRequest};
pub use name::resolve_name;
pub use network::{NetworkRequest, NetworkStrategy};
