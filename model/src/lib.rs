/*!

This library provides the data model shared by the `eksflow` orchestrator, its infrastructure
providers and the command line interface: cluster identity, provider and cluster configuration,
node group specifications, the deletion ledger, and a few networking helpers.

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

pub use access::{ClusterAccess, ExecAuthenticator};
pub use cidr::Ipv4Cidr;
pub use cluster::{
    Addons, ClusterConfig, ClusterIdentity, ClusterSummary, ExternalNetwork, ProviderConfig,
    SubnetDescription, SubnetSpec, SubnetTopology, VpcSpec,
};
pub use error::{Error, Result};
pub use ledger::{DeletionLedger, DeletionOutcome, LedgerEntry, ResourceCategory};
pub use names::generate_cluster_name;
pub use node_group::{ImageFamily, MachineImage, NodeGroupSpec};

mod access;
mod cidr;
mod cluster;
pub mod constants;
mod error;
mod ledger;
mod names;
mod node_group;

/// Returns `true` when the instance type belongs to a GPU-accelerated instance family. Nodes of
/// these types need the NVIDIA device plugin before GPU workloads can be scheduled.
pub fn is_gpu_instance_type(instance_type: &str) -> bool {
    let family = instance_type.split('.').next().unwrap_or_default();
    constants::GPU_INSTANCE_FAMILIES.contains(&family)
}

#[test]
fn gpu_instance_types() {
    assert!(is_gpu_instance_type("p2.xlarge"));
    assert!(is_gpu_instance_type("p3dn.24xlarge"));
    assert!(is_gpu_instance_type("g4dn.xlarge"));
    assert!(!is_gpu_instance_type("m5.large"));
    assert!(!is_gpu_instance_type("gp2"));
    assert!(!is_gpu_instance_type(""));
}
