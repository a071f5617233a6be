/*!

Implementations of the `eksflow-orchestrator` client traits:

- [`AwsInfrastructure`] provisions clusters with CloudFormation on AWS.
- [`KubeCluster`] talks to the API server of a running cluster.
- [`LocalWorkstation`] manages kubeconfig files and checks for client tools on the local machine.

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

pub mod aws;
pub mod cluster;
pub mod error;
pub mod workstation;

pub use aws::AwsInfrastructure;
pub use cluster::KubeCluster;
pub use error::{Error, Result};
pub use workstation::LocalWorkstation;
