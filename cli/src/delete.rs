use crate::parse::parse_duration;
use crate::provider::ProviderArgs;
use crate::workflow_error;
use anyhow::{Context, Result};
use clap::Parser;
use eksflow_orchestrator::{DeleteCluster, DeleteClusterRequest};
use eksflow_providers::{AwsInfrastructure, LocalWorkstation};
use std::time::Duration;

#[derive(Debug, Parser)]
pub(crate) enum Delete {
    /// Delete a cluster and everything created for it.
    Cluster(DeleteClusterArgs),
}

impl Delete {
    pub(crate) async fn run(self) -> Result<()> {
        match self {
            Delete::Cluster(args) => args.run().await,
        }
    }
}

#[derive(Debug, Parser)]
pub(crate) struct DeleteClusterArgs {
    /// The name of the cluster.
    #[clap(value_name = "NAME")]
    name_argument: Option<String>,

    /// The name of the cluster, as a flag.
    #[clap(long, short = 'n')]
    name: Option<String>,

    #[clap(flatten)]
    provider: ProviderArgs,

    /// Wait for each deletion to finish.
    #[clap(long, short = 'w')]
    wait: bool,

    /// How long to wait for each deletion, e.g. `25m`.
    #[clap(long, alias = "aws-api-timeout", parse(try_from_str = parse_duration))]
    timeout: Option<Duration>,
}

impl DeleteClusterArgs {
    fn request(&self) -> DeleteClusterRequest {
        DeleteClusterRequest {
            name_flag: self.name.clone(),
            name_argument: self.name_argument.clone(),
            wait: self.wait,
        }
    }

    async fn run(self) -> Result<()> {
        let provider = self.provider.config(self.timeout);
        let request = self.request();
        let workstation = LocalWorkstation::new().context("Unable to locate the kubeconfig")?;
        let infra = AwsInfrastructure::new(&provider).await;
        let ledger = DeleteCluster::new(&provider.region, &infra, &workstation)
            .run(&request)
            .await
            .map_err(|e| {
                workflow_error(
                    e,
                    &provider.region,
                    request
                        .name_flag
                        .as_deref()
                        .or(request.name_argument.as_deref()),
                )
            })?;
        if ledger.is_empty() {
            println!("Nothing was found to delete");
        }
        for entry in ledger.entries() {
            println!("Deleted {}", entry);
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn name_and_wait() {
        let args =
            DeleteClusterArgs::try_parse_from(["delete-cluster", "--name=dev", "-w"]).unwrap();
        let request = args.request();
        assert_eq!(request.name_flag.as_deref(), Some("dev"));
        assert_eq!(request.name_argument, None);
        assert!(request.wait);
    }

    #[test]
    fn timeout() {
        let args =
            DeleteClusterArgs::try_parse_from(["delete-cluster", "dev", "--timeout=1h"]).unwrap();
        assert_eq!(args.request().name_argument.as_deref(), Some("dev"));
        assert_eq!(
            args.provider.config(args.timeout).wait_timeout,
            Duration::from_secs(3600)
        );
    }
}
