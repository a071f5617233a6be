use crate::parse::parse_duration;
use anyhow::{ensure, Context, Result};
use clap::Parser;
use eksflow_model::constants::DEFAULT_WAIT_TIMEOUT;
use eksflow_orchestrator::wait::wait_for_nodes;
use eksflow_providers::KubeCluster;
use std::path::PathBuf;
use std::time::Duration;

/// Wait for the nodes of an existing cluster to become ready.
#[derive(Debug, Parser)]
pub(crate) struct WaitNodes {
    /// The kubeconfig of the cluster.
    #[clap(long, default_value = "kubeconfig")]
    kubeconfig: PathBuf,

    /// The number of nodes that must be ready.
    #[clap(long, short = 'm', default_value = "2")]
    nodes_min: usize,

    /// How long to wait, e.g. `20m`.
    #[clap(long, parse(try_from_str = parse_duration))]
    timeout: Option<Duration>,
}

impl WaitNodes {
    pub(crate) async fn run(self) -> Result<()> {
        ensure!(
            self.kubeconfig.is_file(),
            "--kubeconfig must point to an existing file, '{}' does not exist",
            self.kubeconfig.display()
        );
        let cluster = KubeCluster::from_kubeconfig_path(&self.kubeconfig)
            .await
            .context(format!(
                "Unable to create a client from '{}'",
                self.kubeconfig.display()
            ))?;
        wait_for_nodes(
            &cluster,
            self.nodes_min,
            self.timeout.unwrap_or(DEFAULT_WAIT_TIMEOUT),
        )
        .await?;
        Ok(())
    }
}
