/*!

Bounded polling used to wait for a cluster to become usable. Each wait polls its probe every
[`POLL_INTERVAL`] until the probe succeeds or the timeout expires. A probe that fails is logged
and polled again; only the timeout ends a wait with an error.

!*/

use crate::clients::{ClientError, ClientResult, ClusterClient};
use crate::error::{self, Result};
use log::{debug, info};
use snafu::OptionExt;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

pub const POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Waits until the API server of the cluster answers and reports itself healthy.
pub async fn wait_for_control_plane<C>(cluster: &C, timeout: Duration) -> Result<()>
where
    C: ClusterClient,
{
    info!("Waiting for the control plane to become ready");
    poll_until("the control plane to become ready", timeout, || {
        cluster.control_plane_ready()
    })
    .await?;
    info!("The control plane is ready");
    Ok(())
}

/// Waits until at least `min_nodes` nodes report `Ready`. Returns immediately when `min_nodes`
/// is 0.
pub async fn wait_for_nodes<C>(cluster: &C, min_nodes: usize, timeout: Duration) -> Result<()>
where
    C: ClusterClient,
{
    if min_nodes == 0 {
        return Ok(());
    }
    info!("Waiting for at least {} node(s) to become ready", min_nodes);
    poll_until(
        &format!("at least {} node(s) to become ready", min_nodes),
        timeout,
        || async move {
            let ready = cluster.ready_node_count().await?;
            debug!("{} of at least {} node(s) are ready", ready, min_nodes);
            Ok::<_, ClientError>(ready >= min_nodes)
        },
    )
    .await?;
    info!("At least {} node(s) are ready", min_nodes);
    Ok(())
}

async fn poll_until<F, Fut>(what: &str, timeout: Duration, mut probe: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ClientResult<bool>>,
{
    tokio::time::timeout(timeout, async {
        loop {
            match probe().await {
                Ok(true) => return,
                Ok(false) => debug!("Still waiting for {}", what),
                Err(e) => debug!("Error while waiting for {}: {}", what, e),
            }
            sleep(POLL_INTERVAL).await;
        }
    })
    .await
    .ok()
    .context(error::TimeoutSnafu {
        what,
        duration: timeout,
    })
}
