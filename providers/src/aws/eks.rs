use crate::error::{self, Result};
use aws_sdk_eks::error::{DeleteClusterErrorKind, DescribeClusterErrorKind};
use aws_sdk_eks::model::Cluster;
use aws_sdk_eks::types::SdkError;
use eksflow_model::ClusterSummary;
use log::{debug, info};
use snafu::{OptionExt, ResultExt};

/// The service never returns more than this many clusters per page.
const MAX_PAGE_SIZE: i32 = 100;

/// Describes the cluster. A missing cluster is reported as [`error::Error::ClusterNotFound`].
pub(crate) async fn describe(eks: &aws_sdk_eks::Client, name: &str) -> Result<Cluster> {
    match eks.describe_cluster().name(name).send().await {
        Ok(output) => output
            .cluster()
            .cloned()
            .context(error::ClusterNotFoundSnafu { cluster: name }),
        Err(SdkError::ServiceError(service_error))
            if matches!(
                service_error.err().kind,
                DescribeClusterErrorKind::ResourceNotFoundException(_)
            ) =>
        {
            error::ClusterNotFoundSnafu { cluster: name }.fail()
        }
        Err(e) => Err(e).context(error::DescribeClusterSnafu { cluster: name }),
    }
}

/// Deletes a cluster through the service API. Used for control planes that were not created by a
/// stack.
pub(crate) async fn delete(eks: &aws_sdk_eks::Client, name: &str) -> Result<()> {
    info!("Deleting control plane '{}'", name);
    match eks.delete_cluster().name(name).send().await {
        Ok(_) => Ok(()),
        Err(SdkError::ServiceError(service_error))
            if matches!(
                service_error.err().kind,
                DeleteClusterErrorKind::ResourceNotFoundException(_)
            ) =>
        {
            error::ClusterNotFoundSnafu { cluster: name }.fail()
        }
        Err(e) => Err(e).context(error::DeleteClusterSnafu { cluster: name }),
    }
}

/// Lists the clusters of one region, or describes the one named.
pub(crate) async fn list(
    eks: &aws_sdk_eks::Client,
    region: &str,
    name: Option<&str>,
    chunk_size: usize,
) -> Result<Vec<ClusterSummary>> {
    let names = match name {
        Some(name) => vec![name.to_string()],
        None => list_names(eks, region, chunk_size).await?,
    };
    let mut summaries = Vec::with_capacity(names.len());
    for name in names {
        let cluster = describe(eks, &name).await?;
        summaries.push(summary(&name, region, &cluster));
    }
    Ok(summaries)
}

async fn list_names(
    eks: &aws_sdk_eks::Client,
    region: &str,
    chunk_size: usize,
) -> Result<Vec<String>> {
    let page_size = (chunk_size > 0)
        .then(|| i32::try_from(chunk_size).unwrap_or(MAX_PAGE_SIZE).min(MAX_PAGE_SIZE));
    let mut names = Vec::new();
    let mut next_token: Option<String> = None;
    loop {
        let output = eks
            .list_clusters()
            .set_max_results(page_size)
            .set_next_token(next_token.take())
            .send()
            .await
            .context(error::ListClustersSnafu { region })?;
        names.extend(output.clusters().unwrap_or_default().iter().cloned());
        match output.next_token() {
            Some(token) => next_token = Some(token.to_string()),
            None => break,
        }
    }
    debug!("Found {} clusters in '{}'", names.len(), region);
    Ok(names)
}

fn summary(name: &str, region: &str, cluster: &Cluster) -> ClusterSummary {
    ClusterSummary {
        name: cluster.name().unwrap_or(name).to_string(),
        region: region.to_string(),
        status: cluster
            .status()
            .map(|status| status.as_str().to_string())
            .unwrap_or_else(|| "UNKNOWN".to_string()),
        version: cluster.version().map(str::to_string),
        endpoint: cluster.endpoint().map(str::to_string),
    }
}

/// The endpoint and base64 encoded certificate authority of an active cluster.
pub(crate) fn endpoint_and_authority(name: &str, cluster: &Cluster) -> Result<(String, String)> {
    let endpoint = cluster
        .endpoint()
        .context(error::ClusterDataSnafu {
            cluster: name,
            what: "endpoint",
        })?
        .to_string();
    let authority = cluster
        .certificate_authority()
        .and_then(|authority| authority.data())
        .context(error::ClusterDataSnafu {
            cluster: name,
            what: "certificate authority",
        })?
        .to_string();
    Ok((endpoint, authority))
}
