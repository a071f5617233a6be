use crate::clients::InfrastructureClient;
use crate::error::{self, Resources, Result};
use crate::name::resolve_name;
use eksflow_model::{ClusterSummary, ProviderConfig};
use log::warn;
use snafu::{ensure, ResultExt};

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct GetClustersRequest {
    pub name_flag: Option<String>,
    pub name_argument: Option<String>,
    pub all_regions: bool,
    /// Whether `--region` was given explicitly.
    pub region_given: bool,
    /// Page size for list calls. 0 means no limit.
    pub chunk_size: usize,
}

/// Lists one named cluster or all clusters, in the configured region or in every supported
/// region. Rendering is left to the caller.
pub async fn get_clusters<I>(
    infra: &I,
    provider: &ProviderConfig,
    request: &GetClustersRequest,
) -> Result<Vec<ClusterSummary>>
where
    I: InfrastructureClient,
{
    ensure!(
        infra.is_supported_region(),
        error::UnsupportedRegionSnafu {
            region: &provider.region,
        }
    );
    if request.all_regions && request.region_given {
        warn!("--region={} is ignored, as --all-regions is given", provider.region);
    }
    let name = resolve_name(
        request.name_flag.as_deref(),
        request.name_argument.as_deref(),
    )?;
    if let Some(name) = &name {
        ensure!(
            !request.all_regions,
            error::ConfigConflictSnafu {
                first: format!("--name={}", name),
                second: "--all-regions",
            }
        );
    }
    infra.check_auth().await.context(error::AuthSnafu)?;
    infra
        .list_clusters(name.as_deref(), request.chunk_size, request.all_regions)
        .await
        .context(error::ClientSnafu {
            action: "list clusters",
            resources: Resources::Clear,
        })
}
