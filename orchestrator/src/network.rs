/*!

Chooses how the cluster's network is obtained and binds the result into the cluster's
[`VpcSpec`]. Exactly one strategy applies:

- [`NetworkStrategy::Dedicated`]: nothing was given, so a new VPC is laid out across the
  requested or automatically selected availability zones.
- [`NetworkStrategy::Import`]: the VPC and subnets of an externally managed cluster are reused.
- [`NetworkStrategy::Explicit`]: the given subnet ids are used as they are.

Option conflicts are detected by [`NetworkRequest::strategy`] without calling the provider.

!*/

use crate::clients::InfrastructureClient;
use crate::error::{self, Resources, Result};
use eksflow_model::constants::{
    DEFAULT_AVAILABILITY_ZONE_COUNT, MIN_REQUIRED_AVAILABILITY_ZONES, MIN_REQUIRED_SUBNETS,
    MIN_SUBNET_BLOCKS,
};
use eksflow_model::{Ipv4Cidr, NodeGroupSpec, SubnetDescription, SubnetSpec, SubnetTopology, VpcSpec};
use log::{info, warn};
use snafu::{ensure, ResultExt};
use std::collections::{BTreeMap, BTreeSet};

const IMPORT_FLAG: &str = "--vpc-from-kops-cluster";
const ZONES_FLAG: &str = "--zones";
const SUBNETS_FLAG: &str = "--vpc-private-subnets/--vpc-public-subnets";

/// The network options of a create request.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NetworkRequest {
    /// The CIDR of a dedicated VPC. The default network is used when absent.
    pub cidr: Option<Ipv4Cidr>,
    pub availability_zones: Vec<String>,
    pub private_subnet_ids: Vec<String>,
    pub public_subnet_ids: Vec<String>,
    /// The name of an externally managed cluster whose network should be reused.
    pub import_reference: Option<String>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NetworkStrategy {
    Dedicated,
    Import,
    Explicit,
}

impl NetworkRequest {
    fn has_subnets(&self) -> bool {
        !self.private_subnet_ids.is_empty() || !self.public_subnet_ids.is_empty()
    }

    fn has_zones(&self) -> bool {
        !self.availability_zones.is_empty()
    }

    fn import_reference(&self) -> Option<&str> {
        self.import_reference
            .as_deref()
            .filter(|reference| !reference.is_empty())
    }

    /// Picks the strategy, failing with `ConfigConflict` if more than one was asked for.
    pub fn strategy(&self) -> Result<NetworkStrategy> {
        if self.import_reference().is_some() {
            ensure!(
                !self.has_zones(),
                error::ConfigConflictSnafu {
                    first: IMPORT_FLAG,
                    second: ZONES_FLAG,
                }
            );
            ensure!(
                !self.has_subnets(),
                error::ConfigConflictSnafu {
                    first: IMPORT_FLAG,
                    second: SUBNETS_FLAG,
                }
            );
            return Ok(NetworkStrategy::Import);
        }
        if self.has_subnets() {
            ensure!(
                !self.has_zones(),
                error::ConfigConflictSnafu {
                    first: SUBNETS_FLAG,
                    second: ZONES_FLAG,
                }
            );
            return Ok(NetworkStrategy::Explicit);
        }
        Ok(NetworkStrategy::Dedicated)
    }
}

/// Resolves the network for the cluster and binds it into `vpc`. Nothing is provisioned here; the
/// provider is only asked to describe what exists.
pub async fn resolve<I>(
    infra: &I,
    request: &NetworkRequest,
    node_group: &NodeGroupSpec,
    vpc: &mut VpcSpec,
) -> Result<NetworkStrategy>
where
    I: InfrastructureClient,
{
    let strategy = request.strategy()?;
    if strategy != NetworkStrategy::Dedicated && request.cidr.is_some() {
        warn!("--vpc-cidr is ignored because an existing network is used");
    }
    match strategy {
        NetworkStrategy::Dedicated => dedicated(infra, request, vpc).await?,
        NetworkStrategy::Import => {
            let reference = request.import_reference().unwrap_or_default();
            import(infra, reference, vpc).await?
        }
        NetworkStrategy::Explicit => explicit(infra, request, vpc).await?,
    }

    if node_group.private_networking {
        ensure!(
            !vpc.subnets(SubnetTopology::Private).is_empty(),
            error::InsufficientSubnetsSnafu {
                details: "none of the subnets are private, so private networking cannot be used",
            }
        );
    }

    if strategy != NetworkStrategy::Dedicated {
        warn!(
            "An existing VPC and subnets will be used; if the cluster does not work as expected, \
            review the configuration of the VPC and its subnets"
        );
    }
    Ok(strategy)
}

async fn dedicated<I>(infra: &I, request: &NetworkRequest, vpc: &mut VpcSpec) -> Result<()>
where
    I: InfrastructureClient,
{
    let zones = if request.has_zones() {
        let zones = distinct(request.availability_zones.iter().cloned());
        ensure!(
            zones.len() >= MIN_REQUIRED_AVAILABILITY_ZONES,
            error::InsufficientZonesSnafu {
                required: MIN_REQUIRED_AVAILABILITY_ZONES,
                found: zones.len(),
            }
        );
        zones
    } else {
        let available = infra.availability_zones().await.context(error::ClientSnafu {
            action: "list availability zones",
            resources: Resources::Clear,
        })?;
        let available = distinct(available.into_iter());
        ensure!(
            available.len() >= MIN_REQUIRED_AVAILABILITY_ZONES,
            error::InsufficientZonesSnafu {
                required: MIN_REQUIRED_AVAILABILITY_ZONES,
                found: available.len(),
            }
        );
        available
            .into_iter()
            .take(DEFAULT_AVAILABILITY_ZONE_COUNT)
            .collect()
    };
    info!("Setting availability zones to {:?}", zones);

    let cidr = request.cidr.unwrap_or(vpc.cidr);
    let blocks = cidr
        .split(MIN_SUBNET_BLOCKS.max(2 * zones.len()))
        .context(error::SubnetRangesSnafu)?;
    // Public subnets take the first blocks, private subnets the ones after them.
    let public = zones
        .iter()
        .zip(blocks.iter())
        .map(|(zone, block)| new_subnet(zone, *block))
        .collect();
    let private = zones
        .iter()
        .zip(blocks.iter().skip(zones.len()))
        .map(|(zone, block)| new_subnet(zone, *block))
        .collect();

    vpc.id = None;
    vpc.cidr = cidr;
    vpc.availability_zones = zones;
    vpc.subnets = BTreeMap::from([
        (SubnetTopology::Public, public),
        (SubnetTopology::Private, private),
    ]);
    Ok(())
}

async fn import<I>(infra: &I, reference: &str, vpc: &mut VpcSpec) -> Result<()>
where
    I: InfrastructureClient,
{
    let network = infra
        .external_network(reference)
        .await
        .context(error::ClientSnafu {
            action: format!("import the network of cluster '{}'", reference),
            resources: Resources::Clear,
        })?;
    info!(
        "Using VPC '{}' of cluster '{}'",
        network.vpc_id, reference
    );
    vpc.id = Some(network.vpc_id);
    if let Some(cidr) = network.vpc_cidr {
        vpc.cidr = cidr;
    }
    bind(vpc, network.subnets);
    Ok(())
}

async fn explicit<I>(infra: &I, request: &NetworkRequest, vpc: &mut VpcSpec) -> Result<()>
where
    I: InfrastructureClient,
{
    let ids: Vec<String> = request
        .private_subnet_ids
        .iter()
        .chain(request.public_subnet_ids.iter())
        .cloned()
        .collect();
    let described = infra
        .describe_subnets(&ids)
        .await
        .context(error::ClientSnafu {
            action: "describe subnets",
            resources: Resources::Clear,
        })?;

    let vpc_ids: BTreeSet<&str> = described.iter().map(|s| s.vpc_id.as_str()).collect();
    ensure!(
        vpc_ids.len() <= 1,
        error::InvalidNetworkSnafu {
            details: format!(
                "all subnets must belong to the same VPC, found {:?}",
                vpc_ids
            ),
        }
    );
    let vpc_id = vpc_ids.into_iter().next().map(str::to_string);

    let mut subnets = BTreeMap::new();
    for (topology, requested) in [
        (SubnetTopology::Private, &request.private_subnet_ids),
        (SubnetTopology::Public, &request.public_subnet_ids),
    ] {
        let mut bound = Vec::new();
        for id in requested {
            let subnet = described
                .iter()
                .find(|subnet| &subnet.id == id)
                .cloned()
                .ok_or_else(|| {
                    error::InvalidNetworkSnafu {
                        details: format!("subnet '{}' was not found", id),
                    }
                    .build()
                })?;
            bound.push(subnet);
        }
        subnets.insert(topology, bound);
    }

    vpc.id = vpc_id;
    bind(vpc, subnets);
    ensure!(
        vpc.has_sufficient_subnets(SubnetTopology::Private)
            || vpc.has_sufficient_subnets(SubnetTopology::Public),
        error::InsufficientSubnetsSnafu {
            details: format!(
                "at least {} public or {} private subnets are required, got {} public and {} private",
                MIN_REQUIRED_SUBNETS,
                MIN_REQUIRED_SUBNETS,
                vpc.subnets(SubnetTopology::Public).len(),
                vpc.subnets(SubnetTopology::Private).len()
            ),
        }
    );
    Ok(())
}

/// Binds described subnets into the VPC and derives the zone list from them.
fn bind(vpc: &mut VpcSpec, subnets: BTreeMap<SubnetTopology, Vec<SubnetDescription>>) {
    let zones = distinct(
        subnets
            .values()
            .flatten()
            .map(|subnet| subnet.availability_zone.clone()),
    );
    vpc.subnets = subnets
        .into_iter()
        .map(|(topology, subnets)| {
            (
                topology,
                subnets.into_iter().map(SubnetSpec::from).collect(),
            )
        })
        .collect();
    vpc.availability_zones = zones;
}

fn new_subnet(zone: &str, cidr: Ipv4Cidr) -> SubnetSpec {
    SubnetSpec {
        id: None,
        availability_zone: Some(zone.to_string()),
        cidr: Some(cidr),
    }
}

/// Sorted, without duplicates.
fn distinct<T: Iterator<Item = String>>(values: T) -> Vec<String> {
    values.collect::<BTreeSet<_>>().into_iter().collect()
}
