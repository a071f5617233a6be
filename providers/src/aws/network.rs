use crate::error::{self, Result};
use aws_sdk_ec2::model::{Filter, Subnet};
use eksflow_model::{ExternalNetwork, Ipv4Cidr, SubnetDescription, SubnetTopology};
use log::debug;
use snafu::{ensure, OptionExt, ResultExt};
use std::collections::{BTreeMap, BTreeSet};

/// Subnets of externally managed clusters are tagged with the cluster name and their role.
const TAG_KUBERNETES_CLUSTER: &str = "KubernetesCluster";
const TAG_SUBNET_TYPE: &str = "SubnetType";

pub(crate) async fn availability_zones(ec2: &aws_sdk_ec2::Client) -> Result<Vec<String>> {
    let output = ec2
        .describe_availability_zones()
        .filters(Filter::builder().name("state").values("available").build())
        .send()
        .await
        .context(error::AvailabilityZonesSnafu)?;
    let mut zones: Vec<String> = output
        .availability_zones()
        .unwrap_or_default()
        .iter()
        .filter_map(|zone| zone.zone_name())
        .map(str::to_string)
        .collect();
    zones.sort();
    Ok(zones)
}

pub(crate) async fn describe_subnets(
    ec2: &aws_sdk_ec2::Client,
    ids: &[String],
) -> Result<Vec<SubnetDescription>> {
    let output = ec2
        .describe_subnets()
        .set_subnet_ids(Some(ids.to_vec()))
        .send()
        .await
        .context(error::DescribeSubnetsSnafu)?;
    output
        .subnets()
        .unwrap_or_default()
        .iter()
        .map(subnet_description)
        .collect()
}

/// Finds the subnets tagged for `reference` and the single VPC they live in.
pub(crate) async fn external_network(
    ec2: &aws_sdk_ec2::Client,
    reference: &str,
) -> Result<ExternalNetwork> {
    let output = ec2
        .describe_subnets()
        .filters(
            Filter::builder()
                .name(format!("tag:{}", TAG_KUBERNETES_CLUSTER))
                .values(reference)
                .build(),
        )
        .send()
        .await
        .context(error::DescribeSubnetsSnafu)?;
    let found = output.subnets().unwrap_or_default();
    ensure!(
        !found.is_empty(),
        error::ExternalNetworkNotFoundSnafu { reference }
    );

    let mut subnets: BTreeMap<SubnetTopology, Vec<SubnetDescription>> = BTreeMap::new();
    let mut vpc_ids = BTreeSet::new();
    for subnet in found {
        let description = subnet_description(subnet)?;
        vpc_ids.insert(description.vpc_id.clone());
        match subnet_topology(subnet) {
            Some(topology) => subnets.entry(topology).or_default().push(description),
            None => debug!(
                "Ignoring subnet '{}' without a known '{}' tag",
                description.id, TAG_SUBNET_TYPE
            ),
        }
    }
    ensure!(
        vpc_ids.len() == 1,
        error::ExternalNetworkVpcsSnafu {
            reference,
            vpc_ids: vpc_ids.into_iter().collect::<Vec<_>>(),
        }
    );
    let vpc_id = vpc_ids
        .into_iter()
        .next()
        .context(error::SubnetDataSnafu { what: "VpcId" })?;
    let vpc_cidr = vpc_cidr(ec2, &vpc_id).await?;
    Ok(ExternalNetwork {
        vpc_id,
        vpc_cidr,
        subnets,
    })
}

async fn vpc_cidr(ec2: &aws_sdk_ec2::Client, vpc_id: &str) -> Result<Option<Ipv4Cidr>> {
    let output = ec2
        .describe_vpcs()
        .vpc_ids(vpc_id)
        .send()
        .await
        .context(error::DescribeVpcSnafu { vpc_id })?;
    output
        .vpcs()
        .and_then(|vpcs| vpcs.first())
        .and_then(|vpc| vpc.cidr_block())
        .map(parse_cidr)
        .transpose()
}

fn subnet_description(subnet: &Subnet) -> Result<SubnetDescription> {
    Ok(SubnetDescription {
        id: subnet
            .subnet_id()
            .context(error::SubnetDataSnafu { what: "SubnetId" })?
            .to_string(),
        vpc_id: subnet
            .vpc_id()
            .context(error::SubnetDataSnafu { what: "VpcId" })?
            .to_string(),
        availability_zone: subnet
            .availability_zone()
            .context(error::SubnetDataSnafu {
                what: "AvailabilityZone",
            })?
            .to_string(),
        cidr: subnet.cidr_block().map(parse_cidr).transpose()?,
    })
}

/// `Utility` is what older tooling called public subnets.
fn subnet_topology(subnet: &Subnet) -> Option<SubnetTopology> {
    let value = subnet
        .tags()
        .unwrap_or_default()
        .iter()
        .find(|tag| tag.key() == Some(TAG_SUBNET_TYPE))
        .and_then(|tag| tag.value())?;
    match value {
        "Private" => Some(SubnetTopology::Private),
        "Public" | "Utility" => Some(SubnetTopology::Public),
        _ => None,
    }
}

fn parse_cidr(input: &str) -> Result<Ipv4Cidr> {
    input.parse().context(error::CidrSnafu { input })
}
