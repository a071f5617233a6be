use crate::constants::{
    DEFAULT_KUBERNETES_VERSION, DEFAULT_REGION, DEFAULT_WAIT_TIMEOUT, MIN_REQUIRED_SUBNETS,
    SUPPORTED_REGIONS,
};
use crate::Ipv4Cidr;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// The name and region of a cluster. Built once per invocation.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ClusterIdentity {
    pub name: String,
    pub region: String,
}

impl ClusterIdentity {
    pub fn new<S1, S2>(name: S1, region: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self {
            name: name.into(),
            region: region.into(),
        }
    }

    /// The name used for the cluster entry of a kubeconfig, e.g. `dev.us-west-2.eksflow.io`.
    pub fn kubeconfig_cluster_name(&self) -> String {
        format!("{}.{}.{}", self.name, self.region, crate::constants::DOMAIN)
    }

    /// The name used for the user and context entries of a kubeconfig.
    pub fn kubeconfig_context_name(&self) -> String {
        format!(
            "{}@{}",
            crate::constants::TOOL_NAME,
            self.kubeconfig_cluster_name()
        )
    }
}

/// Settings that describe how to talk to the infrastructure provider.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProviderConfig {
    pub region: String,
    /// The named credential profile, if any. The default credential chain is used otherwise.
    pub profile: Option<String>,
    /// How long to wait for a long-running operation before giving up.
    pub wait_timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            profile: None,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }
}

impl ProviderConfig {
    pub fn new<S: Into<String>>(region: Option<S>, profile: Option<String>) -> Self {
        let region = region
            .map(Into::into)
            .filter(|region| !region.is_empty())
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        Self {
            region,
            profile: profile.filter(|profile| !profile.is_empty()),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, wait_timeout: Duration) -> Self {
        self.wait_timeout = wait_timeout;
        self
    }

    pub fn is_supported_region(&self) -> bool {
        SUPPORTED_REGIONS.contains(&self.region.as_str())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum SubnetTopology {
    Private,
    Public,
}

serde_plain::derive_display_from_serialize!(SubnetTopology);
serde_plain::derive_fromstr_from_deserialize!(SubnetTopology);

impl SubnetTopology {
    pub const ALL: [SubnetTopology; 2] = [SubnetTopology::Private, SubnetTopology::Public];
}

/// A subnet bound to the cluster. `id` is absent until the subnet exists.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubnetSpec {
    pub id: Option<String>,
    pub availability_zone: Option<String>,
    pub cidr: Option<Ipv4Cidr>,
}

/// The network the cluster lives in.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VpcSpec {
    /// The id of an existing VPC. `None` means a dedicated VPC will be created.
    pub id: Option<String>,
    pub cidr: Ipv4Cidr,
    pub availability_zones: Vec<String>,
    pub subnets: BTreeMap<SubnetTopology, Vec<SubnetSpec>>,
}

impl Default for VpcSpec {
    fn default() -> Self {
        Self {
            id: None,
            cidr: Ipv4Cidr::default(),
            availability_zones: Vec::new(),
            subnets: BTreeMap::new(),
        }
    }
}

impl VpcSpec {
    pub fn is_dedicated(&self) -> bool {
        self.id.is_none()
    }

    pub fn subnets(&self, topology: SubnetTopology) -> &[SubnetSpec] {
        self.subnets
            .get(&topology)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The ids of the bound subnets of the given topology.
    pub fn subnet_ids(&self, topology: SubnetTopology) -> Vec<String> {
        self.subnets(topology)
            .iter()
            .filter_map(|subnet| subnet.id.clone())
            .collect()
    }

    /// Whether enough subnets of the given topology are bound for the control plane to span
    /// more than one availability zone.
    pub fn has_sufficient_subnets(&self, topology: SubnetTopology) -> bool {
        self.subnets(topology).len() >= MIN_REQUIRED_SUBNETS
    }
}

/// Optional cluster features.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Addons {
    /// Create a default `gp2` storage class once the cluster is up.
    pub storage_class: bool,
    /// Grant nodes full access to the container registry.
    pub full_ecr_access: bool,
    /// Grant nodes access to the auto scaling API.
    pub asg_access: bool,
}

impl Default for Addons {
    fn default() -> Self {
        Self {
            storage_class: true,
            full_ecr_access: false,
            asg_access: false,
        }
    }
}

/// The cluster as requested by the user. Only network resolution may change it, and only before
/// anything is provisioned.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfig {
    pub identity: ClusterIdentity,
    pub version: String,
    pub vpc: VpcSpec,
    pub tags: BTreeMap<String, String>,
    pub addons: Addons,
}

impl ClusterConfig {
    pub fn new(identity: ClusterIdentity) -> Self {
        Self {
            identity,
            version: DEFAULT_KUBERNETES_VERSION.to_string(),
            vpc: VpcSpec::default(),
            tags: BTreeMap::new(),
            addons: Addons::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.identity.name
    }

    pub fn region(&self) -> &str {
        &self.identity.region
    }
}

/// An existing subnet as reported by the provider.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubnetDescription {
    pub id: String,
    pub vpc_id: String,
    pub availability_zone: String,
    pub cidr: Option<Ipv4Cidr>,
}

impl From<SubnetDescription> for SubnetSpec {
    fn from(subnet: SubnetDescription) -> Self {
        Self {
            id: Some(subnet.id),
            availability_zone: Some(subnet.availability_zone),
            cidr: subnet.cidr,
        }
    }
}

/// The network of an externally managed cluster, ready to be reused.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalNetwork {
    pub vpc_id: String,
    pub vpc_cidr: Option<Ipv4Cidr>,
    pub subnets: BTreeMap<SubnetTopology, Vec<SubnetDescription>>,
}

/// A row in the output of `get cluster`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSummary {
    pub name: String,
    pub region: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::constants::DEFAULT_VPC_CIDR;

    #[test]
    fn kubeconfig_names() {
        let identity = ClusterIdentity::new("dev", "us-east-1");
        assert_eq!(identity.kubeconfig_cluster_name(), "dev.us-east-1.eksflow.io");
        assert_eq!(
            identity.kubeconfig_context_name(),
            "eksflow@dev.us-east-1.eksflow.io"
        );
    }

    #[test]
    fn provider_config_defaults() {
        let config = ProviderConfig::new(Some(""), Some(String::new()));
        assert_eq!(config.region, "us-west-2");
        assert_eq!(config.profile, None);
        assert!(config.is_supported_region());
        assert!(!ProviderConfig::new(Some("mars-north-1"), None).is_supported_region());
    }

    #[test]
    fn default_vpc() {
        let vpc = VpcSpec::default();
        assert!(vpc.is_dedicated());
        assert_eq!(vpc.cidr.to_string(), DEFAULT_VPC_CIDR);
        assert!(vpc.subnets(SubnetTopology::Private).is_empty());
        assert!(!vpc.has_sufficient_subnets(SubnetTopology::Public));
    }

    #[test]
    fn topology_plain_strings() {
        assert_eq!(SubnetTopology::Private.to_string(), "Private");
        assert_eq!(
            "Public".parse::<SubnetTopology>().unwrap(),
            SubnetTopology::Public
        );
    }

    #[test]
    fn cluster_config_yaml() {
        let config = ClusterConfig::new(ClusterIdentity::new("dev", "us-west-2"));
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: ClusterConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, config);
        assert!(parsed.addons.storage_class);
    }
}
