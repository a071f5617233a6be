use std::time::Duration;

/// Helper macro to avoid retyping the base domain-like name of the tool when creating further
/// string constants from it. When given no parameters, this returns the base domain-like name.
/// When given a string literal parameter it adds `/parameter` to the end.
macro_rules! eksflow {
    () => {
        "eksflow.io"
    };
    ($s:literal) => {
        concat!(eksflow!(), "/", $s)
    };
}

// System identifiers
pub const TOOL_NAME: &str = "eksflow";
pub const DOMAIN: &str = eksflow!();

// Tag keys placed on everything the tool creates
pub const TAG_CLUSTER_NAME: &str = eksflow!("cluster-name");
pub const TAG_NODE_GROUP_NAME: &str = eksflow!("nodegroup-name");
pub const TAG_CREATED_BY: &str = eksflow!("created-by");

// Defaults
pub const DEFAULT_REGION: &str = "us-west-2";
pub const DEFAULT_KUBERNETES_VERSION: &str = "1.24";
pub const DEFAULT_NODE_TYPE: &str = "m5.large";
pub const DEFAULT_NODE_COUNT: u32 = 2;
pub const DEFAULT_SSH_PUBLIC_KEY: &str = "~/.ssh/id_rsa.pub";
pub const DEFAULT_VPC_CIDR: &str = "192.168.0.0/16";
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(20 * 60);
pub const DEFAULT_CHUNK_SIZE: usize = 100;

// Networking
pub const MIN_REQUIRED_AVAILABILITY_ZONES: usize = 2;
pub const DEFAULT_AVAILABILITY_ZONE_COUNT: usize = 3;
pub const MIN_REQUIRED_SUBNETS: usize = 2;
/// Dedicated networks are split into at least this many equally sized blocks.
pub const MIN_SUBNET_BLOCKS: usize = 8;

/// Regions where the managed Kubernetes service is offered.
pub const SUPPORTED_REGIONS: &[&str] = &[
    "us-west-2",
    "us-east-1",
    "us-east-2",
    "eu-central-1",
    "eu-north-1",
    "eu-west-1",
    "eu-west-2",
    "eu-west-3",
    "ap-northeast-1",
    "ap-northeast-2",
    "ap-south-1",
    "ap-southeast-1",
    "ap-southeast-2",
];

pub const GPU_INSTANCE_FAMILIES: &[&str] = &["p2", "p3", "p3dn", "p4d", "g3", "g3s", "g4dn", "g5"];
/// AMD GPU families. No EKS optimized image carries their drivers.
pub const AMD_GPU_INSTANCE_FAMILIES: &[&str] = &["g4ad"];

// Kubeconfig
pub const KUBECONFIG_ENV: &str = "KUBECONFIG";
pub const AUTHENTICATOR_COMMAND: &str = "aws";
