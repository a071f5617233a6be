use crate::parse::{parse_duration, parse_key_val};
use crate::provider::ProviderArgs;
use crate::workflow_error;
use anyhow::{Context, Result};
use clap::Parser;
use eksflow_model::constants::{
    DEFAULT_KUBERNETES_VERSION, DEFAULT_NODE_TYPE, DEFAULT_SSH_PUBLIC_KEY,
};
use eksflow_model::{Addons, ImageFamily, Ipv4Cidr, MachineImage, NodeGroupSpec};
use eksflow_orchestrator::{
    CreateCluster, CreateClusterRequest, KubeconfigRequest, NetworkRequest,
};
use eksflow_providers::{AwsInfrastructure, LocalWorkstation};
use log::info;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Parser)]
pub(crate) enum Create {
    /// Create a cluster with one node group.
    Cluster(CreateClusterArgs),
}

impl Create {
    pub(crate) async fn run(self) -> Result<()> {
        match self {
            Create::Cluster(args) => args.run().await,
        }
    }
}

#[derive(Debug, Parser)]
#[clap(disable_version_flag = true)]
pub(crate) struct CreateClusterArgs {
    /// The name of the cluster. A random name is generated when none is given.
    #[clap(value_name = "NAME")]
    name_argument: Option<String>,

    /// The name of the cluster, as a flag.
    #[clap(long, short = 'n')]
    name: Option<String>,

    #[clap(flatten)]
    provider: ProviderArgs,

    /// Tags for all resources, e.g. `--tags=team=storage,env=dev`.
    #[clap(long, use_value_delimiter = true, parse(try_from_str = parse_key_val))]
    tags: Vec<(String, String)>,

    /// The Kubernetes version.
    #[clap(long, default_value = DEFAULT_KUBERNETES_VERSION)]
    version: String,

    /// The instance type of the nodes.
    #[clap(long, short = 't', default_value = DEFAULT_NODE_TYPE)]
    node_type: String,

    /// The desired number of nodes.
    #[clap(long, short = 'N', default_value = "2")]
    nodes: u32,

    /// The minimum number of nodes. Defaults to `--nodes`.
    #[clap(long, short = 'm')]
    nodes_min: Option<u32>,

    /// The maximum number of nodes. Defaults to `--nodes`.
    #[clap(long, short = 'M')]
    nodes_max: Option<u32>,

    /// The root volume size of the nodes in GiB.
    #[clap(long)]
    node_volume_size: Option<u32>,

    /// The maximum number of pods per node.
    #[clap(long)]
    max_pods_per_node: Option<u32>,

    /// Availability zones to use, e.g. `--zones=us-west-2a,us-west-2b`.
    #[clap(long, use_value_delimiter = true)]
    zones: Vec<String>,

    /// Allow SSH access to the nodes.
    #[clap(long)]
    ssh_access: bool,

    /// A public key file to import, or the name of an existing key pair.
    #[clap(long, default_value = DEFAULT_SSH_PUBLIC_KEY)]
    ssh_public_key: String,

    /// Write a kubeconfig for the cluster.
    #[clap(long, default_value = "true", parse(try_from_str))]
    write_kubeconfig: bool,

    /// Write the kubeconfig to a file of its own under `~/.kube/eksflow/clusters`.
    #[clap(long)]
    auto_kubeconfig: bool,

    /// The kubeconfig file to write to. Defaults to the first file in `KUBECONFIG`, or
    /// `~/.kube/config`.
    #[clap(long)]
    kubeconfig: Option<PathBuf>,

    /// Make the new cluster's context the current context.
    #[clap(long, default_value = "true", parse(try_from_str))]
    set_kubeconfig_context: bool,

    /// How long to wait for each long-running step, e.g. `25m`.
    #[clap(long, alias = "aws-api-timeout", parse(try_from_str = parse_duration))]
    timeout: Option<Duration>,

    /// Grant the nodes full access to the container registry.
    #[clap(long)]
    full_ecr_access: bool,

    /// Grant the nodes access to the auto scaling API.
    #[clap(long)]
    asg_access: bool,

    /// Create a default gp2 storage class.
    #[clap(long, default_value = "true", parse(try_from_str))]
    storage_class: bool,

    /// The machine image of the nodes, `static` to look it up, or an image id.
    #[clap(long, default_value = "static")]
    node_ami: MachineImage,

    /// The operating system family of the node image [AmazonLinux2|Ubuntu2004|Ubuntu1804].
    #[clap(long, default_value = "AmazonLinux2")]
    node_ami_family: ImageFamily,

    /// Reuse the network of an existing cluster, found through its subnet tags.
    #[clap(long, alias = "vpc-from-existing")]
    vpc_from_kops_cluster: Option<String>,

    /// The CIDR of a dedicated VPC.
    #[clap(long)]
    vpc_cidr: Option<Ipv4Cidr>,

    /// Existing private subnets to use.
    #[clap(long, use_value_delimiter = true)]
    vpc_private_subnets: Vec<String>,

    /// Existing public subnets to use.
    #[clap(long, use_value_delimiter = true)]
    vpc_public_subnets: Vec<String>,

    /// Place the nodes in private subnets.
    #[clap(long, short = 'P')]
    node_private_networking: bool,
}

impl CreateClusterArgs {
    fn request(&self) -> CreateClusterRequest {
        CreateClusterRequest {
            name_flag: self.name.clone(),
            name_argument: self.name_argument.clone(),
            version: self.version.clone(),
            tags: self.tags.iter().cloned().collect(),
            addons: Addons {
                storage_class: self.storage_class,
                full_ecr_access: self.full_ecr_access,
                asg_access: self.asg_access,
            },
            network: NetworkRequest {
                cidr: self.vpc_cidr,
                availability_zones: self.zones.clone(),
                private_subnet_ids: self.vpc_private_subnets.clone(),
                public_subnet_ids: self.vpc_public_subnets.clone(),
                import_reference: self.vpc_from_kops_cluster.clone(),
            },
            node_group: NodeGroupSpec {
                instance_type: self.node_type.clone(),
                desired_capacity: self.nodes,
                min_size: self.nodes_min,
                max_size: self.nodes_max,
                volume_size: self.node_volume_size,
                max_pods_per_node: self.max_pods_per_node,
                machine_image: self.node_ami.clone(),
                image_family: self.node_ami_family,
                ssh_public_key_path: self.ssh_public_key.clone(),
                allow_ssh: self.ssh_access,
                private_networking: self.node_private_networking,
                ..NodeGroupSpec::default()
            },
            kubeconfig: KubeconfigRequest {
                write: self.write_kubeconfig,
                path: self.kubeconfig.clone(),
                auto: self.auto_kubeconfig,
                set_context: self.set_kubeconfig_context,
            },
        }
    }

    async fn run(self) -> Result<()> {
        let provider = self.provider.config(self.timeout);
        let request = self.request();
        let workstation = LocalWorkstation::new().context("Unable to locate the kubeconfig")?;
        let infra = AwsInfrastructure::new(&provider).await;
        let report = CreateCluster::new(&provider, &infra, &workstation)
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
        info!(
            "Cluster '{}' in '{}' is ready",
            report.config.name(),
            report.config.region()
        );
        if let Some(path) = &report.kubeconfig {
            println!(
                "Cluster '{}' is ready, kubeconfig saved to '{}'",
                report.config.name(),
                path.display()
            );
        } else {
            println!("Cluster '{}' is ready", report.config.name());
        }
        Ok(())
    }
}
