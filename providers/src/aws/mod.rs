/*!

The [`InfrastructureClient`] for AWS. The cluster is one CloudFormation stack holding the network,
the service role and the EKS control plane; every node group is a stack of its own. Machine images
come from public SSM parameters and SSH keys are imported as EC2 key pairs.

!*/

mod config;
mod eks;
mod image;
mod network;
mod ssh;
pub mod stack;
pub mod template;

pub use config::{sdk_config, sdk_config_for_region};

use crate::cluster::KubeCluster;
use crate::error::{self, Result};
use async_trait::async_trait;
use aws_types::SdkConfig;
use eksflow_model::constants::{
    AUTHENTICATOR_COMMAND, SUPPORTED_REGIONS, TAG_CLUSTER_NAME, TAG_CREATED_BY,
    TAG_NODE_GROUP_NAME, TOOL_NAME,
};
use eksflow_model::{
    ClusterAccess, ClusterConfig, ClusterIdentity, ClusterSummary, ExecAuthenticator,
    ExternalNetwork, NodeGroupSpec, ProviderConfig, SubnetDescription,
};
use eksflow_orchestrator::clients::{ClientError, ClientResult};
use eksflow_orchestrator::InfrastructureClient;
use futures::future::join_all;
use log::{debug, info};
use maplit::btreemap;
use snafu::ResultExt;
use stack::{
    cluster_stack_name, node_group_stack_name, node_group_stack_prefix, LegacyStack, StackManager,
};
use std::collections::BTreeMap;
use template::{ClusterStackOutputs, OUTPUT_INSTANCE_ROLE_ARN};

/// Provisions and removes clusters in the region of its [`ProviderConfig`].
#[derive(Clone, Debug)]
pub struct AwsInfrastructure {
    provider: ProviderConfig,
    stacks: StackManager,
    ec2: aws_sdk_ec2::Client,
    eks: aws_sdk_eks::Client,
    ssm: aws_sdk_ssm::Client,
    sts: aws_sdk_sts::Client,
}

impl AwsInfrastructure {
    pub async fn new(provider: &ProviderConfig) -> Self {
        Self::from_sdk_config(provider, &sdk_config(provider).await)
    }

    pub fn from_sdk_config(provider: &ProviderConfig, sdk: &SdkConfig) -> Self {
        Self {
            provider: provider.clone(),
            stacks: StackManager::new(
                aws_sdk_cloudformation::Client::new(sdk),
                provider.wait_timeout,
            ),
            ec2: aws_sdk_ec2::Client::new(sdk),
            eks: aws_sdk_eks::Client::new(sdk),
            ssm: aws_sdk_ssm::Client::new(sdk),
            sts: aws_sdk_sts::Client::new(sdk),
        }
    }

    async fn create_node_group(
        &self,
        config: &ClusterConfig,
        node_group: &NodeGroupSpec,
        cluster: &ClusterStackOutputs,
    ) -> Result<()> {
        let image_id = match node_group.machine_image.id() {
            Some(id) => id.to_string(),
            None => image::resolve(&self.ssm, &config.version, node_group).await?,
        };
        let mut tags = stack_tags(config);
        tags.insert(TAG_NODE_GROUP_NAME.to_string(), node_group.name.clone());
        self.stacks
            .create(
                &node_group_stack_name(config.name(), &node_group.name),
                &template::node_group_template(config, node_group, &image_id, cluster),
                &tags,
            )
            .await?;
        Ok(())
    }

    async fn create_cluster_stack(&self, config: &ClusterConfig) -> Result<ClusterStackOutputs> {
        let name = cluster_stack_name(config.name());
        let outputs = self
            .stacks
            .create(&name, &template::cluster_template(config), &stack_tags(config))
            .await?;
        ClusterStackOutputs::from_outputs(&name, &outputs)
    }

    async fn delete_legacy_stack(
        &self,
        stack: LegacyStack,
        identity: &ClusterIdentity,
        wait: bool,
    ) -> ClientResult<String> {
        let name = stack.name(identity);
        self.stacks.delete(&name, wait).await?;
        Ok(name)
    }

    fn authenticator(&self, identity: &ClusterIdentity) -> ExecAuthenticator {
        let env = self
            .provider
            .profile
            .as_ref()
            .map(|profile| btreemap! { "AWS_PROFILE".to_string() => profile.clone() })
            .unwrap_or_default();
        ExecAuthenticator {
            command: AUTHENTICATOR_COMMAND.to_string(),
            args: vec![
                "--region".to_string(),
                identity.region.clone(),
                "eks".to_string(),
                "get-token".to_string(),
                "--cluster-name".to_string(),
                identity.name.clone(),
            ],
            env,
        }
    }
}

/// Tags placed on every stack, and through the stack on every resource in it.
fn stack_tags(config: &ClusterConfig) -> BTreeMap<String, String> {
    let mut tags = config.tags.clone();
    tags.insert(TAG_CLUSTER_NAME.to_string(), config.name().to_string());
    tags.insert(TAG_CREATED_BY.to_string(), TOOL_NAME.to_string());
    tags
}

#[async_trait]
impl InfrastructureClient for AwsInfrastructure {
    type Cluster = KubeCluster;

    async fn check_auth(&self) -> ClientResult<()> {
        let identity = self
            .sts
            .get_caller_identity()
            .send()
            .await
            .context(error::CallerIdentitySnafu)?;
        debug!(
            "Authenticated as '{}'",
            identity.arn().unwrap_or("an unknown identity")
        );
        Ok(())
    }

    fn is_supported_region(&self) -> bool {
        self.provider.is_supported_region()
    }

    async fn availability_zones(&self) -> ClientResult<Vec<String>> {
        Ok(network::availability_zones(&self.ec2).await?)
    }

    async fn describe_subnets(&self, ids: &[String]) -> ClientResult<Vec<SubnetDescription>> {
        Ok(network::describe_subnets(&self.ec2, ids).await?)
    }

    async fn external_network(&self, reference: &str) -> ClientResult<ExternalNetwork> {
        Ok(network::external_network(&self.ec2, reference).await?)
    }

    async fn resolve_image(
        &self,
        config: &ClusterConfig,
        node_group: &NodeGroupSpec,
    ) -> ClientResult<String> {
        Ok(image::resolve(&self.ssm, &config.version, node_group).await?)
    }

    async fn load_ssh_public_key(
        &self,
        cluster_name: &str,
        node_group: &NodeGroupSpec,
    ) -> ClientResult<String> {
        Ok(ssh::load(&self.ec2, cluster_name, node_group).await?)
    }

    async fn create_cluster_with_node_groups(
        &self,
        config: &ClusterConfig,
        node_groups: &[NodeGroupSpec],
    ) -> Vec<ClientError> {
        let cluster = match self.create_cluster_stack(config).await {
            Ok(cluster) => cluster,
            Err(e) => return vec![e.into()],
        };
        join_all(
            node_groups
                .iter()
                .map(|node_group| self.create_node_group(config, node_group, &cluster)),
        )
        .await
        .into_iter()
        .filter_map(|result| result.err())
        .map(ClientError::from)
        .collect()
    }

    async fn cluster_access(&self, config: &ClusterConfig) -> ClientResult<ClusterAccess> {
        let cluster = eks::describe(&self.eks, config.name()).await?;
        let (endpoint, certificate_authority_data) =
            eks::endpoint_and_authority(config.name(), &cluster)?;
        Ok(ClusterAccess {
            identity: config.identity.clone(),
            endpoint,
            certificate_authority_data,
            authenticator: self.authenticator(&config.identity),
        })
    }

    async fn connect(&self, access: &ClusterAccess) -> ClientResult<KubeCluster> {
        Ok(KubeCluster::from_access(access).await?)
    }

    async fn authorize_node_group(
        &self,
        cluster: &KubeCluster,
        config: &ClusterConfig,
        node_group: &NodeGroupSpec,
    ) -> ClientResult<()> {
        let name = node_group_stack_name(config.name(), &node_group.name);
        let outputs = self.stacks.outputs(&name).await?;
        let role_arn = stack::output(&outputs, &name, OUTPUT_INSTANCE_ROLE_ARN)?;
        Ok(cluster.map_node_role(role_arn).await?)
    }

    async fn add_default_storage_class(&self, cluster: &KubeCluster) -> ClientResult<()> {
        Ok(cluster.add_default_storage_class().await?)
    }

    async fn delete_node_groups(&self, identity: &ClusterIdentity) -> Vec<ClientError> {
        let names = match self
            .stacks
            .list_owned(&node_group_stack_prefix(&identity.name), &identity.name)
            .await
        {
            Ok(names) => names,
            Err(e) => return vec![e.into()],
        };
        if names.is_empty() {
            debug!("Cluster '{}' has no node group stacks", identity.name);
        }
        join_all(names.iter().map(|name| self.stacks.delete(name, true)))
            .await
            .into_iter()
            .filter_map(|result| result.err())
            .map(ClientError::from)
            .collect()
    }

    async fn delete_cluster(
        &self,
        identity: &ClusterIdentity,
        wait: bool,
    ) -> ClientResult<String> {
        let name = cluster_stack_name(&identity.name);
        self.stacks.delete(&name, wait).await?;
        Ok(name)
    }

    async fn deprecated_delete_control_plane(
        &self,
        identity: &ClusterIdentity,
    ) -> ClientResult<String> {
        eks::delete(&self.eks, &identity.name).await?;
        Ok(identity.name.clone())
    }

    async fn deprecated_delete_stack_control_plane(
        &self,
        identity: &ClusterIdentity,
        wait: bool,
    ) -> ClientResult<String> {
        self.delete_legacy_stack(LegacyStack::ControlPlane, identity, wait)
            .await
    }

    async fn deprecated_delete_stack_service_role(
        &self,
        identity: &ClusterIdentity,
        wait: bool,
    ) -> ClientResult<String> {
        self.delete_legacy_stack(LegacyStack::ServiceRole, identity, wait)
            .await
    }

    async fn deprecated_delete_stack_vpc(
        &self,
        identity: &ClusterIdentity,
        wait: bool,
    ) -> ClientResult<String> {
        self.delete_legacy_stack(LegacyStack::Vpc, identity, wait)
            .await
    }

    async fn deprecated_delete_stack_default_node_group(
        &self,
        identity: &ClusterIdentity,
        wait: bool,
    ) -> ClientResult<String> {
        self.delete_legacy_stack(LegacyStack::DefaultNodeGroup, identity, wait)
            .await
    }

    async fn delete_ssh_public_keys(&self, cluster_name: &str) -> ClientResult<Vec<String>> {
        Ok(ssh::delete_all(&self.ec2, cluster_name).await?)
    }

    async fn list_clusters(
        &self,
        name: Option<&str>,
        chunk_size: usize,
        all_regions: bool,
    ) -> ClientResult<Vec<ClusterSummary>> {
        if !all_regions {
            return Ok(eks::list(&self.eks, &self.provider.region, name, chunk_size).await?);
        }
        let mut clusters = Vec::new();
        for region in SUPPORTED_REGIONS {
            info!("Listing clusters in '{}'", region);
            let regional =
                aws_sdk_eks::Client::new(&sdk_config_for_region(&self.provider, region).await);
            clusters.extend(eks::list(&regional, region, name, chunk_size).await?);
        }
        Ok(clusters)
    }
}
