/*!

The traits through which the workflows reach the outside world. The workflows own sequencing,
gating and error policy; implementations own the provider calls, template synthesis and local
file handling.

!*/

mod error;

pub use error::{ClientError, ClientResult, ErrorMessage};

use async_trait::async_trait;
use eksflow_model::{
    ClusterAccess, ClusterConfig, ClusterIdentity, ClusterSummary, ExternalNetwork, NodeGroupSpec,
    SubnetDescription,
};
use std::path::{Path, PathBuf};

/// Talks to the running cluster's API server.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Returns `true` once the API server answers and reports itself healthy.
    async fn control_plane_ready(&self) -> ClientResult<bool>;

    /// The number of nodes whose `Ready` condition is `True`.
    async fn ready_node_count(&self) -> ClientResult<usize>;
}

/// Capability-style, idempotent operations against the infrastructure provider.
#[async_trait]
pub trait InfrastructureClient: Send + Sync {
    type Cluster: ClusterClient;

    /// Checks that usable credentials are configured.
    async fn check_auth(&self) -> ClientResult<()>;

    /// Whether the managed Kubernetes service is offered in the configured region.
    fn is_supported_region(&self) -> bool;

    /// The availability zones of the configured region that can currently host resources.
    async fn availability_zones(&self) -> ClientResult<Vec<String>>;

    /// Describes existing subnets by id.
    async fn describe_subnets(&self, ids: &[String]) -> ClientResult<Vec<SubnetDescription>>;

    /// Looks up the network of an externally managed cluster.
    async fn external_network(&self, reference: &str) -> ClientResult<ExternalNetwork>;

    /// Returns the machine image id for the node group's instance type and image family.
    async fn resolve_image(
        &self,
        config: &ClusterConfig,
        node_group: &NodeGroupSpec,
    ) -> ClientResult<String>;

    /// Imports the node group's public key, or validates that the named key pair exists. Returns
    /// the key pair name.
    async fn load_ssh_public_key(
        &self,
        cluster_name: &str,
        node_group: &NodeGroupSpec,
    ) -> ClientResult<String>;

    /// Provisions the cluster and its node groups. All errors are collected and returned
    /// together; an empty list means everything was created.
    async fn create_cluster_with_node_groups(
        &self,
        config: &ClusterConfig,
        node_groups: &[NodeGroupSpec],
    ) -> Vec<ClientError>;

    /// The endpoint and credentials needed to reach the API server.
    async fn cluster_access(&self, config: &ClusterConfig) -> ClientResult<ClusterAccess>;

    /// Creates a client for the cluster's API server.
    async fn connect(&self, access: &ClusterAccess) -> ClientResult<Self::Cluster>;

    /// Allows the node group's instances to join the cluster.
    async fn authorize_node_group(
        &self,
        cluster: &Self::Cluster,
        config: &ClusterConfig,
        node_group: &NodeGroupSpec,
    ) -> ClientResult<()>;

    /// Creates the default storage class.
    async fn add_default_storage_class(&self, cluster: &Self::Cluster) -> ClientResult<()>;

    /// Deletes every node group of the cluster, waiting for each deletion. Returns all errors.
    async fn delete_node_groups(&self, identity: &ClusterIdentity) -> Vec<ClientError>;

    /// Deletes the cluster stack. Returns the name of the deleted stack.
    async fn delete_cluster(&self, identity: &ClusterIdentity, wait: bool)
        -> ClientResult<String>;

    /// Deletes a control plane created directly through the service API by an older release.
    async fn deprecated_delete_control_plane(
        &self,
        identity: &ClusterIdentity,
    ) -> ClientResult<String>;

    /// Deletes the control-plane stack of an older release.
    async fn deprecated_delete_stack_control_plane(
        &self,
        identity: &ClusterIdentity,
        wait: bool,
    ) -> ClientResult<String>;

    /// Deletes the service-role stack of an older release.
    async fn deprecated_delete_stack_service_role(
        &self,
        identity: &ClusterIdentity,
        wait: bool,
    ) -> ClientResult<String>;

    /// Deletes the VPC stack of an older release.
    async fn deprecated_delete_stack_vpc(
        &self,
        identity: &ClusterIdentity,
        wait: bool,
    ) -> ClientResult<String>;

    /// Deletes the default node group stack of an older release.
    async fn deprecated_delete_stack_default_node_group(
        &self,
        identity: &ClusterIdentity,
        wait: bool,
    ) -> ClientResult<String>;

    /// Deletes the key pairs imported for the cluster. Returns the names of the deleted key pairs;
    /// an empty list means there were none.
    async fn delete_ssh_public_keys(&self, cluster_name: &str) -> ClientResult<Vec<String>>;

    /// Lists clusters, either the one named or all of them, in the configured region or in every
    /// supported region. A `chunk_size` of 0 means no page size limit.
    async fn list_clusters(
        &self,
        name: Option<&str>,
        chunk_size: usize,
        all_regions: bool,
    ) -> ClientResult<Vec<ClusterSummary>>;
}

/// Where a kubeconfig should be written.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum KubeconfigLocation {
    /// The first file in `KUBECONFIG`, or `~/.kube/config`.
    Default,
    /// A file of its own, named after the cluster.
    Auto,
    Path(PathBuf),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KubeconfigTarget {
    pub location: KubeconfigLocation,
    /// Make the cluster's context the current context.
    pub set_context: bool,
}

/// The local machine of the user: kubeconfig files and client tools.
pub trait Workstation: Send + Sync {
    /// Writes or merges the cluster's entries into a kubeconfig. Returns the file written.
    fn write_kubeconfig(
        &self,
        access: &ClusterAccess,
        target: &KubeconfigTarget,
    ) -> ClientResult<PathBuf>;

    /// Removes the cluster's entries. Returns the file that was changed or removed, or `None` if
    /// there was nothing to remove.
    fn remove_kubeconfig(&self, identity: &ClusterIdentity) -> ClientResult<Option<PathBuf>>;

    /// Checks that the tools needed to use the cluster are installed and runnable.
    fn check_client_tools(
        &self,
        access: &ClusterAccess,
        kubeconfig: Option<&Path>,
    ) -> ClientResult<()>;
}
