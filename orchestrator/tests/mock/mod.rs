/*!

This test module provides mock implementations of the [`InfrastructureClient`], [`ClusterClient`]
and [`Workstation`] traits so that the workflows can be tested without a cloud account or a
cluster. Every call is recorded in a shared log so tests can assert on what ran, and in which
order.

!*/

#![allow(dead_code)]

use async_trait::async_trait;
use eksflow_model::{
    ClusterAccess, ClusterConfig, ClusterIdentity, ClusterSummary, ExecAuthenticator,
    ExternalNetwork, NodeGroupSpec, SubnetDescription, SubnetTopology,
};
use eksflow_orchestrator::clients::{
    ClientError, ClientResult, ClusterClient, InfrastructureClient, KubeconfigTarget, Workstation,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Call {
    CheckAuth,
    AvailabilityZones,
    DescribeSubnets(Vec<String>),
    ExternalNetwork(String),
    ResolveImage,
    LoadSshPublicKey,
    CreateClusterWithNodeGroups,
    ClusterAccess,
    Connect,
    AuthorizeNodeGroup,
    AddDefaultStorageClass,
    DeleteNodeGroups,
    DeleteCluster { wait: bool },
    DeprecatedDeleteControlPlane,
    DeprecatedDeleteStackControlPlane,
    DeprecatedDeleteStackServiceRole,
    DeprecatedDeleteStackVpc,
    DeprecatedDeleteStackDefaultNodeGroup,
    DeleteSshPublicKeys,
    ListClusters {
        name: Option<String>,
        chunk_size: usize,
        all_regions: bool,
    },
    ControlPlaneReady,
    ReadyNodeCount,
    WriteKubeconfig,
    RemoveKubeconfig,
    CheckClientTools,
}

pub type CallLog = Arc<Mutex<Vec<Call>>>;

fn record(calls: &CallLog, call: Call) {
    calls.lock().unwrap().push(call);
}

/// What the mocks report and which of their operations fail.
#[derive(Clone, Debug)]
pub struct Behavior {
    pub supported_region: bool,
    pub auth_fails: bool,
    pub zones: Vec<String>,
    pub subnets: Vec<SubnetDescription>,
    pub external_network: Option<ExternalNetwork>,
    pub image_fails: bool,
    pub provisioning_errors: usize,
    pub authorize_fails: bool,
    /// The number of control plane probes that report "not ready" before it becomes ready.
    /// `None` means it never becomes ready.
    pub control_plane_ready_after: Option<usize>,
    pub ready_nodes: usize,
    pub node_group_deletion_errors: usize,
    pub cluster_stack_exists: bool,
    pub legacy_control_plane_exists: bool,
    pub legacy_control_plane_stack_exists: bool,
    pub legacy_service_role_exists: bool,
    pub legacy_vpc_exists: bool,
    pub legacy_default_node_group_exists: bool,
    pub ssh_keys: Vec<String>,
    pub kubeconfig_exists: bool,
    pub kubeconfig_write_fails: bool,
    pub client_tools_fail: bool,
}

impl Behavior {
    /// Everything works and every resource exists.
    pub fn healthy() -> Self {
        Self {
            supported_region: true,
            auth_fails: false,
            zones: vec![
                "us-west-2d".to_string(),
                "us-west-2a".to_string(),
                "us-west-2c".to_string(),
                "us-west-2b".to_string(),
            ],
            subnets: Vec::new(),
            external_network: None,
            image_fails: false,
            provisioning_errors: 0,
            authorize_fails: false,
            control_plane_ready_after: Some(0),
            ready_nodes: 2,
            node_group_deletion_errors: 0,
            cluster_stack_exists: true,
            legacy_control_plane_exists: false,
            legacy_control_plane_stack_exists: false,
            legacy_service_role_exists: false,
            legacy_vpc_exists: false,
            legacy_default_node_group_exists: false,
            ssh_keys: Vec::new(),
            kubeconfig_exists: true,
            kubeconfig_write_fails: false,
            client_tools_fail: false,
        }
    }

    /// Nothing exists for the cluster.
    pub fn nothing_exists() -> Self {
        Self {
            cluster_stack_exists: false,
            kubeconfig_exists: false,
            ..Self::healthy()
        }
    }
}

pub fn subnet(id: &str, vpc_id: &str, zone: &str) -> SubnetDescription {
    SubnetDescription {
        id: id.to_string(),
        vpc_id: vpc_id.to_string(),
        availability_zone: zone.to_string(),
        cidr: None,
    }
}

fn missing(what: &str) -> ClientError {
    ClientError::not_found(format!("{} does not exist", what))
}

pub struct MockInfrastructure {
    pub behavior: Behavior,
    pub calls: CallLog,
}

impl MockInfrastructure {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            calls: CallLog::default(),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called(&self, call: &Call) -> bool {
        self.calls().contains(call)
    }

    pub fn position(&self, call: &Call) -> Option<usize> {
        self.calls().iter().position(|c| c == call)
    }

    pub fn workstation(&self) -> MockWorkstation {
        MockWorkstation {
            calls: Arc::clone(&self.calls),
            kubeconfig_exists: self.behavior.kubeconfig_exists,
            write_fails: self.behavior.kubeconfig_write_fails,
            client_tools_fail: self.behavior.client_tools_fail,
        }
    }

    fn record(&self, call: Call) {
        record(&self.calls, call)
    }

    fn legacy_stack(&self, exists: bool, name: String) -> ClientResult<String> {
        if exists {
            Ok(name)
        } else {
            Err(missing(&format!("stack '{}'", name)))
        }
    }
}

#[async_trait]
impl InfrastructureClient for MockInfrastructure {
    type Cluster = MockCluster;

    async fn check_auth(&self) -> ClientResult<()> {
        self.record(Call::CheckAuth);
        if self.behavior.auth_fails {
            return Err(ClientError::request_failed(
                eksflow_orchestrator::clients::ErrorMessage::from("the security token is invalid"),
            ));
        }
        Ok(())
    }

    fn is_supported_region(&self) -> bool {
        self.behavior.supported_region
    }

    async fn availability_zones(&self) -> ClientResult<Vec<String>> {
        self.record(Call::AvailabilityZones);
        Ok(self.behavior.zones.clone())
    }

    async fn describe_subnets(&self, ids: &[String]) -> ClientResult<Vec<SubnetDescription>> {
        self.record(Call::DescribeSubnets(ids.to_vec()));
        Ok(self
            .behavior
            .subnets
            .iter()
            .filter(|subnet| ids.contains(&subnet.id))
            .cloned()
            .collect())
    }

    async fn external_network(&self, reference: &str) -> ClientResult<ExternalNetwork> {
        self.record(Call::ExternalNetwork(reference.to_string()));
        self.behavior
            .external_network
            .clone()
            .ok_or_else(|| missing(&format!("cluster '{}'", reference)))
    }

    async fn resolve_image(
        &self,
        _config: &ClusterConfig,
        _node_group: &NodeGroupSpec,
    ) -> ClientResult<String> {
        self.record(Call::ResolveImage);
        if self.behavior.image_fails {
            return Err(ClientError::missing_data("no image parameter"));
        }
        Ok("ami-0123456789abcdef0".to_string())
    }

    async fn load_ssh_public_key(
        &self,
        cluster_name: &str,
        node_group: &NodeGroupSpec,
    ) -> ClientResult<String> {
        self.record(Call::LoadSshPublicKey);
        Ok(format!("eksflow-{}-nodegroup-{}", cluster_name, node_group.name))
    }

    async fn create_cluster_with_node_groups(
        &self,
        _config: &ClusterConfig,
        _node_groups: &[NodeGroupSpec],
    ) -> Vec<ClientError> {
        self.record(Call::CreateClusterWithNodeGroups);
        (0..self.behavior.provisioning_errors)
            .map(|i| ClientError::missing_data(format!("stack {} failed", i)))
            .collect()
    }

    async fn cluster_access(&self, config: &ClusterConfig) -> ClientResult<ClusterAccess> {
        self.record(Call::ClusterAccess);
        Ok(ClusterAccess {
            identity: config.identity.clone(),
            endpoint: "https://example.eks.amazonaws.com".to_string(),
            certificate_authority_data: "Y2VydA==".to_string(),
            authenticator: ExecAuthenticator {
                command: "aws".to_string(),
                args: vec!["eks".to_string(), "get-token".to_string()],
                env: BTreeMap::new(),
            },
        })
    }

    async fn connect(&self, _access: &ClusterAccess) -> ClientResult<MockCluster> {
        self.record(Call::Connect);
        Ok(MockCluster {
            calls: Arc::clone(&self.calls),
            control_plane_ready_after: self.behavior.control_plane_ready_after,
            ready_nodes: self.behavior.ready_nodes,
            probes: Mutex::new(0),
        })
    }

    async fn authorize_node_group(
        &self,
        _cluster: &MockCluster,
        _config: &ClusterConfig,
        _node_group: &NodeGroupSpec,
    ) -> ClientResult<()> {
        self.record(Call::AuthorizeNodeGroup);
        if self.behavior.authorize_fails {
            return Err(ClientError::invalid_input("the node role is missing"));
        }
        Ok(())
    }

    async fn add_default_storage_class(&self, _cluster: &MockCluster) -> ClientResult<()> {
        self.record(Call::AddDefaultStorageClass);
        Ok(())
    }

    async fn delete_node_groups(&self, _identity: &ClusterIdentity) -> Vec<ClientError> {
        self.record(Call::DeleteNodeGroups);
        (0..self.behavior.node_group_deletion_errors)
            .map(|i| ClientError::missing_data(format!("node group {} is stuck", i)))
            .collect()
    }

    async fn delete_cluster(&self, identity: &ClusterIdentity, wait: bool) -> ClientResult<String> {
        self.record(Call::DeleteCluster { wait });
        self.legacy_stack(
            self.behavior.cluster_stack_exists,
            format!("eksflow-{}-cluster", identity.name),
        )
    }

    async fn deprecated_delete_control_plane(
        &self,
        identity: &ClusterIdentity,
    ) -> ClientResult<String> {
        self.record(Call::DeprecatedDeleteControlPlane);
        if self.behavior.legacy_control_plane_exists {
            Ok(identity.name.clone())
        } else {
            Err(missing(&format!("control plane '{}'", identity.name)))
        }
    }

    async fn deprecated_delete_stack_control_plane(
        &self,
        identity: &ClusterIdentity,
        _wait: bool,
    ) -> ClientResult<String> {
        self.record(Call::DeprecatedDeleteStackControlPlane);
        self.legacy_stack(
            self.behavior.legacy_control_plane_stack_exists,
            format!("EKS-{}-ControlPlane", identity.name),
        )
    }

    async fn deprecated_delete_stack_service_role(
        &self,
        identity: &ClusterIdentity,
        _wait: bool,
    ) -> ClientResult<String> {
        self.record(Call::DeprecatedDeleteStackServiceRole);
        self.legacy_stack(
            self.behavior.legacy_service_role_exists,
            format!("EKS-{}-ServiceRole", identity.name),
        )
    }

    async fn deprecated_delete_stack_vpc(
        &self,
        identity: &ClusterIdentity,
        _wait: bool,
    ) -> ClientResult<String> {
        self.record(Call::DeprecatedDeleteStackVpc);
        self.legacy_stack(
            self.behavior.legacy_vpc_exists,
            format!("EKS-{}-VPC", identity.name),
        )
    }

    async fn deprecated_delete_stack_default_node_group(
        &self,
        identity: &ClusterIdentity,
        _wait: bool,
    ) -> ClientResult<String> {
        self.record(Call::DeprecatedDeleteStackDefaultNodeGroup);
        self.legacy_stack(
            self.behavior.legacy_default_node_group_exists,
            format!("EKS-{}-DefaultNodeGroup", identity.name),
        )
    }

    async fn delete_ssh_public_keys(&self, _cluster_name: &str) -> ClientResult<Vec<String>> {
        self.record(Call::DeleteSshPublicKeys);
        Ok(self.behavior.ssh_keys.clone())
    }

    async fn list_clusters(
        &self,
        name: Option<&str>,
        chunk_size: usize,
        all_regions: bool,
    ) -> ClientResult<Vec<ClusterSummary>> {
        self.record(Call::ListClusters {
            name: name.map(str::to_string),
            chunk_size,
            all_regions,
        });
        Ok(vec![ClusterSummary {
            name: name.unwrap_or("dev").to_string(),
            region: "us-west-2".to_string(),
            status: "ACTIVE".to_string(),
            version: Some("1.24".to_string()),
            endpoint: None,
        }])
    }
}

pub struct MockCluster {
    calls: CallLog,
    control_plane_ready_after: Option<usize>,
    ready_nodes: usize,
    probes: Mutex<usize>,
}

impl MockCluster {
    pub fn new(calls: CallLog, control_plane_ready_after: Option<usize>, ready_nodes: usize) -> Self {
        Self {
            calls,
            control_plane_ready_after,
            ready_nodes,
            probes: Mutex::new(0),
        }
    }
}

#[async_trait]
impl ClusterClient for MockCluster {
    async fn control_plane_ready(&self) -> ClientResult<bool> {
        record(&self.calls, Call::ControlPlaneReady);
        let mut probes = self.probes.lock().unwrap();
        let ready = matches!(self.control_plane_ready_after, Some(after) if *probes >= after);
        *probes += 1;
        if !ready && *probes == 1 {
            // The first probe of a control plane that is still starting fails outright.
            return Err(ClientError::request_failed(
                eksflow_orchestrator::clients::ErrorMessage::from("connection refused"),
            ));
        }
        Ok(ready)
    }

    async fn ready_node_count(&self) -> ClientResult<usize> {
        record(&self.calls, Call::ReadyNodeCount);
        Ok(self.ready_nodes)
    }
}

pub struct MockWorkstation {
    calls: CallLog,
    kubeconfig_exists: bool,
    write_fails: bool,
    client_tools_fail: bool,
}

impl Workstation for MockWorkstation {
    fn write_kubeconfig(
        &self,
        access: &ClusterAccess,
        _target: &KubeconfigTarget,
    ) -> ClientResult<PathBuf> {
        record(&self.calls, Call::WriteKubeconfig);
        if self.write_fails {
            return Err(ClientError::io(std::io::Error::from(
                std::io::ErrorKind::PermissionDenied,
            )));
        }
        Ok(PathBuf::from(format!(
            "/home/user/.kube/eksflow/clusters/{}",
            access.identity.name
        )))
    }

    fn remove_kubeconfig(&self, identity: &ClusterIdentity) -> ClientResult<Option<PathBuf>> {
        record(&self.calls, Call::RemoveKubeconfig);
        Ok(self.kubeconfig_exists.then(|| {
            PathBuf::from(format!(
                "/home/user/.kube/eksflow/clusters/{}",
                identity.name
            ))
        }))
    }

    fn check_client_tools(
        &self,
        _access: &ClusterAccess,
        _kubeconfig: Option<&Path>,
    ) -> ClientResult<()> {
        record(&self.calls, Call::CheckClientTools);
        if self.client_tools_fail {
            return Err(ClientError::io(std::io::Error::from(
                std::io::ErrorKind::NotFound,
            )));
        }
        Ok(())
    }
}

/// Bound subnets of a topology, by id.
pub fn bound_ids(config: &eksflow_model::VpcSpec, topology: SubnetTopology) -> Vec<String> {
    config.subnet_ids(topology)
}
