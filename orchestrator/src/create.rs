use crate::clients::{InfrastructureClient, KubeconfigLocation, KubeconfigTarget, Workstation};
use crate::error::{self, Error, Resources, Result};
use crate::name::resolve_name;
use crate::network::{self, NetworkRequest};
use crate::wait;
use eksflow_model::{
    generate_cluster_name, Addons, ClusterAccess, ClusterConfig, ClusterIdentity, MachineImage,
    NodeGroupSpec, ProviderConfig,
};
use log::{debug, error, info, warn};
use snafu::{ensure, OptionExt, ResultExt};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// What the user asked for. The workflow never changes it; everything it resolves is kept on
/// the side and returned in the [`CreationReport`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CreateClusterRequest {
    pub name_flag: Option<String>,
    pub name_argument: Option<String>,
    pub version: String,
    pub tags: BTreeMap<String, String>,
    pub addons: Addons,
    pub network: NetworkRequest,
    pub node_group: NodeGroupSpec,
    pub kubeconfig: KubeconfigRequest,
}

impl Default for CreateClusterRequest {
    fn default() -> Self {
        Self {
            name_flag: None,
            name_argument: None,
            version: eksflow_model::constants::DEFAULT_KUBERNETES_VERSION.to_string(),
            tags: BTreeMap::new(),
            addons: Addons::default(),
            network: NetworkRequest::default(),
            node_group: NodeGroupSpec::default(),
            kubeconfig: KubeconfigRequest::default(),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KubeconfigRequest {
    pub write: bool,
    /// An explicit file to write to.
    pub path: Option<PathBuf>,
    /// Write to a file of its own, named after the cluster.
    pub auto: bool,
    pub set_context: bool,
}

impl Default for KubeconfigRequest {
    fn default() -> Self {
        Self {
            write: true,
            path: None,
            auto: false,
            set_context: true,
        }
    }
}

impl KubeconfigRequest {
    fn target(&self) -> Result<Option<KubeconfigTarget>> {
        let location = match (&self.path, self.auto) {
            (Some(_), true) => {
                return error::ConfigConflictSnafu {
                    first: "--kubeconfig",
                    second: "--auto-kubeconfig",
                }
                .fail()
            }
            (Some(path), false) => KubeconfigLocation::Path(path.clone()),
            (None, true) => KubeconfigLocation::Auto,
            (None, false) => KubeconfigLocation::Default,
        };
        Ok(self.write.then_some(KubeconfigTarget {
            location,
            set_context: self.set_context,
        }))
    }
}

/// The states of the creation workflow. The workflow moves through them in order and ends in
/// either `Ready` or `Aborted`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CreationState {
    Pending,
    Validating,
    ResolvingNetwork,
    ResolvingImage,
    ResolvingSshKey,
    ProvisioningStacks,
    WaitingControlPlane,
    AuthorizingNodes,
    WaitingNodes,
    Finalizing,
    Ready,
    Aborted,
}

/// The named steps of the creation workflow.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CreationStep {
    Validate,
    ResolveNetwork,
    ResolveImage,
    ResolveSshKey,
    ProvisionStacks,
    WriteKubeconfig,
    Connect,
    WaitForControlPlane,
    AuthorizeNodes,
    WaitForNodes,
    AddStorageClass,
    CheckClientTools,
    GpuInstructions,
}

impl CreationStep {
    /// Every step, in the order they run.
    pub const SEQUENCE: &'static [CreationStep] = &[
        CreationStep::Validate,
        CreationStep::ResolveNetwork,
        CreationStep::ResolveImage,
        CreationStep::ResolveSshKey,
        CreationStep::ProvisionStacks,
        CreationStep::WriteKubeconfig,
        CreationStep::Connect,
        CreationStep::WaitForControlPlane,
        CreationStep::AuthorizeNodes,
        CreationStep::WaitForNodes,
        CreationStep::AddStorageClass,
        CreationStep::CheckClientTools,
        CreationStep::GpuInstructions,
    ];

    /// Steps whose failure is logged and otherwise ignored.
    pub const ADVISORY: &'static [CreationStep] = &[
        CreationStep::CheckClientTools,
        CreationStep::GpuInstructions,
    ];

    pub fn is_advisory(&self) -> bool {
        Self::ADVISORY.contains(self)
    }

    pub fn state(&self) -> CreationState {
        match self {
            CreationStep::Validate => CreationState::Validating,
            CreationStep::ResolveNetwork => CreationState::ResolvingNetwork,
            CreationStep::ResolveImage => CreationState::ResolvingImage,
            CreationStep::ResolveSshKey => CreationState::ResolvingSshKey,
            CreationStep::ProvisionStacks => CreationState::ProvisioningStacks,
            CreationStep::WriteKubeconfig
            | CreationStep::Connect
            | CreationStep::WaitForControlPlane => CreationState::WaitingControlPlane,
            CreationStep::AuthorizeNodes => CreationState::AuthorizingNodes,
            CreationStep::WaitForNodes => CreationState::WaitingNodes,
            CreationStep::AddStorageClass
            | CreationStep::CheckClientTools
            | CreationStep::GpuInstructions => CreationState::Finalizing,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CreationStep::Validate => "validate",
            CreationStep::ResolveNetwork => "resolve network",
            CreationStep::ResolveImage => "resolve machine image",
            CreationStep::ResolveSshKey => "resolve SSH key",
            CreationStep::ProvisionStacks => "provision stacks",
            CreationStep::WriteKubeconfig => "write kubeconfig",
            CreationStep::Connect => "connect to cluster",
            CreationStep::WaitForControlPlane => "wait for control plane",
            CreationStep::AuthorizeNodes => "authorize nodes",
            CreationStep::WaitForNodes => "wait for nodes",
            CreationStep::AddStorageClass => "add default storage class",
            CreationStep::CheckClientTools => "check client tools",
            CreationStep::GpuInstructions => "GPU instructions",
        }
    }
}

impl Display for CreationStep {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self.name(), f)
    }
}

/// What a successful creation produced.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CreationReport {
    pub config: ClusterConfig,
    pub node_group: NodeGroupSpec,
    /// The kubeconfig file written, if one was requested.
    pub kubeconfig: Option<PathBuf>,
}

/// Results of earlier steps that later steps build on.
struct Progress<C> {
    config: Option<ClusterConfig>,
    node_group: NodeGroupSpec,
    kubeconfig_target: Option<KubeconfigTarget>,
    kubeconfig_path: Option<PathBuf>,
    access: Option<ClusterAccess>,
    cluster: Option<C>,
}

/// Creates a cluster with one node group.
pub struct CreateCluster<'a, I, W>
where
    I: InfrastructureClient,
    W: Workstation,
{
    provider: &'a ProviderConfig,
    infra: &'a I,
    workstation: &'a W,
    state: CreationState,
}

impl<'a, I, W> CreateCluster<'a, I, W>
where
    I: InfrastructureClient,
    W: Workstation,
{
    pub fn new(provider: &'a ProviderConfig, infra: &'a I, workstation: &'a W) -> Self {
        Self {
            provider,
            infra,
            workstation,
            state: CreationState::Pending,
        }
    }

    pub fn state(&self) -> CreationState {
        self.state
    }

    /// Runs every step in order. The first failure of a non-advisory step moves the workflow to
    /// `Aborted` and is returned; no later step runs.
    pub async fn run(&mut self, request: &CreateClusterRequest) -> Result<CreationReport> {
        let mut progress = Progress {
            config: None,
            node_group: request.node_group.clone(),
            kubeconfig_target: None,
            kubeconfig_path: None,
            access: None,
            cluster: None,
        };

        for step in CreationStep::SEQUENCE {
            self.state = step.state();
            debug!("Running step '{}'", step);
            match self.run_step(*step, request, &mut progress).await {
                Ok(()) => {}
                Err(e) if step.is_advisory() => {
                    warn!("{}", e);
                }
                Err(e) => {
                    self.state = CreationState::Aborted;
                    return Err(e);
                }
            }
        }

        self.state = CreationState::Ready;
        let config = progress.config.context(error::StepOrderSnafu {
            step: "report",
            needs: CreationStep::Validate.name(),
        })?;
        info!("Cluster '{}' is ready", config.name());
        Ok(CreationReport {
            config,
            node_group: progress.node_group,
            kubeconfig: progress.kubeconfig_path,
        })
    }

    async fn run_step(
        &self,
        step: CreationStep,
        request: &CreateClusterRequest,
        progress: &mut Progress<I::Cluster>,
    ) -> Result<()> {
        match step {
            CreationStep::Validate => {
                let (config, target) = self.validate(request).await?;
                progress.config = Some(config);
                progress.kubeconfig_target = target;
            }
            CreationStep::ResolveNetwork => {
                let config = required(&mut progress.config, step, CreationStep::Validate)?;
                network::resolve(
                    self.infra,
                    &request.network,
                    &progress.node_group,
                    &mut config.vpc,
                )
                .await?;
            }
            CreationStep::ResolveImage => {
                let config = required(&mut progress.config, step, CreationStep::Validate)?;
                self.resolve_image(config, &mut progress.node_group).await?;
            }
            CreationStep::ResolveSshKey => {
                let config = required(&mut progress.config, step, CreationStep::Validate)?;
                self.resolve_ssh_key(config, &mut progress.node_group)
                    .await?;
            }
            CreationStep::ProvisionStacks => {
                let config = required(&mut progress.config, step, CreationStep::Validate)?;
                self.provision(config, &progress.node_group).await?;
            }
            CreationStep::WriteKubeconfig => {
                let config = required(&mut progress.config, step, CreationStep::Validate)?;
                let access = self
                    .infra
                    .cluster_access(config)
                    .await
                    .context(error::ClientSnafu {
                        action: "get cluster credentials",
                        resources: Resources::Remaining,
                    })?;
                if let Some(target) = &progress.kubeconfig_target {
                    let path = self
                        .workstation
                        .write_kubeconfig(&access, target)
                        .context(error::ClientSnafu {
                            action: "write kubeconfig",
                            resources: Resources::Remaining,
                        })?;
                    info!("Saved kubeconfig as '{}'", path.display());
                    progress.kubeconfig_path = Some(path);
                }
                progress.access = Some(access);
            }
            CreationStep::Connect => {
                let access = required(&mut progress.access, step, CreationStep::WriteKubeconfig)?;
                let cluster = self
                    .infra
                    .connect(access)
                    .await
                    .context(error::ClientSnafu {
                        action: "create a client for the cluster",
                        resources: Resources::Remaining,
                    })?;
                progress.cluster = Some(cluster);
            }
            CreationStep::WaitForControlPlane => {
                let cluster = required(&mut progress.cluster, step, CreationStep::Connect)?;
                wait::wait_for_control_plane(cluster, self.provider.wait_timeout).await?;
            }
            CreationStep::AuthorizeNodes => {
                let config = required(&mut progress.config, step, CreationStep::Validate)?;
                let cluster = required(&mut progress.cluster, step, CreationStep::Connect)?;
                self.infra
                    .authorize_node_group(cluster, config, &progress.node_group)
                    .await
                    .context(error::ClientSnafu {
                        action: format!("authorize node group '{}'", progress.node_group.name),
                        resources: Resources::Remaining,
                    })?;
            }
            CreationStep::WaitForNodes => {
                let cluster = required(&mut progress.cluster, step, CreationStep::Connect)?;
                let min_nodes = progress.node_group.effective_min_size() as usize;
                wait::wait_for_nodes(cluster, min_nodes, self.provider.wait_timeout).await?;
            }
            CreationStep::AddStorageClass => {
                let config = required(&mut progress.config, step, CreationStep::Validate)?;
                if !config.addons.storage_class {
                    return Ok(());
                }
                let cluster = required(&mut progress.cluster, step, CreationStep::Connect)?;
                self.infra
                    .add_default_storage_class(cluster)
                    .await
                    .context(error::ClientSnafu {
                        action: "add the default storage class",
                        resources: Resources::Remaining,
                    })?;
            }
            CreationStep::CheckClientTools => {
                let access = required(&mut progress.access, step, CreationStep::WriteKubeconfig)?;
                self.workstation
                    .check_client_tools(access, progress.kubeconfig_path.as_deref())
                    .context(error::ClientSnafu {
                        action: "find the tools needed to use the cluster",
                        resources: Resources::Remaining,
                    })?;
            }
            CreationStep::GpuInstructions => {
                if progress.node_group.is_gpu() {
                    info!(
                        "As you are using a GPU instance type, you will need to install the NVIDIA \
                        Kubernetes device plugin: \
                        kubectl create -f https://raw.githubusercontent.com/NVIDIA/k8s-device-plugin/v0.13.0/nvidia-device-plugin.yml"
                    );
                }
            }
        }
        Ok(())
    }

    /// Local checks first, then the region, then credentials.
    async fn validate(
        &self,
        request: &CreateClusterRequest,
    ) -> Result<(ClusterConfig, Option<KubeconfigTarget>)> {
        let name = resolve_name(
            request.name_flag.as_deref(),
            request.name_argument.as_deref(),
        )?
        .unwrap_or_else(generate_cluster_name);
        let target = request.kubeconfig.target()?;
        request.network.strategy()?;
        ensure!(
            !request.node_group.ssh_public_key_path.trim().is_empty(),
            error::MissingFieldSnafu {
                what: "--ssh-public-key must be a non-empty string",
            }
        );
        validate_node_group(&request.node_group)?;

        ensure!(
            self.infra.is_supported_region(),
            error::UnsupportedRegionSnafu {
                region: &self.provider.region,
            }
        );
        self.infra.check_auth().await.context(error::AuthSnafu)?;

        info!("Using region {}", self.provider.region);
        let mut config = ClusterConfig::new(ClusterIdentity::new(name, &self.provider.region));
        config.version = request.version.clone();
        config.tags = request.tags.clone();
        config.addons = request.addons.clone();
        if let Some(cidr) = request.network.cidr {
            config.vpc.cidr = cidr;
        }
        Ok((config, target))
    }

    async fn resolve_image(&self, config: &ClusterConfig, node_group: &mut NodeGroupSpec) -> Result<()> {
        if let MachineImage::Id(id) = &node_group.machine_image {
            info!("Using machine image '{}'", id);
            return Ok(());
        }
        let id = self
            .infra
            .resolve_image(config, node_group)
            .await
            .context(error::ClientSnafu {
                action: format!(
                    "resolve a {} machine image for instance type '{}'",
                    node_group.image_family, node_group.instance_type
                ),
                resources: Resources::Clear,
            })?;
        info!(
            "Using machine image '{}' for node group '{}'",
            id, node_group.name
        );
        node_group.machine_image = MachineImage::Id(id);
        Ok(())
    }

    async fn resolve_ssh_key(
        &self,
        config: &ClusterConfig,
        node_group: &mut NodeGroupSpec,
    ) -> Result<()> {
        if !node_group.allow_ssh {
            return Ok(());
        }
        let key_name = self
            .infra
            .load_ssh_public_key(config.name(), node_group)
            .await
            .context(error::ClientSnafu {
                action: format!(
                    "load SSH public key '{}'",
                    node_group.ssh_public_key_path
                ),
                resources: Resources::Clear,
            })?;
        info!("Using SSH key pair '{}'", key_name);
        node_group.ssh_key_name = Some(key_name);
        Ok(())
    }

    /// The join barrier: either everything was provisioned or nothing after this runs.
    async fn provision(&self, config: &ClusterConfig, node_group: &NodeGroupSpec) -> Result<()> {
        info!(
            "Creating cluster '{}' with node group '{}' ({} x {})",
            config.name(),
            node_group.name,
            node_group.desired_capacity,
            node_group.instance_type
        );
        let errors = self
            .infra
            .create_cluster_with_node_groups(config, std::slice::from_ref(node_group))
            .await;
        if errors.is_empty() {
            info!("All stacks of cluster '{}' were created", config.name());
            return Ok(());
        }
        error!(
            "{} error(s) occurred while creating cluster '{}' and its node group",
            errors.len(),
            config.name()
        );
        for e in &errors {
            error!("{}", e);
        }
        info!(
            "To clean up the resources that were created, run: {} delete cluster --region={} --name={}",
            eksflow_model::constants::TOOL_NAME,
            config.region(),
            config.name()
        );
        error::ProvisioningSnafu {
            cluster: config.name(),
            errors,
        }
        .fail()
    }
}

fn validate_node_group(node_group: &NodeGroupSpec) -> Result<()> {
    let desired = node_group.desired_capacity;
    let invalid = |reason: String| {
        Err(Error::InvalidNodeGroup {
            name: node_group.name.clone(),
            reason,
        })
    };
    if let Some(min) = node_group.min_size {
        if min > desired {
            return invalid(format!(
                "minimum size ({}) cannot be greater than the desired capacity ({})",
                min, desired
            ));
        }
    }
    if let Some(max) = node_group.max_size {
        if max < desired {
            return invalid(format!(
                "maximum size ({}) cannot be less than the desired capacity ({})",
                max, desired
            ));
        }
    }
    if node_group.instance_type.trim().is_empty() {
        return invalid("the instance type must be set".to_string());
    }
    Ok(())
}

/// Borrows the result of an earlier step.
fn required<'p, T>(
    value: &'p mut Option<T>,
    step: CreationStep,
    needs: CreationStep,
) -> Result<&'p mut T> {
    value.as_mut().context(error::StepOrderSnafu {
        step: step.name(),
        needs: needs.name(),
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn advisory_steps_run_last() {
        let first_advisory = CreationStep::SEQUENCE
            .iter()
            .position(CreationStep::is_advisory)
            .unwrap();
        assert!(CreationStep::SEQUENCE[first_advisory..]
            .iter()
            .all(CreationStep::is_advisory));
        assert_eq!(CreationStep::ADVISORY.len(), 2);
    }

    #[test]
    fn steps_move_forward_through_states() {
        let states: Vec<CreationState> = CreationStep::SEQUENCE
            .iter()
            .map(CreationStep::state)
            .collect();
        let order = [
            CreationState::Validating,
            CreationState::ResolvingNetwork,
            CreationState::ResolvingImage,
            CreationState::ResolvingSshKey,
            CreationState::ProvisioningStacks,
            CreationState::WaitingControlPlane,
            CreationState::AuthorizingNodes,
            CreationState::WaitingNodes,
            CreationState::Finalizing,
        ];
        let mut deduplicated = states.clone();
        deduplicated.dedup();
        assert_eq!(deduplicated, order);
    }

    #[test]
    fn kubeconfig_path_and_auto_conflict() {
        let request = KubeconfigRequest {
            path: Some(PathBuf::from("/tmp/kubeconfig")),
            auto: true,
            ..KubeconfigRequest::default()
        };
        assert!(matches!(
            request.target(),
            Err(Error::ConfigConflict { .. })
        ));
    }

    #[test]
    fn kubeconfig_not_written() {
        let request = KubeconfigRequest {
            write: false,
            auto: true,
            ..KubeconfigRequest::default()
        };
        assert_eq!(request.target().unwrap(), None);
    }

    #[test]
    fn node_group_sizes() {
        let mut node_group = NodeGroupSpec {
            desired_capacity: 3,
            min_size: Some(1),
            max_size: Some(5),
            ..NodeGroupSpec::default()
        };
        assert!(validate_node_group(&node_group).is_ok());
        node_group.min_size = Some(4);
        assert!(validate_node_group(&node_group).is_err());
        node_group.min_size = None;
        node_group.max_size = Some(2);
        assert!(validate_node_group(&node_group).is_err());
    }
}
