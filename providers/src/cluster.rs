/*!

A [`ClusterClient`] backed by the Kubernetes API, plus the two changes made to a new cluster: the
node role mapping in `aws-auth` and the default storage class.

!*/

use crate::error::{self, Result};
use async_trait::async_trait;
use eksflow_model::constants::TOOL_NAME;
use eksflow_model::ClusterAccess;
use eksflow_orchestrator::clients::{ClientResult, ClusterClient};
use k8s_openapi::api::core::v1::{ConfigMap, Node};
use k8s_openapi::api::storage::v1::StorageClass;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Patch, PatchParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};
use log::{debug, info};
use maplit::btreemap;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use std::path::Path;

const AUTH_CONFIG_MAP: &str = "aws-auth";
const AUTH_NAMESPACE: &str = "kube-system";
const MAP_ROLES_KEY: &str = "mapRoles";
const NODE_USERNAME: &str = "system:node:{{EC2PrivateDNSName}}";
const NODE_GROUPS: &[&str] = &["system:bootstrappers", "system:nodes"];

const STORAGE_CLASS_NAME: &str = "gp2";
const STORAGE_CLASS_PROVISIONER: &str = "kubernetes.io/aws-ebs";
const DEFAULT_CLASS_ANNOTATION: &str = "storageclass.kubernetes.io/is-default-class";

/// An IAM role mapped to Kubernetes groups in `aws-auth`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
struct RoleMapping {
    rolearn: String,
    username: String,
    #[serde(default)]
    groups: Vec<String>,
}

/// A client for the API server of a running cluster.
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    /// Connects with the cluster's own kubeconfig document.
    pub async fn from_access(access: &ClusterAccess) -> Result<Self> {
        let yaml = serde_yaml::to_string(&access.kubeconfig()).context(error::YamlSnafu {
            what: "cluster kubeconfig",
        })?;
        Self::from_kubeconfig(Kubeconfig::from_yaml(&yaml).context(error::KubeconfigBuildSnafu)?)
            .await
    }

    /// Connects with the current context of a kubeconfig file.
    pub async fn from_kubeconfig_path(path: &Path) -> Result<Self> {
        Self::from_kubeconfig(Kubeconfig::read_from(path).context(error::KubeconfigBuildSnafu)?)
            .await
    }

    async fn from_kubeconfig(kubeconfig: Kubeconfig) -> Result<Self> {
        let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .context(error::KubeconfigBuildSnafu)?;
        Ok(Self {
            client: Client::try_from(config).context(error::KubeClientSnafu)?,
        })
    }

    /// Maps the node instance role in `aws-auth` so that instances can register as nodes. The
    /// mapping is added once; existing mappings are kept.
    pub async fn map_node_role(&self, role_arn: &str) -> Result<()> {
        let api = Api::<ConfigMap>::namespaced(self.client.clone(), AUTH_NAMESPACE);
        let existing = api.get_opt(AUTH_CONFIG_MAP).await.context(error::KubeRequestSnafu {
            what: "read the aws-auth config map",
        })?;
        let current = existing
            .and_then(|config_map| config_map.data)
            .and_then(|mut data| data.remove(MAP_ROLES_KEY))
            .unwrap_or_default();
        let map_roles = match add_node_role(&current, role_arn)? {
            Some(map_roles) => map_roles,
            None => {
                debug!("Role '{}' is already mapped", role_arn);
                return Ok(());
            }
        };

        info!("Mapping node role '{}' in '{}'", role_arn, AUTH_CONFIG_MAP);
        let config_map = ConfigMap {
            metadata: ObjectMeta {
                name: Some(AUTH_CONFIG_MAP.to_string()),
                namespace: Some(AUTH_NAMESPACE.to_string()),
                ..Default::default()
            },
            data: Some(btreemap! { MAP_ROLES_KEY.to_string() => map_roles }),
            ..Default::default()
        };
        api.patch(
            AUTH_CONFIG_MAP,
            &PatchParams::apply(TOOL_NAME).force(),
            &Patch::Apply(&config_map),
        )
        .await
        .context(error::KubeRequestSnafu {
            what: "update the aws-auth config map",
        })?;
        Ok(())
    }

    /// Creates the `gp2` storage class and marks it as the default.
    pub async fn add_default_storage_class(&self) -> Result<()> {
        let api = Api::<StorageClass>::all(self.client.clone());
        let storage_class = StorageClass {
            metadata: ObjectMeta {
                name: Some(STORAGE_CLASS_NAME.to_string()),
                annotations: Some(btreemap! {
                    DEFAULT_CLASS_ANNOTATION.to_string() => "true".to_string()
                }),
                ..Default::default()
            },
            provisioner: STORAGE_CLASS_PROVISIONER.to_string(),
            parameters: Some(btreemap! {
                "type".to_string() => STORAGE_CLASS_NAME.to_string(),
                "fsType".to_string() => "ext4".to_string(),
            }),
            reclaim_policy: Some("Delete".to_string()),
            ..Default::default()
        };
        info!("Creating default storage class '{}'", STORAGE_CLASS_NAME);
        api.patch(
            STORAGE_CLASS_NAME,
            &PatchParams::apply(TOOL_NAME).force(),
            &Patch::Apply(&storage_class),
        )
        .await
        .context(error::KubeRequestSnafu {
            what: "create the default storage class",
        })?;
        Ok(())
    }
}

#[async_trait]
impl ClusterClient for KubeCluster {
    async fn control_plane_ready(&self) -> ClientResult<bool> {
        let version = self
            .client
            .apiserver_version()
            .await
            .context(error::KubeRequestSnafu {
                what: "reach the API server",
            })?;
        debug!("API server version is {}", version.git_version);
        Ok(true)
    }

    async fn ready_node_count(&self) -> ClientResult<usize> {
        let nodes = Api::<Node>::all(self.client.clone())
            .list(&Default::default())
            .await
            .context(error::KubeRequestSnafu { what: "list nodes" })?;
        Ok(nodes.iter().filter(|node| is_ready(node)).count())
    }
}

fn is_ready(node: &Node) -> bool {
    node.status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .any(|condition| condition.type_ == "Ready" && condition.status == "True")
        })
        .unwrap_or(false)
}

/// Returns the `mapRoles` document with a node mapping for `role_arn` appended, or `None` if the
/// role is already mapped.
fn add_node_role(map_roles: &str, role_arn: &str) -> Result<Option<String>> {
    let mut mappings: Vec<RoleMapping> = if map_roles.trim().is_empty() {
        Vec::new()
    } else {
        serde_yaml::from_str(map_roles).context(error::YamlSnafu { what: MAP_ROLES_KEY })?
    };
    if mappings.iter().any(|mapping| mapping.rolearn == role_arn) {
        return Ok(None);
    }
    mappings.push(RoleMapping {
        rolearn: role_arn.to_string(),
        username: NODE_USERNAME.to_string(),
        groups: NODE_GROUPS.iter().map(|group| group.to_string()).collect(),
    });
    serde_yaml::to_string(&mappings)
        .context(error::YamlSnafu { what: MAP_ROLES_KEY })
        .map(Some)
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    const ROLE: &str = "arn:aws:iam::111122223333:role/eksflow-dev-nodegroup-NodeInstanceRole-1";

    #[test]
    fn node_readiness() {
        let node: Node = serde_json::from_value(json!({
            "metadata": { "name": "ip-192-168-1-1.us-west-2.compute.internal" },
            "status": {
                "conditions": [
                    { "type": "MemoryPressure", "status": "False" },
                    { "type": "Ready", "status": "True" },
                ],
            },
        }))
        .unwrap();
        assert!(is_ready(&node));

        let not_ready: Node = serde_json::from_value(json!({
            "metadata": { "name": "ip-192-168-1-2.us-west-2.compute.internal" },
            "status": { "conditions": [{ "type": "Ready", "status": "Unknown" }] },
        }))
        .unwrap();
        assert!(!is_ready(&not_ready));
        assert!(!is_ready(&Node::default()));
    }

    #[test]
    fn first_role_mapping() {
        let map_roles = add_node_role("", ROLE).unwrap().unwrap();
        let mappings: Vec<RoleMapping> = serde_yaml::from_str(&map_roles).unwrap();
        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings[0].rolearn, ROLE);
        assert_eq!(mappings[0].username, "system:node:{{EC2PrivateDNSName}}");
        assert_eq!(mappings[0].groups, vec!["system:bootstrappers", "system:nodes"]);
    }

    #[test]
    fn existing_mappings_are_kept() {
        let existing = "- rolearn: arn:aws:iam::111122223333:role/admin\n  username: admin\n  groups:\n    - system:masters\n";
        let map_roles = add_node_role(existing, ROLE).unwrap().unwrap();
        let mappings: Vec<RoleMapping> = serde_yaml::from_str(&map_roles).unwrap();
        assert_eq!(mappings.len(), 2);
        assert_eq!(mappings[0].username, "admin");

        assert_eq!(add_node_role(&map_roles, ROLE).unwrap(), None);
    }
}
