use crate::ClusterIdentity;
use maplit::btreemap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// A client-go exec credential plugin, e.g. `aws eks get-token --cluster-name dev`.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecAuthenticator {
    pub command: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
}

/// Everything needed to reach the API server of a running cluster.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterAccess {
    pub identity: ClusterIdentity,
    pub endpoint: String,
    /// Base64 encoded PEM bundle of the cluster certificate authority.
    pub certificate_authority_data: String,
    pub authenticator: ExecAuthenticator,
}

impl ClusterAccess {
    /// Renders a self-contained kubeconfig document with a single cluster, user and context,
    /// with the context selected.
    pub fn kubeconfig(&self) -> Value {
        let cluster_name = self.identity.kubeconfig_cluster_name();
        let context_name = self.identity.kubeconfig_context_name();
        json!({
            "apiVersion": "v1",
            "kind": "Config",
            "preferences": {},
            "clusters": [self.cluster_entry()],
            "users": [self.user_entry()],
            "contexts": [{
                "name": context_name,
                "context": {
                    "cluster": cluster_name,
                    "user": context_name,
                },
            }],
            "current-context": context_name,
        })
    }

    /// The named cluster entry of the kubeconfig.
    pub fn cluster_entry(&self) -> Value {
        json!({
            "name": self.identity.kubeconfig_cluster_name(),
            "cluster": {
                "server": self.endpoint,
                "certificate-authority-data": self.certificate_authority_data,
            },
        })
    }

    /// The named user entry of the kubeconfig.
    pub fn user_entry(&self) -> Value {
        let env: Vec<BTreeMap<&str, &str>> = self
            .authenticator
            .env
            .iter()
            .map(|(name, value)| btreemap! { "name" => name.as_str(), "value" => value.as_str() })
            .collect();
        let mut exec = json!({
            "apiVersion": "client.authentication.k8s.io/v1beta1",
            "command": self.authenticator.command,
            "args": self.authenticator.args,
        });
        if !env.is_empty() {
            exec["env"] = json!(env);
        }
        json!({
            "name": self.identity.kubeconfig_context_name(),
            "user": { "exec": exec },
        })
    }
}
