/*!

The [`Workstation`] of the user running the tool: kubeconfig files on the local disk and the
client tools found on `PATH`.

!*/

use crate::error::{self, Result};
use eksflow_model::constants::{KUBECONFIG_ENV, TOOL_NAME};
use eksflow_model::{ClusterAccess, ClusterIdentity};
use eksflow_orchestrator::clients::{ClientResult, KubeconfigLocation, KubeconfigTarget};
use eksflow_orchestrator::Workstation;
use log::{debug, info};
use serde_json::{json, Map, Value};
use snafu::{ensure, OptionExt, ResultExt};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

const CURRENT_CONTEXT: &str = "current-context";
const SECTIONS: [&str; 3] = ["clusters", "users", "contexts"];

#[derive(Clone, Debug)]
pub struct LocalWorkstation {
    /// The kubeconfig used when no other file is requested.
    default_path: PathBuf,
    /// Where per-cluster kubeconfig files are written.
    auto_dir: PathBuf,
}

impl LocalWorkstation {
    /// Uses the first file listed in `KUBECONFIG`, or `~/.kube/config`. Per-cluster files go to
    /// `~/.kube/eksflow/clusters`.
    pub fn new() -> Result<Self> {
        let home = dirs::home_dir().context(error::HomeDirectorySnafu)?;
        let default_path = std::env::var_os(KUBECONFIG_ENV)
            .and_then(|value| std::env::split_paths(&value).find(|p| !p.as_os_str().is_empty()))
            .unwrap_or_else(|| home.join(".kube").join("config"));
        Ok(Self::with_paths(
            default_path,
            home.join(".kube").join(TOOL_NAME).join("clusters"),
        ))
    }

    pub fn with_paths<P1, P2>(default_path: P1, auto_dir: P2) -> Self
    where
        P1: Into<PathBuf>,
        P2: Into<PathBuf>,
    {
        Self {
            default_path: default_path.into(),
            auto_dir: auto_dir.into(),
        }
    }

    pub fn default_path(&self) -> &Path {
        &self.default_path
    }

    fn auto_path(&self, identity: &ClusterIdentity) -> PathBuf {
        self.auto_dir.join(&identity.name)
    }

    fn write(&self, access: &ClusterAccess, target: &KubeconfigTarget) -> Result<PathBuf> {
        let path = match &target.location {
            KubeconfigLocation::Default => self.default_path.clone(),
            KubeconfigLocation::Auto => self.auto_path(&access.identity),
            KubeconfigLocation::Path(path) => path.clone(),
        };
        let document = if target.location == KubeconfigLocation::Auto {
            access.kubeconfig()
        } else {
            let mut document = load(&path)?;
            merge(&mut document, access, target.set_context);
            document
        };
        save(&path, &document)?;
        info!(
            "Saved kubeconfig for cluster '{}' to '{}'",
            access.identity.name,
            path.display()
        );
        Ok(path)
    }

    fn remove(&self, identity: &ClusterIdentity) -> Result<Option<PathBuf>> {
        let auto_path = self.auto_path(identity);
        if auto_path.is_file() {
            fs::remove_file(&auto_path).context(error::WriteFileSnafu { path: &auto_path })?;
            info!("Removed kubeconfig '{}'", auto_path.display());
            return Ok(Some(auto_path));
        }
        if !self.default_path.is_file() {
            return Ok(None);
        }
        let mut document = load(&self.default_path)?;
        if !strip(&mut document, identity) {
            debug!(
                "'{}' has no entries for cluster '{}'",
                self.default_path.display(),
                identity.name
            );
            return Ok(None);
        }
        save(&self.default_path, &document)?;
        info!(
            "Removed cluster '{}' from kubeconfig '{}'",
            identity.name,
            self.default_path.display()
        );
        Ok(Some(self.default_path.clone()))
    }
}

impl Workstation for LocalWorkstation {
    fn write_kubeconfig(
        &self,
        access: &ClusterAccess,
        target: &KubeconfigTarget,
    ) -> ClientResult<PathBuf> {
        Ok(self.write(access, target)?)
    }

    fn remove_kubeconfig(&self, identity: &ClusterIdentity) -> ClientResult<Option<PathBuf>> {
        Ok(self.remove(identity)?)
    }

    fn check_client_tools(
        &self,
        access: &ClusterAccess,
        kubeconfig: Option<&Path>,
    ) -> ClientResult<()> {
        let mut kubectl = vec!["version".to_string(), "--client".to_string()];
        if let Some(path) = kubeconfig {
            kubectl.push(format!("--kubeconfig={}", path.display()));
        }
        run("kubectl", &kubectl)?;
        run(&access.authenticator.command, &["--version".to_string()])?;
        Ok(())
    }
}

fn run(command: &str, args: &[String]) -> Result<()> {
    let display = format!("{} {}", command, args.join(" "));
    debug!("Running '{}'", display);
    let output = Command::new(command)
        .args(args)
        .output()
        .context(error::CommandSnafu { command: &display })?;
    ensure!(
        output.status.success(),
        error::CommandStatusSnafu {
            command: display,
            status: output.status.to_string(),
        }
    );
    Ok(())
}

fn empty_kubeconfig() -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "Config",
        "preferences": {},
        "clusters": [],
        "users": [],
        "contexts": [],
        CURRENT_CONTEXT: "",
    })
}

/// Reads a kubeconfig. A missing or empty file is an empty kubeconfig.
fn load(path: &Path) -> Result<Value> {
    if !path.exists() {
        return Ok(empty_kubeconfig());
    }
    let contents = fs::read_to_string(path).context(error::ReadFileSnafu { path })?;
    if contents.trim().is_empty() {
        return Ok(empty_kubeconfig());
    }
    let document: Value = serde_yaml::from_str(&contents).context(error::YamlSnafu {
        what: path.display().to_string(),
    })?;
    ensure!(
        document.is_object(),
        error::InvalidKubeconfigSnafu {
            path,
            reason: "the document is not a mapping",
        }
    );
    Ok(document)
}

fn save(path: &Path, document: &Value) -> Result<()> {
    let yaml = serde_yaml::to_string(document).context(error::YamlSnafu {
        what: path.display().to_string(),
    })?;
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).context(error::WriteFileSnafu { path: parent })?;
    }
    fs::write(path, yaml).context(error::WriteFileSnafu { path })?;
    restrict_permissions(path)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .context(error::WriteFileSnafu { path })
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

/// Adds or replaces the cluster, user and context entries of the cluster.
fn merge(document: &mut Value, access: &ClusterAccess, set_context: bool) {
    let context_name = access.identity.kubeconfig_context_name();
    let kubeconfig = access.kubeconfig();
    for (section, entry) in [
        ("clusters", access.cluster_entry()),
        ("users", access.user_entry()),
        ("contexts", kubeconfig["contexts"][0].clone()),
    ] {
        if let Some(entries) = section_mut(document, section) {
            let name = entry.get("name").cloned();
            match entries
                .iter_mut()
                .find(|existing| existing.get("name") == name.as_ref())
            {
                Some(existing) => *existing = entry,
                None => entries.push(entry),
            }
        }
    }
    if set_context {
        if let Some(object) = document.as_object_mut() {
            object.insert(CURRENT_CONTEXT.to_string(), Value::String(context_name));
        }
    }
}

/// Removes the entries of the cluster. Returns `true` if anything was removed.
fn strip(document: &mut Value, identity: &ClusterIdentity) -> bool {
    let cluster_name = identity.kubeconfig_cluster_name();
    let context_name = identity.kubeconfig_context_name();
    let mut removed = false;
    for section in SECTIONS {
        let name = if section == "clusters" {
            &cluster_name
        } else {
            &context_name
        };
        if let Some(entries) = section_mut(document, section) {
            let before = entries.len();
            entries
                .retain(|entry| entry.get("name").and_then(Value::as_str) != Some(name.as_str()));
            removed |= entries.len() != before;
        }
    }
    if let Some(object) = document.as_object_mut() {
        if object.get(CURRENT_CONTEXT).and_then(Value::as_str) == Some(context_name.as_str()) {
            object.insert(CURRENT_CONTEXT.to_string(), Value::String(String::new()));
        }
    }
    removed
}

fn section_mut<'a>(document: &'a mut Value, section: &str) -> Option<&'a mut Vec<Value>> {
    let object: &mut Map<String, Value> = document.as_object_mut()?;
    let entries = object
        .entry(section)
        .or_insert_with(|| Value::Array(Vec::new()));
    if !entries.is_array() {
        *entries = Value::Array(Vec::new());
    }
    entries.as_array_mut()
}
