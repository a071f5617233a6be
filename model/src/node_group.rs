use crate::constants::{DEFAULT_NODE_COUNT, DEFAULT_NODE_TYPE, DEFAULT_SSH_PUBLIC_KEY};
use crate::error::{self, Result};
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// The machine image for the nodes: either looked up for the instance type and region, or
/// pinned to a specific id.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MachineImage {
    #[default]
    Auto,
    Id(String),
}

impl MachineImage {
    pub fn id(&self) -> Option<&str> {
        match self {
            MachineImage::Auto => None,
            MachineImage::Id(id) => Some(id),
        }
    }
}

impl FromStr for MachineImage {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        Ok(if s.is_empty() || s.eq_ignore_ascii_case("auto") || s.eq_ignore_ascii_case("static")
        {
            MachineImage::Auto
        } else {
            MachineImage::Id(s.to_string())
        })
    }
}

impl Display for MachineImage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MachineImage::Auto => write!(f, "auto"),
            MachineImage::Id(id) => write!(f, "{}", id),
        }
    }
}

impl TryFrom<String> for MachineImage {
    type Error = crate::Error;

    fn try_from(value: String) -> Result<Self> {
        Self::from_str(&value)
    }
}

impl From<MachineImage> for String {
    fn from(image: MachineImage) -> Self {
        image.to_string()
    }
}

/// The operating system family of the node machine image.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum ImageFamily {
    #[default]
    AmazonLinux2,
    Ubuntu2004,
    Ubuntu1804,
}

serde_plain::derive_display_from_serialize!(ImageFamily);

impl FromStr for ImageFamily {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(serde_plain::from_str(s).context(error::SerdePlainSnafu)?)
    }
}

/// The initial node group of a cluster.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeGroupSpec {
    pub name: String,
    pub instance_type: String,
    pub desired_capacity: u32,
    pub min_size: Option<u32>,
    pub max_size: Option<u32>,
    /// Root volume size in GiB. The image default is used when absent.
    pub volume_size: Option<u32>,
    pub max_pods_per_node: Option<u32>,
    pub machine_image: MachineImage,
    pub image_family: ImageFamily,
    pub ssh_public_key_path: String,
    /// The key pair name, filled in once the public key has been imported or validated.
    pub ssh_key_name: Option<String>,
    pub allow_ssh: bool,
    pub private_networking: bool,
}

impl Default for NodeGroupSpec {
    fn default() -> Self {
        Self {
            name: generate_node_group_name(),
            instance_type: DEFAULT_NODE_TYPE.to_string(),
            desired_capacity: DEFAULT_NODE_COUNT,
            min_size: None,
            max_size: None,
            volume_size: None,
            max_pods_per_node: None,
            machine_image: MachineImage::Auto,
            image_family: ImageFamily::AmazonLinux2,
            ssh_public_key_path: DEFAULT_SSH_PUBLIC_KEY.to_string(),
            ssh_key_name: None,
            allow_ssh: false,
            private_networking: false,
        }
    }
}

impl NodeGroupSpec {
    /// The minimum size of the group. Defaults to the desired capacity.
    pub fn effective_min_size(&self) -> u32 {
        self.min_size.unwrap_or(self.desired_capacity)
    }

    /// The maximum size of the group. Defaults to the desired capacity.
    pub fn effective_max_size(&self) -> u32 {
        self.max_size.unwrap_or(self.desired_capacity)
    }

    pub fn is_gpu(&self) -> bool {
        crate::is_gpu_instance_type(&self.instance_type)
    }
}

fn generate_node_group_name() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("ng-{}", &id[..8])
}
