use crate::error::{self, Result};
use eksflow_model::constants::AMD_GPU_INSTANCE_FAMILIES;
use eksflow_model::{is_gpu_instance_type, ImageFamily, NodeGroupSpec};
use log::debug;
use snafu::{ensure, OptionExt, ResultExt};

/// The public parameter that holds the recommended image id for the node group.
pub(crate) fn image_parameter_name(version: &str, node_group: &NodeGroupSpec) -> Result<String> {
    let family = node_group.instance_type.split('.').next().unwrap_or_default();
    ensure!(
        !AMD_GPU_INSTANCE_FAMILIES.contains(&family),
        error::UnsupportedImageSnafu {
            family: node_group.image_family.to_string(),
            instance_type: &node_group.instance_type,
        }
    );
    let gpu = is_gpu_instance_type(&node_group.instance_type);
    let arm = is_arm_instance_type(&node_group.instance_type);
    Ok(match node_group.image_family {
        ImageFamily::AmazonLinux2 => {
            let variant = if gpu {
                "amazon-linux-2-gpu"
            } else if arm {
                "amazon-linux-2-arm64"
            } else {
                "amazon-linux-2"
            };
            format!(
                "/aws/service/eks/optimized-ami/{}/{}/recommended/image_id",
                version, variant
            )
        }
        ImageFamily::Ubuntu2004 | ImageFamily::Ubuntu1804 => {
            ensure!(
                !gpu,
                error::UnsupportedImageSnafu {
                    family: node_group.image_family.to_string(),
                    instance_type: &node_group.instance_type,
                }
            );
            let release = if node_group.image_family == ImageFamily::Ubuntu2004 {
                "20.04"
            } else {
                "18.04"
            };
            let arch = if arm { "arm64" } else { "amd64" };
            format!(
                "/aws/service/canonical/ubuntu/eks/{}/{}/stable/current/{}/hvm/ebs-gp2/ami-id",
                release, version, arch
            )
        }
    })
}

/// Graviton families carry a `g` right after the generation digit, e.g. `m6g` or `c7gn`.
fn is_arm_instance_type(instance_type: &str) -> bool {
    let family = instance_type.split('.').next().unwrap_or_default();
    let mut chars = family.chars().skip_while(|c| c.is_ascii_alphabetic());
    let graviton =
        chars.next().map(|c| c.is_ascii_digit()).unwrap_or(false) && chars.next() == Some('g');
    graviton || family == "a1"
}

pub(crate) async fn resolve(
    ssm: &aws_sdk_ssm::Client,
    version: &str,
    node_group: &NodeGroupSpec,
) -> Result<String> {
    let name = image_parameter_name(version, node_group)?;
    debug!("Reading image parameter '{}'", name);
    let output = ssm
        .get_parameter()
        .name(&name)
        .send()
        .await
        .context(error::ImageParameterSnafu { name: &name })?;
    output
        .parameter()
        .and_then(|parameter| parameter.value())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .context(error::ImageParameterValueSnafu { name })
}
