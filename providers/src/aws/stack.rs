/*!

CloudFormation stacks: naming, creation and deletion with bounded waits, and lookup of stack
outputs.

!*/

use crate::error::{self, Result};
use aws_sdk_cloudformation::error::DescribeStacksError;
use aws_sdk_cloudformation::model::{Capability, Output, Stack, StackStatus, Tag};
use aws_sdk_cloudformation::types::SdkError;
use eksflow_model::constants::{TAG_CLUSTER_NAME, TOOL_NAME};
use eksflow_model::ClusterIdentity;
use log::{debug, info};
use serde_json::Value;
use snafu::{OptionExt, ResultExt};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::sleep;

const STACK_POLL_INTERVAL: Duration = Duration::from_secs(20);

pub fn cluster_stack_name(cluster: &str) -> String {
    format!("{}-{}-cluster", TOOL_NAME, cluster)
}

pub fn node_group_stack_prefix(cluster: &str) -> String {
    format!("{}-{}-nodegroup-", TOOL_NAME, cluster)
}

pub fn node_group_stack_name(cluster: &str, node_group: &str) -> String {
    format!("{}{}", node_group_stack_prefix(cluster), node_group)
}

/// The stacks created by releases that used one stack per component.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LegacyStack {
    ControlPlane,
    ServiceRole,
    Vpc,
    DefaultNodeGroup,
}

impl LegacyStack {
    pub fn name(&self, identity: &ClusterIdentity) -> String {
        let suffix = match self {
            LegacyStack::ControlPlane => "ControlPlane",
            LegacyStack::ServiceRole => "ServiceRole",
            LegacyStack::Vpc => "VPC",
            LegacyStack::DefaultNodeGroup => "DefaultNodeGroup",
        };
        format!("EKS-{}-{}", identity.name, suffix)
    }
}

/// Creates, inspects and deletes stacks, waiting at most `timeout` for each to settle.
#[derive(Clone, Debug)]
pub struct StackManager {
    client: aws_sdk_cloudformation::Client,
    timeout: Duration,
}

impl StackManager {
    pub fn new(client: aws_sdk_cloudformation::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Creates the stack and waits for `CREATE_COMPLETE`. Returns the stack outputs by key.
    pub async fn create(
        &self,
        name: &str,
        template: &Value,
        tags: &BTreeMap<String, String>,
    ) -> Result<BTreeMap<String, String>> {
        let body = serde_json::to_string(template).context(error::TemplateSnafu { stack: name })?;
        info!("Creating stack '{}'", name);
        debug!("Template of stack '{}':\n{}", name, body);
        let mut request = self
            .client
            .create_stack()
            .stack_name(name)
            .template_body(body)
            .capabilities(Capability::CapabilityIam);
        for (key, value) in tags {
            request = request.tags(Tag::builder().key(key).value(value).build());
        }
        request
            .send()
            .await
            .context(error::CreateStackSnafu { stack: name })?;

        let stack = self
            .wait_for(
                name,
                StackStatus::CreateComplete,
                StackStatus::CreateInProgress,
                None,
            )
            .await?
            .context(error::StackNotFoundSnafu { stack: name })?;
        info!("Created stack '{}'", name);
        Ok(outputs(&stack))
    }

    /// Starts deleting the stack, and waits for `DELETE_COMPLETE` when `wait` is set. A stack that
    /// does not exist is an error.
    pub async fn delete(&self, name: &str, wait: bool) -> Result<()> {
        let previous = self
            .describe(name)
            .await?
            .context(error::StackNotFoundSnafu { stack: name })?
            .stack_status()
            .cloned();
        info!("Deleting stack '{}'", name);
        self.client
            .delete_stack()
            .stack_name(name)
            .send()
            .await
            .context(error::DeleteStackSnafu { stack: name })?;
        if wait {
            self.wait_for(
                name,
                StackStatus::DeleteComplete,
                StackStatus::DeleteInProgress,
                previous,
            )
            .await?;
            info!("Deleted stack '{}'", name);
        }
        Ok(())
    }

    /// The outputs of an existing stack.
    pub async fn outputs(&self, name: &str) -> Result<BTreeMap<String, String>> {
        let stack = self
            .describe(name)
            .await?
            .context(error::StackNotFoundSnafu { stack: name })?;
        Ok(outputs(&stack))
    }

    /// Names of the live stacks starting with `prefix` that belong to `cluster`. The prefix alone
    /// also matches clusters whose name extends `cluster`, so the cluster tag decides.
    pub async fn list_owned(&self, prefix: &str, cluster: &str) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let output = self
                .client
                .describe_stacks()
                .set_next_token(next_token.take())
                .send()
                .await
                .context(error::ListStacksSnafu)?;
            names.extend(
                output
                    .stacks()
                    .unwrap_or_default()
                    .iter()
                    .filter(|stack| owned_by(stack, prefix, cluster))
                    .filter_map(|stack| stack.stack_name())
                    .map(str::to_string),
            );
            match output.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }
        Ok(names)
    }

    /// Describes the stack, or returns `None` if it does not exist.
    async fn describe(&self, name: &str) -> Result<Option<Stack>> {
        let result = self.client.describe_stacks().stack_name(name).send().await;
        if does_not_exist(&result) {
            return Ok(None);
        }
        Ok(result
            .context(error::DescribeStackSnafu { stack: name })?
            .stacks()
            .and_then(|stacks| stacks.first())
            .cloned())
    }

    /// Polls the stack until it reaches `target`, for at most the manager's timeout. `previous` is
    /// the status before the request was made.
    async fn wait_for(
        &self,
        name: &str,
        target: StackStatus,
        pending: StackStatus,
        previous: Option<StackStatus>,
    ) -> Result<Option<Stack>> {
        let expected = Expected {
            target,
            pending,
            previous,
        };
        tokio::time::timeout(self.timeout, self.poll(name, &expected))
            .await
            .ok()
            .context(error::StackTimeoutSnafu {
                stack: name,
                status: expected.target.as_str(),
            })?
    }

    async fn poll(&self, name: &str, expected: &Expected) -> Result<Option<Stack>> {
        let deleting = expected.target == StackStatus::DeleteComplete;
        loop {
            let stack = match self.describe(name).await? {
                Some(stack) => stack,
                None if deleting => return Ok(None),
                None => return error::StackNotFoundSnafu { stack: name }.fail(),
            };
            let status = stack.stack_status();
            match expected.progress(status) {
                Progress::Done => return Ok(Some(stack)),
                Progress::Pending => {
                    debug!(
                        "Stack '{}' is {}",
                        name,
                        status.map(|s| s.as_str()).unwrap_or("unknown")
                    );
                }
                Progress::Failed => {
                    return error::StackFailedSnafu {
                        stack: name,
                        status: status.map(|s| s.as_str()).unwrap_or("unknown"),
                        reason: stack.stack_status_reason().unwrap_or("no reason given"),
                    }
                    .fail()
                }
            }
            sleep(STACK_POLL_INTERVAL).await;
        }
    }
}

/// The statuses a wait is looking for.
struct Expected {
    target: StackStatus,
    pending: StackStatus,
    /// The status before the request. The first descriptions after a request can still report
    /// it, so it counts as pending.
    previous: Option<StackStatus>,
}

#[derive(Debug, Eq, PartialEq)]
enum Progress {
    Done,
    Pending,
    Failed,
}

impl Expected {
    /// Any status other than the target, the pending status or the previous status is a failure.
    fn progress(&self, status: Option<&StackStatus>) -> Progress {
        match status {
            Some(status) if *status == self.target => Progress::Done,
            Some(status) if *status == self.pending => Progress::Pending,
            Some(status) if Some(status) == self.previous.as_ref() => Progress::Pending,
            _ => Progress::Failed,
        }
    }
}

/// Whether the stack is named with `prefix` and tagged as part of `cluster`.
fn owned_by(stack: &Stack, prefix: &str, cluster: &str) -> bool {
    stack
        .stack_name()
        .map(|name| name.starts_with(prefix))
        .unwrap_or(false)
        && stack
            .tags()
            .unwrap_or_default()
            .iter()
            .any(|tag| tag.key() == Some(TAG_CLUSTER_NAME) && tag.value() == Some(cluster))
}

fn outputs(stack: &Stack) -> BTreeMap<String, String> {
    stack
        .outputs()
        .unwrap_or_default()
        .iter()
        .filter_map(|output: &Output| {
            Some((
                output.output_key()?.to_string(),
                output.output_value()?.to_string(),
            ))
        })
        .collect()
}

/// CloudFormation reports a missing stack as a validation error.
fn does_not_exist<T>(result: &std::result::Result<T, SdkError<DescribeStacksError>>) -> bool {
    if let Err(SdkError::ServiceError(service_error)) = result {
        return service_error
            .err()
            .message()
            .map(|message| message.contains("does not exist"))
            .unwrap_or(false);
    }
    false
}

/// Looks up a required output.
pub fn output<'a>(outputs: &'a BTreeMap<String, String>, stack: &str, key: &str) -> Result<&'a str> {
    outputs
        .get(key)
        .map(String::as_str)
        .context(error::StackOutputSnafu { stack, key })
}
