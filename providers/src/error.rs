use aws_sdk_cloudformation::error::{CreateStackError, DeleteStackError, DescribeStacksError};
use aws_sdk_ec2::error::{
    DeleteKeyPairError, DescribeAvailabilityZonesError, DescribeKeyPairsError,
    DescribeSubnetsError, DescribeVpcsError, ImportKeyPairError,
};
use aws_sdk_ec2::types::SdkError;
use aws_sdk_eks::error::{DeleteClusterError, DescribeClusterError, ListClustersError};
use aws_sdk_ssm::error::GetParameterError;
use aws_sdk_sts::error::GetCallerIdentityError;
use eksflow_orchestrator::clients::ClientError;
use snafu::Snafu;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Unable to verify AWS credentials: {}", source))]
    CallerIdentity {
        source: SdkError<GetCallerIdentityError>,
    },

    #[snafu(display("Unable to list availability zones: {}", source))]
    AvailabilityZones {
        source: SdkError<DescribeAvailabilityZonesError>,
    },

    #[snafu(display("Unable to describe subnets: {}", source))]
    DescribeSubnets {
        source: SdkError<DescribeSubnetsError>,
    },

    #[snafu(display("Unable to describe VPC '{}': {}", vpc_id, source))]
    DescribeVpc {
        vpc_id: String,
        source: SdkError<DescribeVpcsError>,
    },

    #[snafu(display("No subnets are tagged with 'KubernetesCluster={}'", reference))]
    ExternalNetworkNotFound { reference: String },

    #[snafu(display(
        "The subnets of cluster '{}' belong to more than one VPC: {:?}",
        reference,
        vpc_ids
    ))]
    ExternalNetworkVpcs {
        reference: String,
        vpc_ids: Vec<String>,
    },

    #[snafu(display("Subnet response is missing '{}'", what))]
    SubnetData { what: String },

    #[snafu(display("Invalid CIDR '{}': {}", input, source))]
    Cidr {
        input: String,
        source: eksflow_model::Error,
    },

    #[snafu(display("Unable to read image parameter '{}': {}", name, source))]
    ImageParameter {
        name: String,
        source: SdkError<GetParameterError>,
    },

    #[snafu(display("Image parameter '{}' has no value", name))]
    ImageParameterValue { name: String },

    #[snafu(display(
        "Image family '{}' does not support instance type '{}'",
        family,
        instance_type
    ))]
    UnsupportedImage {
        family: String,
        instance_type: String,
    },

    #[snafu(display("Unable to read public key '{}': {}", path.display(), source))]
    ReadPublicKey {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("'{}' is not an OpenSSH public key", path.display()))]
    InvalidPublicKey { path: PathBuf },

    #[snafu(display("Key pair '{}' does not exist", name))]
    KeyPairNotFound { name: String },

    #[snafu(display("Unable to describe key pairs: {}", source))]
    DescribeKeyPairs {
        source: SdkError<DescribeKeyPairsError>,
    },

    #[snafu(display("Unable to import key pair '{}': {}", name, source))]
    ImportKeyPair {
        name: String,
        source: SdkError<ImportKeyPairError>,
    },

    #[snafu(display("Unable to delete key pair '{}': {}", name, source))]
    DeleteKeyPair {
        name: String,
        source: SdkError<DeleteKeyPairError>,
    },

    #[snafu(display("Unable to delete key pairs: {}", details))]
    DeleteKeyPairs { details: String },

    #[snafu(display("Unable to serialize the template of stack '{}': {}", stack, source))]
    Template {
        stack: String,
        source: serde_json::Error,
    },

    #[snafu(display("Unable to create stack '{}': {}", stack, source))]
    CreateStack {
        stack: String,
        source: SdkError<CreateStackError>,
    },

    #[snafu(display("Unable to describe stack '{}': {}", stack, source))]
    DescribeStack {
        stack: String,
        source: SdkError<DescribeStacksError>,
    },

    #[snafu(display("Unable to delete stack '{}': {}", stack, source))]
    DeleteStack {
        stack: String,
        source: SdkError<DeleteStackError>,
    },

    #[snafu(display("Unable to list stacks: {}", source))]
    ListStacks {
        source: SdkError<DescribeStacksError>,
    },

    #[snafu(display("Stack '{}' does not exist", stack))]
    StackNotFound { stack: String },

    #[snafu(display("Stack '{}' reached status '{}': {}", stack, status, reason))]
    StackFailed {
        stack: String,
        status: String,
        reason: String,
    },

    #[snafu(display("Timed out waiting for stack '{}' to reach '{}'", stack, status))]
    StackTimeout { stack: String, status: String },

    #[snafu(display("Stack '{}' is missing output '{}'", stack, key))]
    StackOutput { stack: String, key: String },

    #[snafu(display("Unable to describe cluster '{}': {}", cluster, source))]
    DescribeCluster {
        cluster: String,
        source: SdkError<DescribeClusterError>,
    },

    #[snafu(display("Cluster '{}' does not exist", cluster))]
    ClusterNotFound { cluster: String },

    #[snafu(display("Description of cluster '{}' is missing '{}'", cluster, what))]
    ClusterData { cluster: String, what: String },

    #[snafu(display("Unable to delete cluster '{}': {}", cluster, source))]
    DeleteCluster {
        cluster: String,
        source: SdkError<DeleteClusterError>,
    },

    #[snafu(display("Unable to list clusters in '{}': {}", region, source))]
    ListClusters {
        region: String,
        source: SdkError<ListClustersError>,
    },

    #[snafu(display("Unable to build a kubeconfig for the cluster: {}", source))]
    KubeconfigBuild {
        source: kube::config::KubeconfigError,
    },

    #[snafu(display("Unable to create a client for the cluster: {}", source))]
    KubeClient { source: kube::Error },

    #[snafu(display("Unable to {}: {}", what, source))]
    KubeRequest { what: String, source: kube::Error },

    #[snafu(display("Unable to (de)serialize '{}': {}", what, source))]
    Yaml {
        what: String,
        source: serde_yaml::Error,
    },

    #[snafu(display("Unable to determine the home directory"))]
    HomeDirectory,

    #[snafu(display("Unable to read '{}': {}", path.display(), source))]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Unable to write '{}': {}", path.display(), source))]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("'{}' is not a valid kubeconfig: {}", path.display(), reason))]
    InvalidKubeconfig { path: PathBuf, reason: String },

    #[snafu(display("Unable to run '{}': {}", command, source))]
    Command {
        command: String,
        source: std::io::Error,
    },

    #[snafu(display("'{}' failed with {}", command, status))]
    CommandStatus { command: String, status: String },
}

impl From<Error> for ClientError {
    fn from(e: Error) -> Self {
        match e {
            Error::ExternalNetworkNotFound { .. }
            | Error::KeyPairNotFound { .. }
            | Error::StackNotFound { .. }
            | Error::ClusterNotFound { .. } => ClientError::not_found(e.to_string()),
            Error::SubnetData { .. }
            | Error::ImageParameterValue { .. }
            | Error::StackOutput { .. }
            | Error::ClusterData { .. } => ClientError::missing_data(e.to_string()),
            Error::ExternalNetworkVpcs { .. }
            | Error::UnsupportedImage { .. }
            | Error::InvalidPublicKey { .. }
            | Error::InvalidKubeconfig { .. }
            | Error::Cidr { .. } => ClientError::invalid_input(e.to_string()),
            Error::HomeDirectory
            | Error::ReadPublicKey { .. }
            | Error::ReadFile { .. }
            | Error::WriteFile { .. }
            | Error::Command { .. }
            | Error::CommandStatus { .. } => ClientError::io(e),
            Error::Template { .. } | Error::Yaml { .. } => ClientError::serialization(e),
            Error::KubeconfigBuild { .. } | Error::KubeClient { .. } => {
                ClientError::InitializationFailed(Some(e.into()))
            }
            _ => ClientError::request_failed(e),
        }
    }
}

#[test]
fn not_found_errors_stay_not_found() {
    let e: ClientError = Error::StackNotFound {
        stack: "EKS-dev-VPC".to_string(),
    }
    .into();
    assert!(e.is_not_found());
    assert_eq!(e.to_string(), "Not found: Stack 'EKS-dev-VPC' does not exist");
}
