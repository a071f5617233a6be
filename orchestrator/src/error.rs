use crate::clients::ClientError;
use eksflow_model::ResourceCategory;
use snafu::Snafu;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// The result type returned by the workflows.
pub type Result<T> = std::result::Result<T, Error>;

/// The errors a workflow can end with.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("{} and {} cannot be used at the same time", first, second))]
    ConfigConflict { first: String, second: String },

    #[snafu(display("{}", what))]
    MissingField { what: String },

    #[snafu(display("Invalid node group '{}': {}", name, reason))]
    InvalidNodeGroup { name: String, reason: String },

    #[snafu(display("--region={} is not supported", region))]
    UnsupportedRegion { region: String },

    #[snafu(display("Unable to check credentials: {}", source))]
    Auth { source: ClientError },

    #[snafu(display(
        "At least {} availability zones are required, but only {} {} available",
        required,
        found,
        if *found == 1 { "is" } else { "are" }
    ))]
    InsufficientZones { required: usize, found: usize },

    #[snafu(display("Insufficient subnets: {}", details))]
    InsufficientSubnets { details: String },

    #[snafu(display("Invalid network: {}", details))]
    InvalidNetwork { details: String },

    #[snafu(display("Unable to derive subnet ranges: {}", source))]
    SubnetRanges { source: eksflow_model::Error },

    #[snafu(display("Unable to {}: {}", action, source))]
    Client {
        action: String,
        resources: Resources,
        source: ClientError,
    },

    #[snafu(display(
        "Failed to create cluster '{}': {} error(s) occurred: {}",
        cluster,
        errors.len(),
        join(errors)
    ))]
    Provisioning {
        cluster: String,
        errors: Vec<ClientError>,
    },

    #[snafu(display("Timed out (after {:?}) waiting for {}", duration, what))]
    Timeout { what: String, duration: Duration },

    #[snafu(display(
        "Failed to delete node groups of cluster '{}': {}",
        cluster,
        join(errors)
    ))]
    NodeGroupDeletion {
        cluster: String,
        errors: Vec<ClientError>,
    },

    #[snafu(display("Unable to delete {}: {}", category, details))]
    LegacyResource {
        category: ResourceCategory,
        details: String,
    },

    #[snafu(display("Step '{}' ran before '{}' produced its result", step, needs))]
    StepOrder {
        step: &'static str,
        needs: &'static str,
    },
}

fn join<E: Display>(errors: &[E]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Whether the failure may have left infrastructure behind.
    pub fn resources(&self) -> Resources {
        match self {
            Error::Client { resources, .. } => *resources,
            Error::Provisioning { .. } | Error::Timeout { .. } | Error::NodeGroupDeletion { .. } => {
                Resources::Remaining
            }
            Error::LegacyResource { .. } | Error::StepOrder { .. } => Resources::Unknown,
            _ => Resources::Clear,
        }
    }
}

/// Every workflow error states whether it has left resources behind.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Resources {
    /// An error occurred and left resources behind that cannot be destroyed by the deletion
    /// workflow.
    Orphaned,

    /// An error occurred and resources remain. Running the deletion workflow removes them.
    Remaining,

    /// Something bad happened, but no resources were left behind.
    Clear,

    /// It is unknown whether or not there are resources remaining.
    Unknown,
}

impl Resources {
    pub fn message(&self) -> &'static str {
        match self {
            Resources::Orphaned => "An error left orphaned resources that cannot be destroyed",
            Resources::Remaining => "An error left resources behind that can be destroyed",
            Resources::Clear => "An error occurred but no resources were left behind",
            Resources::Unknown => {
                "An error occurred and it is unknown whether or not resources were left behind"
            }
        }
    }

    /// Whether running the deletion workflow is worthwhile.
    pub fn needs_cleanup(&self) -> bool {
        matches!(self, Resources::Remaining | Resources::Unknown)
    }
}

impl Display for Resources {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self.message(), f)
    }
}
