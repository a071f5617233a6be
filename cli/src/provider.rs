use clap::Parser;
use eksflow_model::ProviderConfig;
use std::time::Duration;

/// Where and as whom to talk to AWS.
#[derive(Debug, Parser)]
pub(crate) struct ProviderArgs {
    /// The AWS region. Defaults to us-west-2.
    #[clap(long, short = 'r')]
    pub(crate) region: Option<String>,

    /// The AWS credentials profile to use.
    #[clap(long, short = 'p', env = "AWS_PROFILE")]
    pub(crate) profile: Option<String>,
}

impl ProviderArgs {
    pub(crate) fn config(&self, timeout: Option<Duration>) -> ProviderConfig {
        let config = ProviderConfig::new(self.region.clone(), self.profile.clone());
        match timeout {
            Some(timeout) => config.with_timeout(timeout),
            None => config,
        }
    }

    pub(crate) fn region_given(&self) -> bool {
        self.region
            .as_deref()
            .map(|region| !region.is_empty())
            .unwrap_or(false)
    }
}
