use aws_config::profile::ProfileFileCredentialsProvider;
use aws_config::retry::RetryConfig;
use aws_smithy_types::retry::RetryMode;
use aws_types::region::Region;
use aws_types::SdkConfig;
use eksflow_model::ProviderConfig;
use log::debug;

const MAX_ATTEMPTS: u32 = 15;

/// Loads the shared SDK configuration for the configured region. Credentials come from the named
/// profile when one is given, otherwise from the default provider chain.
pub async fn sdk_config(provider: &ProviderConfig) -> SdkConfig {
    sdk_config_for_region(provider, &provider.region).await
}

/// Like [`sdk_config`], but for a region other than the configured one.
pub async fn sdk_config_for_region(provider: &ProviderConfig, region: &str) -> SdkConfig {
    let mut loader = aws_config::from_env().retry_config(
        RetryConfig::standard()
            .with_retry_mode(RetryMode::Adaptive)
            .with_max_attempts(MAX_ATTEMPTS),
    );
    if let Some(profile) = &provider.profile {
        debug!("Using AWS profile '{}'", profile);
        loader = loader.credentials_provider(
            ProfileFileCredentialsProvider::builder()
                .profile_name(profile)
                .build(),
        );
    }
    loader.region(Region::new(region.to_string())).load().await
}
