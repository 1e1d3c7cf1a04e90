use aws_config::BehaviorVersion;
use aws_config::meta::region::RegionProviderChain;
use aws_types::SdkConfig;
use aws_types::region::Region;

/// Loads credentials for `profile` through the default AWS chain. An explicit
/// region wins over the profile's, falling back to us-east-1.
pub async fn get_config(profile: &str, region: Option<String>) -> SdkConfig {
    let region_provider = RegionProviderChain::first_try(region.map(Region::new))
        .or_default_provider()
        .or_else(Region::new("us-east-1"));

    aws_config::defaults(BehaviorVersion::latest())
        .region(region_provider)
        .profile_name(profile)
        .load()
        .await
}
