use crate::cli::UpstreamArgs;
use crate::entities::health::{self, HealthReport};
use crate::error::BiolinkMcpError;
use crate::sources::biolink::BiolinkClient;

/// Checks the configured upstream once, without retries.
pub(crate) async fn run(upstream: &UpstreamArgs) -> Result<HealthReport, BiolinkMcpError> {
    let mut config = upstream.client_config()?;
    config.max_retries = 0;
    let client = BiolinkClient::new(&config)?;
    Ok(health::check(&client).await)
}
