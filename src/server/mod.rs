pub mod relay;

pub use relay::{Relay, RelayConfig, DEFAULT_ALLOWED_ORIGINS, DEFAULT_PORT};

use anyhow::Result;

/// Bind the relay on its configured port and serve until shutdown.
pub async fn start(config: RelayConfig) -> Result<()> {
    Relay::new(config).serve().await
}
