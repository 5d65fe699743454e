use std::time::Duration;

use clap::Args;

/// Where and how to reach the geostore service.
#[derive(Args, Debug, Clone)]
pub struct GeostoreConfig {
    /// Base URL of the API gateway exposing `/v1/geostore/{id}`
    #[arg(long, env = "GATEWAY_URL")]
    pub gateway_url: Option<String>,

    /// Key sent as `x-api-key` on geostore requests
    #[arg(long, env = "GEOSTORE_API_KEY")]
    pub api_key: Option<String>,

    /// Geostore request timeout in seconds
    #[arg(long, env = "GEOSTORE_TIMEOUT_SECS", default_value = "30")]
    pub timeout_secs: u64,
}

impl GeostoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for GeostoreConfig {
    fn default() -> Self {
        Self {
            gateway_url: None,
            api_key: None,
            timeout_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use pretty_assertions::assert_eq;

    use super::GeostoreConfig;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        geostore: GeostoreConfig,
    }

    #[test]
    fn test_parse_flags() {
        let cli = TestCli::parse_from([
            "fsconvert",
            "--gateway-url",
            "https://api.example.org",
            "--timeout-secs",
            "5",
        ]);
        assert_eq!(
            cli.geostore.gateway_url.as_deref(),
            Some("https://api.example.org")
        );
        assert_eq!(cli.geostore.timeout().as_secs(), 5);
    }
}
