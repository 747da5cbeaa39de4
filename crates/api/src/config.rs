//! Server configuration

/// Runtime configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    /// Bearer token protecting the internal ops endpoints.
    pub internal_api_token: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;
        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let internal_api_token = std::env::var("INTERNAL_API_TOKEN")
            .map_err(|_| anyhow::anyhow!("INTERNAL_API_TOKEN must be set"))?;

        Ok(Self {
            database_url,
            bind_address,
            internal_api_token,
        })
    }
}
