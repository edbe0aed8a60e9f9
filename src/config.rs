use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    // Deployment
    pub environment: String,
    pub port: u16,

    // DeepL
    pub deepl_api_key: String,
    pub deepl_api_url: String,

    // Storage
    pub database_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            environment: std::env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),

            // DeepL - free and pro plans use different hosts
            deepl_api_key: std::env::var("DEEPL_API_KEY").context("DEEPL_API_KEY not set")?,
            deepl_api_url: std::env::var("DEEPL_API_URL")
                .unwrap_or_else(|_| "https://api-free.deepl.com".to_string()),

            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://phrasebooks.db".to_string()),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
