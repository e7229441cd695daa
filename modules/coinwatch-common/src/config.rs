use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // Scraping target
    pub skynet_url: String,

    // Browser
    pub chrome_headless: bool,

    // Run lock marker, relative to the working directory
    pub lock_path: String,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            skynet_url: env::var("SKYNET_URL")
                .unwrap_or_else(|_| "https://skynet.certik.com/".to_string()),
            chrome_headless: env::var("CHROME_HEADLESS")
                .map(|v| v != "0" && v.to_lowercase() != "false")
                .unwrap_or(true),
            lock_path: env::var("SCRAPE_LOCK_PATH").unwrap_or_else(|_| "scraping.lock".to_string()),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
