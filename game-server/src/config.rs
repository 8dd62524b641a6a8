use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub tick_interval_ms: u64,
    pub countdown_seconds: u32,
    pub matchmaker_interval_ms: u64,
    pub queue_timeout_seconds: u64,
    pub rejoin_grace_seconds: u64,
    pub rank_update_interval_seconds: u64,
    pub connection_timeout_seconds: u64,
}

impl Config {
    pub fn new() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .expect("Invalid PORT"),
            tick_interval_ms: env::var("TICK_INTERVAL_MS")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .expect("Invalid TICK_INTERVAL_MS"),
            countdown_seconds: env::var("COUNTDOWN_SECONDS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .expect("Invalid COUNTDOWN_SECONDS"),
            matchmaker_interval_ms: env::var("MATCHMAKER_INTERVAL_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .expect("Invalid MATCHMAKER_INTERVAL_MS"),
            queue_timeout_seconds: env::var("QUEUE_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .expect("Invalid QUEUE_TIMEOUT_SECONDS"),
            rejoin_grace_seconds: env::var("REJOIN_GRACE_SECONDS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .expect("Invalid REJOIN_GRACE_SECONDS"),
            rank_update_interval_seconds: env::var("RANK_UPDATE_INTERVAL_SECONDS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .expect("Invalid RANK_UPDATE_INTERVAL_SECONDS"),
            connection_timeout_seconds: env::var("CONNECTION_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .expect("Invalid CONNECTION_TIMEOUT_SECONDS"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
