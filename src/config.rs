use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// Seconds between overdue-reconciliation sweeps.
    pub sweep_interval_secs: u64,
    /// When true, cancelling an ongoing rental zeroes its quoted fee.
    pub cancel_fee_waived: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let sweep_interval_secs = env::var("SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(60);
        let cancel_fee_waived = env::var("CANCEL_FEE_WAIVED")
            .ok()
            .and_then(|s| s.parse::<bool>().ok())
            .unwrap_or(true);
        Ok(Self {
            database_url,
            host,
            port,
            sweep_interval_secs,
            cancel_fee_waived,
        })
    }
}
