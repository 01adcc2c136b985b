use clap::Parser;

/// Admin core sidecar for the Gurukul management UI. Speaks newline-delimited
/// JSON on stdin/stdout and proxies all data access to the REST backend.
#[derive(Debug, Clone, Parser)]
#[command(name = "gurukuld", version)]
pub struct Config {
    /// Base URL of the Gurukul REST backend.
    #[arg(long, env = "GURUKULD_API_URL", default_value = "http://localhost:5002")]
    pub api_url: String,

    /// Timeout for a single backend call, in seconds.
    #[arg(long, env = "GURUKULD_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,

    /// Time-to-live for cached list responses, in seconds.
    #[arg(long, env = "GURUKULD_CACHE_TTL_SECS", default_value_t = 60)]
    pub cache_ttl_secs: u64,
}
