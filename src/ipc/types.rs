use crate::api::ApiClient;
use crate::cache::ListCache;
use crate::config::Config;
use crate::selection::SelectorChain;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub cfg: Config,
    pub api: ApiClient,
    pub cache: ListCache,
    /// Dependent-selector state, one chain per page scope (e.g.
    /// "milestones.create", "students.assign"). Dropped on `page.open`.
    pub chains: HashMap<String, SelectorChain>,
}

impl AppState {
    pub fn new(cfg: Config) -> anyhow::Result<Self> {
        let api = ApiClient::new(&cfg)?;
        let cache = ListCache::new(Duration::from_secs(cfg.cache_ttl_secs));
        Ok(Self {
            cfg,
            api,
            cache,
            chains: HashMap::new(),
        })
    }
}
