//! Shared application state.

use std::sync::Arc;

use tracing::{info, warn};

use ideaflow_model_sdk::{ModelClient, ModelInvoker};

use crate::auth::TokenVerifier;
use crate::broadcast::{ChannelRegistry, ProgressBroadcaster, TeamChatRegistry};
use crate::cache::TtlCache;
use crate::config::Config;
use crate::matching::{DirectorySource, MatchingEngine, ProfileSource, RepositorySource, SynthesizedSource};
use crate::memory::ConversationStore;
use crate::orchestrator::Orchestrator;
use crate::stages::MarketCache;

/// Shared application state, assembled once at startup.
pub struct AppState {
    pub config: Config,
    pub orchestrator: Arc<Orchestrator>,
    pub engine: Arc<MatchingEngine>,
    pub store: Arc<ConversationStore>,
    pub registry: Arc<ChannelRegistry>,
    pub chat: Arc<TeamChatRegistry>,
    pub verifier: TokenVerifier,
}

impl AppState {
    /// Wire every component from configuration.
    pub fn new(config: Config) -> Arc<Self> {
        let invoker: Option<Arc<dyn ModelInvoker>> = if config.model_api_key.is_empty() {
            warn!("No model API key configured; every stage will use its heuristic path");
            None
        } else {
            match ModelClient::new(
                &config.model_base_url,
                &config.model_api_key,
                &config.model_name,
                config.model_timeout,
            ) {
                Ok(client) => {
                    info!(model = %config.model_name, "Model backend configured");
                    Some(Arc::new(client))
                }
                Err(e) => {
                    warn!(error = %e, "Model client init failed; running heuristics only");
                    None
                }
            }
        };

        let sources: Vec<Arc<dyn ProfileSource>> = vec![
            Arc::new(DirectorySource::seeded()),
            Arc::new(RepositorySource::new(
                &config.repo_search_url,
                &config.repo_search_token,
            )),
            Arc::new(SynthesizedSource::new(invoker.clone())),
        ];
        let engine = Arc::new(MatchingEngine::new(
            sources,
            invoker.clone(),
            config.source_timeout,
        ));

        let store = ConversationStore::new(config.memory_cap);
        let registry = ChannelRegistry::new();
        let broadcaster = Arc::new(ProgressBroadcaster::new(Arc::clone(&registry)));
        let market_cache: Arc<MarketCache> = TtlCache::new(config.market_cache_ttl);

        let orchestrator = Orchestrator::new(
            invoker,
            Arc::clone(&store),
            broadcaster,
            Arc::clone(&engine),
            market_cache,
            config.stage_max_attempts,
            config.stage_backoff,
            config.team_stage_top_k,
        );

        let verifier = TokenVerifier::new(&config.team_tokens);
        if verifier.is_empty() {
            warn!("No team tokens provisioned; team channel connections will be rejected");
        }

        Arc::new(Self {
            config,
            orchestrator,
            engine,
            store,
            registry,
            chat: TeamChatRegistry::new(),
            verifier,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_state_wires_without_backend() {
        let state = AppState::new(Config::default());
        assert!(state.verifier.is_empty());
        assert_eq!(state.store.conversation_count().await, 0);
    }
}
