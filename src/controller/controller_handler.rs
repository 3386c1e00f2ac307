use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use tokio::task::JoinHandle;

use crate::chat_stream::AnswerOrchestrator;
use crate::configuration::config::Config;
use crate::error_handling::types::*;
use crate::recommendation::Recommender;
use crate::retrieval::{Classifier, KnowledgeCatalog, RetrievalAggregator};
use crate::session_management::session_manager::SessionManager;
use crate::storage::{DatabaseStorage, Storage};
use crate::summarizer::{spawn_workers, Summarizer};
use crate::upstream::{DashScopeAgent, OpenAiCompatClient, ZhipuWebSearch};
use crate::web_interface::{AppState, WebServer};

/// How long pending summaries may take to finish after the server stops.
const SUMMARY_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds every component from the configuration and runs the HTTP server.
///
/// All capability clients are constructed once here and injected; nothing
/// downstream reads configuration or global state.
pub struct Controller {
    pub config: Config,
}

impl Controller {
    pub fn new(config: Config) -> Result<Self, ControllerError> {
        info!("Creating controller");
        config.validate()?;
        Ok(Self { config })
    }

    /// Wires storage, upstream clients, retrieval, streaming, summary workers
    /// and recommendations into the handler state.
    pub async fn build_state(&self) -> Result<(AppState, Vec<JoinHandle<()>>), ControllerError> {
        let config = &self.config;

        let storage: Arc<dyn Storage> =
            Arc::new(DatabaseStorage::connect(&config.storage.database_url).await?);
        let catalog = Arc::new(KnowledgeCatalog::from_file(&config.knowledge.catalog_path)?);
        if catalog.is_empty() {
            warn!("Knowledge catalog is empty, knowledge search will never match");
        }

        let completion = Arc::new(OpenAiCompatClient::new(
            config.completion.base_url.as_str(),
            config.completion.api_key.as_str(),
            config.completion.model.as_str(),
            Duration::from_secs(config.completion.timeout_secs),
        )?);
        let agent = Arc::new(DashScopeAgent::new(
            config.agent.base_url.as_str(),
            config.agent.api_key.as_str(),
            config.agent.app_id.as_str(),
            Duration::from_secs(config.agent.timeout_secs),
        )?);
        let web_search = Arc::new(ZhipuWebSearch::new(
            config.web_search.endpoint.as_str(),
            config.web_search.api_key.as_str(),
            Duration::from_secs(config.web_search.timeout_secs),
        )?);

        let summarizer = Arc::new(Summarizer::new(
            completion.clone(),
            storage.clone(),
            config.summarizer.model.clone(),
        ));
        let (summaries, workers) = spawn_workers(
            summarizer,
            config.summarizer.workers,
            config.summarizer.queue_capacity,
        );

        let retrieval = Arc::new(RetrievalAggregator::new(
            storage.clone(),
            Arc::new(Classifier::new(completion.clone())),
            catalog,
            web_search,
        ));
        let state = AppState {
            sessions: Arc::new(SessionManager::new(storage.clone())),
            retrieval: retrieval.clone(),
            answers: Arc::new(AnswerOrchestrator::new(
                storage.clone(),
                retrieval,
                agent,
                summaries,
            )),
            recommender: Arc::new(Recommender::new(
                storage,
                completion,
                Some(config.completion.recommendation_model.clone()),
                config.recommendation.max_items,
            )),
        };
        Ok((state, workers))
    }

    /// Serves until Ctrl-C, then lets queued summaries finish.
    pub async fn run(&mut self) -> Result<(), ControllerError> {
        info!("Starting controller");
        let addr = self.config.socket_addr()?;
        let (state, workers) = self.build_state().await?;

        let server = WebServer::new(state);
        server.start(addr, shutdown_signal()).await?;
        // Dropping the server drops the last queue handle so workers can exit
        drop(server);

        info!("Waiting for {} summary workers", workers.len());
        let drain = futures::future::join_all(workers);
        match tokio::time::timeout(SUMMARY_DRAIN_TIMEOUT, drain).await {
            Ok(results) => {
                for result in results.into_iter().filter_map(Result::err) {
                    error!("Summary worker ended abnormally: {}", result);
                }
            }
            Err(_) => warn!("Pending summaries abandoned after {:?}", SUMMARY_DRAIN_TIMEOUT),
        }
        info!("Controller shut down");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Unable to listen for shutdown signal: {}", e);
        // Keep serving rather than exiting immediately
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
