use std::pin::Pin;
use std::sync::Arc;

use async_stream::stream;
use futures::{Stream, StreamExt};
use log::{debug, error, info, warn};

use crate::chat_stream::prompt::AnswerPrompt;
use crate::error_handling::types::TutorError;
use crate::retrieval::RetrievalAggregator;
use crate::session_management::QuestionStatus;
use crate::storage::types::RetrieveData;
use crate::storage::Storage;
use crate::summarizer::{SummaryJob, SummaryQueue};
use crate::upstream::ConversationAgent;

/// Text chunks of an answer as they arrive from the agent.
pub type ChatStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Drives one streamed agent answer per call and commits it once drained.
pub struct AnswerOrchestrator {
    storage: Arc<dyn Storage>,
    retrieval: Arc<RetrievalAggregator>,
    agent: Arc<dyn ConversationAgent>,
    summaries: SummaryQueue,
}

/// Work left once the agent stream is exhausted; runs detached from the response.
struct Commit {
    storage: Arc<dyn Storage>,
    summaries: SummaryQueue,
    question_id: i32,
    session_id: String,
    /// false when the question already has an answer
    persist_answer: bool,
}

impl Commit {
    async fn run(self, answer: String, agent_session: Option<String>) {
        let question_id = self.question_id;

        if let Some(agent_session) = agent_session {
            match self
                .storage
                .create_api_session(&self.session_id, &agent_session)
                .await
            {
                Ok(bound) => debug!("[q:{}] agent session {} in effect", question_id, bound),
                Err(e) => error!("[q:{}] failed to bind agent session: {}", question_id, e),
            }
        }

        if !self.persist_answer {
            debug!("[q:{}] already answered, nothing to commit", question_id);
            return;
        }
        if answer.is_empty() {
            warn!("[q:{}] agent produced no text, answer not stored", question_id);
            return;
        }
        if let Err(e) = self.storage.set_answer(question_id, &answer).await {
            error!("[q:{}] failed to store answer: {}", question_id, e);
            return;
        }
        info!(
            "[q:{}] answer stored ({} chars)",
            question_id,
            answer.chars().count()
        );
        self.summaries.enqueue(SummaryJob {
            question_id,
            answer,
        });
    }
}

impl AnswerOrchestrator {
    pub fn new(
        storage: Arc<dyn Storage>,
        retrieval: Arc<RetrievalAggregator>,
        agent: Arc<dyn ConversationAgent>,
        summaries: SummaryQueue,
    ) -> Self {
        Self {
            storage,
            retrieval,
            agent,
            summaries,
        }
    }

    /// Opens the agent call for `question_id` and returns its text chunks.
    ///
    /// Fails before producing anything when the question is unknown or the
    /// agent cannot be reached. Once streaming, the first unhealthy chunk or
    /// transport error ends the sequence early. Once the agent is done, the
    /// answer, the agent session binding and the summary job are committed on
    /// a spawned task so the sequence ends without waiting for storage.
    /// Dropping the stream before that point commits nothing.
    pub async fn stream_answer(&self, question_id: i32) -> Result<ChatStream, TutorError> {
        let question = self.storage.get_question(question_id).await?;
        let content = question
            .parsed_content()
            .map_err(|e| TutorError::ParseFailure(format!("stored question content: {e}")))?;

        let retrieve = match self.retrieval.get_retrieve_data(question_id).await {
            Ok(data) => data,
            Err(e) => {
                warn!("[q:{}] retrieval data unavailable: {}", question_id, e);
                RetrieveData::default()
            }
        };
        let prompt = AnswerPrompt::compose(&content, &retrieve).render();

        let bound = self.storage.get_api_session(&question.session_id).await?;
        match &bound {
            Some(id) => info!("[q:{}] continuing agent session {}", question_id, id),
            None => info!("[q:{}] starting a new agent session", question_id),
        }

        let mut upstream = self
            .agent
            .start_or_continue(bound.as_deref(), &prompt)
            .await?;

        let commit = Commit {
            storage: self.storage.clone(),
            summaries: self.summaries.clone(),
            question_id,
            session_id: question.session_id.clone(),
            persist_answer: QuestionStatus::of(&question).accepts_answer(),
        };

        Ok(Box::pin(stream! {
            let mut answer = String::new();
            let mut agent_session = bound;

            while let Some(item) = upstream.next().await {
                match item {
                    Ok(chunk) if chunk.is_healthy() => {
                        if chunk.session_id.is_some() {
                            agent_session = chunk.session_id;
                        }
                        answer.push_str(&chunk.text);
                        yield chunk.text;
                    }
                    Ok(chunk) => {
                        warn!("[q:{}] agent reported status {}, stopping", question_id, chunk.status);
                        break;
                    }
                    Err(e) => {
                        warn!("[q:{}] agent stream failed: {}", question_id, e);
                        break;
                    }
                }
            }

            tokio::spawn(commit.run(answer, agent_session));
        }))
    }
}
