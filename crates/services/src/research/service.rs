use std::sync::Arc;

use inference_providers::InferenceProvider;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::consumer::StreamConsumer;
use super::errors::ResearchError;
use super::models::{ChatSection, Message};
use super::prompt::{build_messages, compose_prompt};
use crate::search::{SearchParams, SearchProviderTrait};

/// Image options forwarded to every search
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchOptions {
    pub include_images: bool,
    pub include_image_descriptions: bool,
}

/// Handle to the submission currently in flight
struct ActiveSlot {
    section_id: Uuid,
    cancel: CancellationToken,
    updates: watch::Receiver<ChatSection>,
}

/// A submitted research turn
pub struct ActiveResearch {
    section_id: Uuid,
    updates: watch::Receiver<ChatSection>,
    cancel: CancellationToken,
    handle: JoinHandle<Result<ChatSection, ResearchError>>,
}

impl ActiveResearch {
    pub fn section_id(&self) -> Uuid {
        self.section_id
    }

    /// Receiver of section snapshots, one per applied frame
    pub fn updates(&self) -> watch::Receiver<ChatSection> {
        self.updates.clone()
    }

    pub fn snapshot(&self) -> ChatSection {
        self.updates.borrow().clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the turn to reach a terminal phase
    pub async fn wait(self) -> Result<ChatSection, ResearchError> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(ResearchError::Cancelled),
            Err(e) => Err(ResearchError::TaskFailed(e.to_string())),
        }
    }
}

/// Runs research turns one at a time: search, prompt, streamed report.
///
/// Submitting a new query cancels the one in flight. Each turn is driven by a
/// single task that owns the section; everyone else sees snapshots.
pub struct ResearchSession {
    search_provider: Arc<dyn SearchProviderTrait>,
    inference_provider: Arc<dyn InferenceProvider>,
    search_options: SearchOptions,
    history: RwLock<Vec<watch::Receiver<ChatSection>>>,
    transcript: Arc<RwLock<Vec<Message>>>,
    active: Mutex<Option<ActiveSlot>>,
}

impl ResearchSession {
    pub fn new(
        search_provider: Arc<dyn SearchProviderTrait>,
        inference_provider: Arc<dyn InferenceProvider>,
    ) -> Self {
        Self {
            search_provider,
            inference_provider,
            search_options: SearchOptions::default(),
            history: RwLock::new(Vec::new()),
            transcript: Arc::new(RwLock::new(Vec::new())),
            active: Mutex::new(None),
        }
    }

    pub fn with_search_options(mut self, options: SearchOptions) -> Self {
        self.search_options = options;
        self
    }

    /// Start a research turn for `query`, cancelling any turn in flight.
    pub async fn submit(&self, query: impl Into<String>) -> Result<ActiveResearch, ResearchError> {
        let query = query.into();
        if query.trim().is_empty() {
            return Err(ResearchError::EmptyQuery);
        }

        let section = ChatSection::new(query);
        let section_id = section.id;
        let cancel = CancellationToken::new();
        let (sender, updates) = watch::channel(section.clone());

        {
            // History order follows the order submissions take the slot
            let mut active = self.active.lock().await;
            if let Some(previous) = active.take() {
                tracing::info!(section_id = %previous.section_id, "Cancelling previous research");
                previous.cancel.cancel();
            }
            *active = Some(ActiveSlot {
                section_id,
                cancel: cancel.clone(),
                updates: updates.clone(),
            });
            self.history.write().await.push(updates.clone());
        }

        let task = ResearchTask {
            search_provider: self.search_provider.clone(),
            inference_provider: self.inference_provider.clone(),
            search_options: self.search_options,
            transcript: self.transcript.clone(),
            sender,
            cancel: cancel.clone(),
        };
        tracing::info!(%section_id, "Research submitted");
        let handle = tokio::spawn(task.run(section));

        Ok(ActiveResearch {
            section_id,
            updates,
            cancel,
            handle,
        })
    }

    /// Cancel the turn in flight, if any. Returns whether one was running.
    pub async fn cancel_active(&self) -> bool {
        let Some(active) = self.active.lock().await.take() else {
            return false;
        };
        let running = !active.updates.borrow().phase.is_terminal();
        active.cancel.cancel();
        if running {
            tracing::info!(section_id = %active.section_id, "Research cancelled");
        }
        running
    }

    /// Snapshots of every section, oldest first
    pub async fn sections(&self) -> Vec<ChatSection> {
        self.history
            .read()
            .await
            .iter()
            .map(|updates| updates.borrow().clone())
            .collect()
    }

    /// User and assistant messages of completed turns
    pub async fn messages(&self) -> Vec<Message> {
        self.transcript.read().await.clone()
    }
}

/// Owns one section for the lifetime of a turn
struct ResearchTask {
    search_provider: Arc<dyn SearchProviderTrait>,
    inference_provider: Arc<dyn InferenceProvider>,
    search_options: SearchOptions,
    transcript: Arc<RwLock<Vec<Message>>>,
    sender: watch::Sender<ChatSection>,
    cancel: CancellationToken,
}

/// A task that unwinds or is dropped mid-turn leaves its section failed
/// rather than stuck in a loading phase.
impl Drop for ResearchTask {
    fn drop(&mut self) {
        self.sender.send_if_modified(|section| {
            if section.phase.is_terminal() {
                return false;
            }
            tracing::error!(section_id = %section.id, phase = ?section.phase, "Research task ended abnormally");
            section.fail(ResearchError::TaskFailed(String::new()).user_message());
            true
        });
    }
}

impl ResearchTask {
    async fn run(self, section: ChatSection) -> Result<ChatSection, ResearchError> {
        let section_id = section.id;
        let mut consumer = StreamConsumer::new(section);
        let outcome = self.drive(&mut consumer).await;
        let mut section = consumer.into_section();

        match outcome {
            Ok(turn) => {
                section.complete();
                self.transcript.write().await.extend(turn);
                self.sender.send_replace(section.clone());
                tracing::info!(
                    %section_id,
                    reasoning_len = section.reasoning.len(),
                    response_len = section.response.len(),
                    "Research completed"
                );
                Ok(section)
            }
            Err(error) if error.is_cancelled() => {
                section.cancel();
                self.sender.send_replace(section);
                tracing::debug!(%section_id, "Research aborted");
                Err(ResearchError::Cancelled)
            }
            Err(error) => {
                tracing::warn!(%section_id, error = %error, "Research failed");
                section.fail(error.user_message());
                self.sender.send_replace(section);
                Err(error)
            }
        }
    }

    /// Search, compose the prompt, stream the report. Returns the user and
    /// assistant messages of the finished turn.
    async fn drive(&self, consumer: &mut StreamConsumer) -> Result<[Message; 2], ResearchError> {
        let query = consumer.section().query.clone();

        let params = SearchParams {
            query: query.clone(),
            include_images: self.search_options.include_images,
            include_image_descriptions: self.search_options.include_image_descriptions,
        };
        let search = self.search_provider.search(params, &self.cancel).await?;
        tracing::debug!(results = search.results.len(), "Search completed");

        consumer.section_mut().sources_loaded(search.results.clone());
        self.sender.send_replace(consumer.section().clone());

        let prompt = compose_prompt(&query, &search);
        let stream = self
            .inference_provider
            .chat_completion_stream(build_messages(&query, &prompt), &self.cancel)
            .await?;

        let sender = &self.sender;
        consumer
            .consume_frames(stream, |section| {
                sender.send_replace(section.clone());
            })
            .await?;

        // The frame stream ends quietly when cancelled
        if self.cancel.is_cancelled() {
            return Err(ResearchError::Cancelled);
        }

        let section = consumer.section();
        let mut answer = Message::assistant(section.response.clone());
        answer.reasoning = Some(section.reasoning.clone()).filter(|r| !r.is_empty());
        answer.search_results = Some(search.results.clone());
        answer.full_search_response = Some(search);
        answer.reasoning_input = Some(prompt);

        Ok([Message::user(query), answer])
    }
}
