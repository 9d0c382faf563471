use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use eco_core::{
    AttemptError, Completion, QuizSession, RecordStore, SessionAdvance, StoreError, outcome_error,
};
use eco_types::{
    AttemptId, AttemptPhase, AttemptResponse, AttemptView, BestScoreRecord, QuizError, QuizId,
    UserId,
};

fn attempt_error(attempt_id: AttemptId, err: AttemptError) -> QuizError {
    match err {
        AttemptError::NotInProgress { .. } => QuizError::AttemptNotInProgress { attempt_id },
        AttemptError::InvalidOption { option_index, .. } => {
            QuizError::InvalidAnswer { option_index }
        }
    }
}

/// Registry of running attempts, at most one per user
pub struct AttemptManager {
    store: Arc<dyn RecordStore>,
    attempts: DashMap<AttemptId, Arc<QuizSession>>,
    user_attempts: DashMap<UserId, AttemptId>,
}

impl AttemptManager {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            attempts: DashMap::new(),
            user_attempts: DashMap::new(),
        }
    }

    /// Look up an attempt owned by `user_id`. Other users' attempts read as missing.
    fn session(&self, user_id: UserId, attempt_id: AttemptId) -> Result<Arc<QuizSession>, QuizError> {
        let session = self
            .attempts
            .get(&attempt_id)
            .map(|entry| entry.value().clone())
            .ok_or(QuizError::AttemptNotFound { attempt_id })?;

        if session.user_id() != user_id {
            warn!("User {} tried to reach attempt {} of another user", user_id, attempt_id);
            return Err(QuizError::AttemptNotFound { attempt_id });
        }

        Ok(session)
    }

    fn remove(&self, attempt_id: AttemptId) -> Option<Arc<QuizSession>> {
        let (_, session) = self.attempts.remove(&attempt_id)?;
        self.user_attempts
            .remove_if(&session.user_id(), |_, current| *current == attempt_id);
        Some(session)
    }

    fn completion_response(
        &self,
        session: &QuizSession,
        completion: Completion,
    ) -> Result<AttemptResponse, QuizError> {
        match completion {
            Completion::Settled(result) => Ok(AttemptResponse {
                error: outcome_error(session.quiz(), &result),
                attempt: session.view(),
            }),
            Completion::DoubleSubmissionRejected => Ok(AttemptResponse {
                attempt: session.view(),
                error: None,
            }),
            Completion::Interrupted => Err(QuizError::StoreUnavailable {
                message: format!("Submission of attempt {} was interrupted", session.id()),
            }),
        }
    }

    /// Load the quiz and start its countdown. Any attempt the user still had open is discarded.
    pub async fn start_attempt(
        &self,
        user_id: UserId,
        quiz_id: QuizId,
    ) -> Result<AttemptView, QuizError> {
        let quiz = match self.store.fetch_quiz_definition(quiz_id).await {
            Ok(quiz) => Arc::new(quiz),
            Err(StoreError::NotFound) => {
                debug!("Quiz {} not found or empty", quiz_id);
                return Err(QuizError::DefinitionUnavailable { quiz_id });
            }
            Err(err) => {
                error!("Failed to load quiz {}: {}", quiz_id, err);
                return Err(QuizError::DefinitionUnavailable { quiz_id });
            }
        };

        let session = Arc::new(QuizSession::start(self.store.clone(), user_id, quiz));
        let attempt_id = session.id();
        let view = session.view();

        self.attempts.insert(attempt_id, session);
        if let Some(previous) = self.user_attempts.insert(user_id, attempt_id) {
            if let Some((_, old)) = self.attempts.remove(&previous) {
                info!("Replacing attempt {} of user {}", previous, user_id);
                old.exit();
            }
        }

        Ok(view)
    }

    pub fn view(&self, user_id: UserId, attempt_id: AttemptId) -> Result<AttemptView, QuizError> {
        Ok(self.session(user_id, attempt_id)?.view())
    }

    pub fn select_answer(
        &self,
        user_id: UserId,
        attempt_id: AttemptId,
        option_index: usize,
    ) -> Result<AttemptView, QuizError> {
        let session = self.session(user_id, attempt_id)?;
        session
            .select_answer(option_index)
            .map_err(|err| attempt_error(attempt_id, err))?;
        Ok(session.view())
    }

    pub fn go_back(&self, user_id: UserId, attempt_id: AttemptId) -> Result<AttemptView, QuizError> {
        let session = self.session(user_id, attempt_id)?;
        session
            .go_back()
            .map_err(|err| attempt_error(attempt_id, err))?;
        Ok(session.view())
    }

    /// Next question, or submission when on the last one
    pub async fn advance(
        &self,
        user_id: UserId,
        attempt_id: AttemptId,
    ) -> Result<AttemptResponse, QuizError> {
        let session = self.session(user_id, attempt_id)?;
        match session
            .advance()
            .await
            .map_err(|err| attempt_error(attempt_id, err))?
        {
            SessionAdvance::Moved(_) => Ok(AttemptResponse {
                attempt: session.view(),
                error: None,
            }),
            SessionAdvance::Finished(completion) => self.completion_response(&session, completion),
        }
    }

    pub async fn finish(
        &self,
        user_id: UserId,
        attempt_id: AttemptId,
    ) -> Result<AttemptResponse, QuizError> {
        let session = self.session(user_id, attempt_id)?;
        let completion = session.finish().await;
        self.completion_response(&session, completion)
    }

    /// Leave the attempt. Unsubmitted answers are discarded and nothing is written.
    pub fn exit(&self, user_id: UserId, attempt_id: AttemptId) -> Result<(), QuizError> {
        let session = self.session(user_id, attempt_id)?;
        session.exit();
        self.remove(attempt_id);
        Ok(())
    }

    pub async fn best_score(
        &self,
        user_id: UserId,
        quiz_id: QuizId,
    ) -> Result<Option<BestScoreRecord>, QuizError> {
        self.store
            .fetch_best_score(user_id, quiz_id)
            .await
            .map_err(|err| {
                error!("Failed to load best score of user {} on quiz {}: {}", user_id, quiz_id, err);
                QuizError::StoreUnavailable {
                    message: err.to_string(),
                }
            })
    }

    pub fn active_attempt(&self, user_id: UserId) -> Option<AttemptId> {
        self.user_attempts.get(&user_id).map(|entry| *entry.value())
    }

    pub fn active_attempts_count(&self) -> usize {
        self.attempts.len()
    }

    /// Drop settled attempts once their result has been on screen for
    /// `display_delay`, and abandon running ones idle for `idle_timeout`.
    pub fn cleanup_stale(&self, display_delay: Duration, idle_timeout: Duration) {
        let stale: Vec<AttemptId> = self
            .attempts
            .iter()
            .filter(|entry| {
                let session = entry.value();
                match session.phase() {
                    AttemptPhase::Settled => session
                        .settled_at()
                        .is_none_or(|at| at.elapsed() >= display_delay),
                    AttemptPhase::Submitting => false,
                    AttemptPhase::NotStarted | AttemptPhase::InProgress => {
                        session.last_activity().elapsed() >= idle_timeout
                    }
                }
            })
            .map(|entry| *entry.key())
            .collect();

        for attempt_id in stale {
            if let Some(session) = self.remove(attempt_id) {
                session.exit();
                info!("Removed stale attempt {}", attempt_id);
            }
        }
    }
}
