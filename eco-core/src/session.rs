use eco_types::{AttemptId, AttemptPhase, AttemptView, QuizDefinition, QuizResult, UserId};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::{AdvanceOutcome, AttemptError, AttemptState, RecordStore, TickOutcome, reconcile};

const EVENT_CAPACITY: usize = 16;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Tick { remaining_seconds: u32 },
    Settled(QuizResult),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionTrigger {
    Manual,
    TimerExpired,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Settled(QuizResult),
    /// Someone else already holds the submission lock
    DoubleSubmissionRejected,
    /// The reconciliation task died before producing a result
    Interrupted,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionAdvance {
    Moved(usize),
    Finished(Completion),
}

struct SessionInner {
    attempt: AttemptState,
    user_id: UserId,
    store: Arc<dyn RecordStore>,
    ticker: Mutex<Option<JoinHandle<()>>>,
    result: Mutex<Option<QuizResult>>,
    settled_at: Mutex<Option<Instant>>,
    last_activity: Mutex<Instant>,
    events: broadcast::Sender<SessionEvent>,
}

fn locked<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SessionInner {
    fn touch(&self) {
        *locked(&self.last_activity) = Instant::now();
    }

    /// Unregister the ticker. The timer's own expiry path only detaches it,
    /// since aborting would cancel the task doing the completing.
    fn stop_ticker(&self, trigger: CompletionTrigger) {
        if let Some(handle) = locked(&self.ticker).take() {
            if trigger == CompletionTrigger::Manual {
                handle.abort();
            }
        }
    }

    async fn run_reconciliation(self: Arc<Self>) -> QuizResult {
        let answers = self.attempt.answers();
        let quiz = self.attempt.quiz().clone();

        let result = reconcile(self.store.as_ref(), self.user_id, &quiz, &answers).await;

        *locked(&self.result) = Some(result.clone());
        *locked(&self.settled_at) = Some(Instant::now());
        self.attempt.settle();
        let _ = self.events.send(SessionEvent::Settled(result.clone()));

        result
    }

    async fn complete(self: Arc<Self>, trigger: CompletionTrigger) -> Completion {
        // Check-and-set happens before any await
        if !self.attempt.try_lock_submission() {
            debug!(
                "Ignoring {:?} completion of attempt {}, already {:?}",
                trigger,
                self.attempt.id(),
                self.attempt.phase()
            );
            return Completion::DoubleSubmissionRejected;
        }

        self.stop_ticker(trigger);
        info!(
            "Submitting attempt {} on quiz {} ({:?})",
            self.attempt.id(),
            self.attempt.quiz().id,
            trigger
        );

        // Reconciliation runs on its own task so a dropped caller cannot cut it short
        let attempt_id = self.attempt.id();
        match tokio::spawn(self.clone().run_reconciliation()).await {
            Ok(result) => Completion::Settled(result),
            Err(err) => {
                error!("Reconciliation task for attempt {} failed: {}", attempt_id, err);
                // Settle without a result so the attempt does not sit in Submitting
                *locked(&self.settled_at) = Some(Instant::now());
                self.attempt.settle();
                Completion::Interrupted
            }
        }
    }
}

fn spawn_ticker(inner: Arc<SessionInner>) -> JoinHandle<()> {
    tokio::spawn(async move {
        if inner.attempt.remaining_seconds() == 0 {
            info!("Attempt {} has no time budget", inner.attempt.id());
            inner.clone().complete(CompletionTrigger::TimerExpired).await;
            return;
        }

        let mut interval = tokio::time::interval(Duration::from_secs(1));
        interval.tick().await; // first tick completes immediately

        loop {
            interval.tick().await;
            match inner.attempt.tick() {
                TickOutcome::Running { remaining_seconds } => {
                    let _ = inner.events.send(SessionEvent::Tick { remaining_seconds });
                }
                TickOutcome::Expired => {
                    info!("Time is up for attempt {}", inner.attempt.id());
                    inner.clone().complete(CompletionTrigger::TimerExpired).await;
                    break;
                }
                TickOutcome::Ignored => break,
            }
        }
    })
}

/// A running quiz attempt for one user, with its countdown.
///
/// Must be created inside a tokio runtime. Dropping the session stops the
/// countdown; a reconciliation already under way still runs to completion.
pub struct QuizSession {
    inner: Arc<SessionInner>,
}

impl QuizSession {
    pub fn start(store: Arc<dyn RecordStore>, user_id: UserId, quiz: Arc<QuizDefinition>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let attempt = AttemptState::new(quiz);
        attempt.start();

        let inner = Arc::new(SessionInner {
            attempt,
            user_id,
            store,
            ticker: Mutex::new(None),
            result: Mutex::new(None),
            settled_at: Mutex::new(None),
            last_activity: Mutex::new(Instant::now()),
            events,
        });

        let handle = spawn_ticker(inner.clone());
        *locked(&inner.ticker) = Some(handle);

        info!(
            "User {} started attempt {} on quiz {}",
            user_id,
            inner.attempt.id(),
            inner.attempt.quiz().id
        );
        Self { inner }
    }

    pub fn id(&self) -> AttemptId {
        self.inner.attempt.id()
    }

    pub fn user_id(&self) -> UserId {
        self.inner.user_id
    }

    pub fn quiz(&self) -> &Arc<QuizDefinition> {
        self.inner.attempt.quiz()
    }

    pub fn phase(&self) -> AttemptPhase {
        self.inner.attempt.phase()
    }

    pub fn result(&self) -> Option<QuizResult> {
        locked(&self.inner.result).clone()
    }

    pub fn settled_at(&self) -> Option<Instant> {
        *locked(&self.inner.settled_at)
    }

    pub fn last_activity(&self) -> Instant {
        *locked(&self.inner.last_activity)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub fn select_answer(&self, option_index: usize) -> Result<(), AttemptError> {
        self.inner.touch();
        self.inner.attempt.select_answer(option_index)
    }

    pub fn go_back(&self) -> Result<usize, AttemptError> {
        self.inner.touch();
        self.inner.attempt.go_back()
    }

    /// Move to the next question, submitting when already on the last one
    pub async fn advance(&self) -> Result<SessionAdvance, AttemptError> {
        self.inner.touch();
        match self.inner.attempt.advance()? {
            AdvanceOutcome::Moved(index) => Ok(SessionAdvance::Moved(index)),
            AdvanceOutcome::Completed => Ok(SessionAdvance::Finished(
                self.inner.clone().complete(CompletionTrigger::Manual).await,
            )),
        }
    }

    /// Submit now, whatever question the user is on
    pub async fn finish(&self) -> Completion {
        self.inner.touch();
        self.inner.clone().complete(CompletionTrigger::Manual).await
    }

    /// Leave the quiz view. An unsubmitted attempt is discarded.
    pub fn exit(&self) {
        if self.inner.attempt.abandon() {
            info!("Attempt {} abandoned", self.id());
        }
        self.inner.stop_ticker(CompletionTrigger::Manual);
    }

    pub fn view(&self) -> AttemptView {
        self.inner.attempt.view(self.result())
    }
}

impl Drop for QuizSession {
    fn drop(&mut self) {
        if let Some(handle) = locked(&self.inner.ticker).take() {
            handle.abort();
        }
    }
}
