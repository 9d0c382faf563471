use eco_types::{AttemptId, AttemptPhase, AttemptView, PublicQuestion, QuizDefinition, QuizResult};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

const NOT_STARTED: u8 = 0;
const IN_PROGRESS: u8 = 1;
const SUBMITTING: u8 = 2;
const SETTLED: u8 = 3;

fn phase_from_u8(value: u8) -> AttemptPhase {
    match value {
        NOT_STARTED => AttemptPhase::NotStarted,
        IN_PROGRESS => AttemptPhase::InProgress,
        SUBMITTING => AttemptPhase::Submitting,
        _ => AttemptPhase::Settled,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttemptError {
    #[error("attempt is {phase:?}, not in progress")]
    NotInProgress { phase: AttemptPhase },
    #[error("option {option_index} does not exist on question {question_index}")]
    InvalidOption {
        question_index: usize,
        option_index: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// Moved on to the given question index
    Moved(usize),
    /// Already on the final question; the attempt should be submitted
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Running { remaining_seconds: u32 },
    Expired,
    /// Attempt is not in progress, the tick does nothing
    Ignored,
}

#[derive(Debug, Default)]
struct Progress {
    current_question: usize,
    answers: BTreeMap<usize, usize>,
    remaining_seconds: u32,
}

/// Transient state of one quiz attempt.
///
/// The phase lives in an atomic so the `InProgress -> Submitting` transition is a
/// single compare-and-swap: whichever of the timer or the user gets there first
/// wins, the other sees the lock already taken. Answers and the clock sit behind
/// a short-lived mutex that is never held across an await.
#[derive(Debug)]
pub struct AttemptState {
    id: AttemptId,
    quiz: Arc<QuizDefinition>,
    phase: AtomicU8,
    progress: Mutex<Progress>,
}

impl AttemptState {
    pub fn new(quiz: Arc<QuizDefinition>) -> Self {
        Self {
            id: Uuid::new_v4(),
            quiz,
            phase: AtomicU8::new(NOT_STARTED),
            progress: Mutex::new(Progress::default()),
        }
    }

    pub fn id(&self) -> AttemptId {
        self.id
    }

    pub fn quiz(&self) -> &Arc<QuizDefinition> {
        &self.quiz
    }

    pub fn phase(&self) -> AttemptPhase {
        phase_from_u8(self.phase.load(Ordering::Acquire))
    }

    fn progress(&self) -> MutexGuard<'_, Progress> {
        // A panic while holding the guard cannot leave Progress half-written
        self.progress
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ensure_in_progress(&self) -> Result<(), AttemptError> {
        match self.phase() {
            AttemptPhase::InProgress => Ok(()),
            phase => Err(AttemptError::NotInProgress { phase }),
        }
    }

    /// `NotStarted -> InProgress`. Returns false if the attempt was already started.
    pub fn start(&self) -> bool {
        let started = self
            .phase
            .compare_exchange(NOT_STARTED, IN_PROGRESS, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();

        if started {
            let mut progress = self.progress();
            progress.current_question = 0;
            progress.answers.clear();
            progress.remaining_seconds = self.quiz.time_limit_seconds;
        }

        started
    }

    /// Record (or overwrite) the answer for the current question
    pub fn select_answer(&self, option_index: usize) -> Result<(), AttemptError> {
        // Checked under the progress lock: no answer lands after the submission snapshot
        let mut progress = self.progress();
        self.ensure_in_progress()?;

        let question_index = progress.current_question;
        let option_count = self
            .quiz
            .questions
            .get(question_index)
            .map(|q| q.options.len())
            .unwrap_or(0);

        if option_index >= option_count {
            return Err(AttemptError::InvalidOption {
                question_index,
                option_index,
            });
        }

        progress.answers.insert(question_index, option_index);
        Ok(())
    }

    pub fn advance(&self) -> Result<AdvanceOutcome, AttemptError> {
        let mut progress = self.progress();
        self.ensure_in_progress()?;

        let next = progress.current_question + 1;
        if next < self.quiz.questions.len() {
            progress.current_question = next;
            Ok(AdvanceOutcome::Moved(next))
        } else {
            Ok(AdvanceOutcome::Completed)
        }
    }

    pub fn go_back(&self) -> Result<usize, AttemptError> {
        let mut progress = self.progress();
        self.ensure_in_progress()?;

        progress.current_question = progress.current_question.saturating_sub(1);
        Ok(progress.current_question)
    }

    /// One second of the time budget elapses
    pub fn tick(&self) -> TickOutcome {
        if self.phase() != AttemptPhase::InProgress {
            return TickOutcome::Ignored;
        }

        let mut progress = self.progress();
        progress.remaining_seconds = progress.remaining_seconds.saturating_sub(1);
        if progress.remaining_seconds == 0 {
            TickOutcome::Expired
        } else {
            TickOutcome::Running {
                remaining_seconds: progress.remaining_seconds,
            }
        }
    }

    /// `InProgress -> Submitting`. Only the first caller gets `true`; every later
    /// call is a rejected double submission.
    pub fn try_lock_submission(&self) -> bool {
        // Waits out any answer being written, so `answers()` afterwards is final
        let _progress = self.progress();
        self.phase
            .compare_exchange(IN_PROGRESS, SUBMITTING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// `Submitting -> Settled`
    pub fn settle(&self) -> bool {
        self.phase
            .compare_exchange(SUBMITTING, SETTLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Early exit: `InProgress -> Settled` without a result. Nothing is persisted.
    pub fn abandon(&self) -> bool {
        self.phase
            .compare_exchange(IN_PROGRESS, SETTLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn answers(&self) -> BTreeMap<usize, usize> {
        self.progress().answers.clone()
    }

    pub fn current_question(&self) -> usize {
        self.progress().current_question
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.progress().remaining_seconds
    }

    pub fn view(&self, result: Option<QuizResult>) -> AttemptView {
        let phase = self.phase();
        let progress = self.progress();
        let question = match phase {
            AttemptPhase::InProgress => self
                .quiz
                .questions
                .get(progress.current_question)
                .map(PublicQuestion::from),
            _ => None,
        };

        AttemptView {
            attempt_id: self.id,
            quiz_id: self.quiz.id,
            phase,
            current_question: progress.current_question,
            question,
            total_questions: self.quiz.questions.len(),
            answers: progress.answers.clone(),
            remaining_seconds: progress.remaining_seconds,
            result,
        }
    }
}
