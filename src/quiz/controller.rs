use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::{QuestionBank, QuizState};

pub const DEFAULT_RESET_DELAY: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizPhase {
    InProgress,
    /// The last question is answered and the score is on display until the reset.
    Completed,
}

struct Progress {
    state: QuizState,
    phase: QuizPhase,
}

struct Shared {
    progress: Mutex<Progress>,
    tx: watch::Sender<QuizState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Progress> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reset(&self) {
        let mut progress = self.lock();
        // a completion is reset at most once
        if progress.phase != QuizPhase::Completed {
            return;
        }
        progress.state = QuizState::default();
        progress.phase = QuizPhase::InProgress;
        self.tx.send_replace(progress.state.clone());
        debug!("Quiz reset to the first question");
    }
}

/// Drives one run of the quiz over a `QuestionBank`.
///
/// Every new state is published to the observers returned by `subscribe`.
/// Dropping the controller cancels a pending reset.
pub struct QuizController {
    bank: Arc<QuestionBank>,
    shared: Arc<Shared>,
    reset_delay: Duration,
    pending_reset: Option<JoinHandle<()>>,
}

impl QuizController {
    pub fn new(bank: Arc<QuestionBank>, reset_delay: Duration) -> Self {
        let (tx, _) = watch::channel(QuizState::default());
        Self {
            bank,
            shared: Arc::new(Shared {
                progress: Mutex::new(Progress {
                    state: QuizState::default(),
                    phase: QuizPhase::InProgress,
                }),
                tx,
            }),
            reset_delay,
            pending_reset: None,
        }
    }

    pub fn bank(&self) -> &QuestionBank {
        &self.bank
    }

    pub fn state(&self) -> QuizState {
        self.shared.lock().state.clone()
    }

    pub fn phase(&self) -> QuizPhase {
        self.shared.lock().phase
    }

    pub fn is_in_progress(&self) -> bool {
        self.phase() == QuizPhase::InProgress
    }

    /// Observer channel; it always holds the latest state.
    pub fn subscribe(&self) -> watch::Receiver<QuizState> {
        self.shared.tx.subscribe()
    }

    /// Records `option_index` as the answer to the current question.
    ///
    /// Must only be called while the quiz is in progress and with an index
    /// inside the current question's options. Debug builds panic otherwise;
    /// release builds leave the state untouched.
    pub fn submit_answer(&mut self, option_index: usize) -> QuizState {
        let shared = self.shared.clone();
        let mut progress = shared.lock();

        if progress.phase == QuizPhase::Completed {
            if cfg!(debug_assertions) {
                panic!("answer submitted while the final score is on display");
            }
            warn!("Ignoring answer {} submitted after completion", option_index);
            return progress.state.clone();
        }

        let current = progress.state.current_index;
        let options = self.bank.questions()[current].options.len();
        if option_index >= options {
            if cfg!(debug_assertions) {
                panic!(
                    "option {} is out of range for question {} ({} options)",
                    option_index, current, options
                );
            }
            warn!(
                "Ignoring option {} for question {} ({} options)",
                option_index, current, options
            );
            return progress.state.clone();
        }

        progress.state.answers.push(option_index);
        progress.state.score = self.bank.score(&progress.state.answers);

        if current + 1 < self.bank.len() {
            progress.state.current_index += 1;
        } else {
            progress.phase = QuizPhase::Completed;
            debug!(
                "Quiz completed with {}/{}, resetting in {:?}",
                progress.state.score,
                self.bank.len(),
                self.reset_delay
            );
            self.schedule_reset();
        }

        shared.tx.send_replace(progress.state.clone());
        progress.state.clone()
    }

    fn schedule_reset(&mut self) {
        self.cancel_reset();
        let shared: Weak<Shared> = Arc::downgrade(&self.shared);
        let delay = self.reset_delay;
        self.pending_reset = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(shared) = shared.upgrade() {
                shared.reset();
            }
        }));
    }

    /// Drops a scheduled reset; a completed quiz then keeps its score on display.
    pub fn cancel_reset(&mut self) {
        if let Some(pending) = self.pending_reset.take() {
            pending.abort();
        }
    }

    /// Cancels the pending reset and releases the observers.
    pub fn teardown(self) {
        drop(self);
    }
}

impl Drop for QuizController {
    fn drop(&mut self) {
        self.cancel_reset();
    }
}
