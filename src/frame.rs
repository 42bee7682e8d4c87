use std::{collections::HashMap, future::Future, sync::Arc};

use log::{debug, error, info, warn};
use teloxide::{
    prelude::*,
    types::{KeyboardButton, KeyboardMarkup, KeyboardRemove, MessageId, UserId},
    RequestError,
};
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
};

use crate::config::FrameConfig;
use crate::host::{telegram::TelegramHost, Host, PinError};
use crate::quiz::{result_message, QuizController, QuizState};
use crate::shell::{FrameShell, LoadOutcome, ShellView};

pub const LOADING_TEXT: &str = "Loading...";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerOutcome {
    Accepted(QuizState),
    /// The text is not one of the current question's options.
    NotAnOption,
    /// The final score is on display, answers are not taken until the reset.
    Dwelling,
}

/// Where a frame draws itself.
pub trait Screen: Send + Sync + 'static {
    /// Replaces the loading placeholder when no host signalled ready.
    fn show_loaded(&self) -> impl Future<Output = ()> + Send;

    fn show_state(&self, state: QuizState) -> impl Future<Output = ()> + Send;
}

/// One quiz frame: host shell, quiz controller and the task drawing it.
pub struct Frame<H: Host> {
    host: Arc<H>,
    shell: FrameShell<H>,
    controller: QuizController,
    renderer: JoinHandle<()>,
}

impl<H: Host> Frame<H> {
    /// Loads the host shell, then starts drawing the quiz.
    pub async fn start<S: Screen>(host: Arc<H>, screen: Arc<S>, config: &FrameConfig) -> Self {
        let controller = QuizController::new(config.bank.clone(), config.reset_delay);

        let mut shell = FrameShell::new(host.clone());
        match shell.load().await {
            LoadOutcome::Attached => info!(
                "Frame loaded (ready: {}, insets: {:?})",
                shell.is_ready(),
                shell.safe_area_insets()
            ),
            LoadOutcome::Detached => {
                info!("Frame running without a host");
                screen.show_loaded().await;
            }
            LoadOutcome::AlreadyLoaded => debug!("Frame shell was already loaded"),
        }

        let renderer = tokio::spawn(render_loop(screen, controller.subscribe()));

        Self {
            host,
            shell,
            controller,
            renderer,
        }
    }

    /// Submits the option labelled `text` to the current question.
    pub fn answer(&mut self, text: &str) -> AnswerOutcome {
        if !self.controller.is_in_progress() {
            return AnswerOutcome::Dwelling;
        }
        let current = self.controller.state().current_index;
        let Ok(question) = self.controller.bank().get(current) else {
            return AnswerOutcome::NotAnOption;
        };

        match question.option_index(text) {
            Some(index) => AnswerOutcome::Accepted(self.controller.submit_answer(index)),
            None => AnswerOutcome::NotAnOption,
        }
    }

    pub async fn request_pin(&self) -> Result<(), PinError> {
        self.shell.request_pin().await
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn view(&self) -> ShellView {
        self.shell.view()
    }

    /// Releases host listeners, cancels a pending reset and stops rendering.
    pub fn close(&mut self) {
        self.shell.teardown();
        self.renderer.abort();
        self.controller.cancel_reset();
    }
}

async fn render_loop<S: Screen>(screen: Arc<S>, mut states: watch::Receiver<QuizState>) {
    loop {
        let state = states.borrow_and_update().clone();
        screen.show_state(state).await;
        // closed once the controller is gone
        if states.changed().await.is_err() {
            break;
        }
    }
}

pub type SharedFrame<H> = Arc<Mutex<Frame<H>>>;

/// Frames open across chats, at most one per chat.
///
/// Frames are handed out as shared handles so the map is never locked
/// while a frame talks to its host.
pub struct FrameRegistry<H: Host> {
    frames: Arc<Mutex<HashMap<ChatId, SharedFrame<H>>>>,
}

impl<H: Host> Clone for FrameRegistry<H> {
    fn clone(&self) -> Self {
        Self {
            frames: self.frames.clone(),
        }
    }
}

impl<H: Host> Default for FrameRegistry<H> {
    fn default() -> Self {
        Self {
            frames: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<H: Host> FrameRegistry<H> {
    pub async fn get(&self, chat_id: ChatId) -> Option<SharedFrame<H>> {
        self.frames.lock().await.get(&chat_id).cloned()
    }

    pub async fn contains(&self, chat_id: ChatId) -> bool {
        self.frames.lock().await.contains_key(&chat_id)
    }

    /// Registers `frame`, returning the one it replaced.
    pub async fn insert(&self, chat_id: ChatId, frame: Frame<H>) -> Option<SharedFrame<H>> {
        self.frames
            .lock()
            .await
            .insert(chat_id, Arc::new(Mutex::new(frame)))
    }

    pub async fn remove(&self, chat_id: ChatId) -> Option<SharedFrame<H>> {
        self.frames.lock().await.remove(&chat_id)
    }
}

/// The chat messages a frame is drawn with.
pub struct ChatScreen {
    bot: Bot,
    chat_id: ChatId,
    anchor: MessageId,
    config: Arc<FrameConfig>,
}

impl Screen for ChatScreen {
    async fn show_loaded(&self) {
        if let Err(err) = self
            .bot
            .edit_message_text(self.chat_id, self.anchor, self.config.ready_text())
            .await
        {
            warn!("Could not replace the loading message: {}", err);
        }
    }

    async fn show_state(&self, state: QuizState) {
        if let Err(err) = render(&self.bot, self.chat_id, &self.config, &state).await {
            error!("Chat {}: failed to render the quiz: {}", self.chat_id.0, err);
        }
    }
}

pub type ChatFrame = Frame<TelegramHost>;

/// Posts the frame's anchor message in `chat_id` and starts a frame on it.
pub async fn open_in_chat(
    bot: Bot,
    chat_id: ChatId,
    bot_id: UserId,
    config: Arc<FrameConfig>,
) -> Result<ChatFrame, RequestError> {
    let anchor = bot.send_message(chat_id, LOADING_TEXT).await?;
    let host = Arc::new(TelegramHost::new(
        bot.clone(),
        chat_id,
        anchor.id,
        bot_id,
        config.ready_text(),
    ));
    let screen = Arc::new(ChatScreen {
        bot,
        chat_id,
        anchor: anchor.id,
        config: config.clone(),
    });

    let frame = Frame::start(host, screen, &config).await;
    info!("Chat {}: frame opened", chat_id.0);
    Ok(frame)
}

async fn render(
    bot: &Bot,
    chat_id: ChatId,
    config: &FrameConfig,
    state: &QuizState,
) -> Result<(), RequestError> {
    let total = config.bank.len();

    if state.is_complete(total) {
        bot.send_message(chat_id, score_text(config, state))
            .reply_markup(KeyboardRemove::new())
            .await?;
        return Ok(());
    }

    let Ok(question) = config.bank.get(state.current_index) else {
        return Ok(());
    };
    let keyboard = KeyboardMarkup::new(
        question
            .options
            .iter()
            .map(|option| vec![KeyboardButton::new(option.clone())])
            .collect::<Vec<_>>(),
    );

    bot.send_message(chat_id, question_text(config, state))
        .reply_markup(keyboard)
        .await?;
    Ok(())
}

pub fn question_text(config: &FrameConfig, state: &QuizState) -> String {
    let total = config.bank.len();
    let prompt = config
        .bank
        .get(state.current_index)
        .map(|q| q.prompt.as_str())
        .unwrap_or_default();

    format!("{} of {}\n\n{}", state.current_index + 1, total, prompt)
}

pub fn score_text(config: &FrameConfig, state: &QuizState) -> String {
    let total = config.bank.len();
    let mut text = format!("Your Score: {}/{}", state.score, total);
    let messages = config.result_messages.as_slice();
    if let Some(message) = result_message(state.score, total, messages) {
        text.push('\n');
        text.push_str(message);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::fake::FakeHost;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    /// Records what was drawn, with the host's ready count at that moment.
    struct RecordingScreen {
        host: Arc<FakeHost>,
        loaded: StdMutex<usize>,
        drawn: StdMutex<Vec<(QuizState, usize)>>,
    }

    impl RecordingScreen {
        fn new(host: Arc<FakeHost>) -> Arc<Self> {
            Arc::new(Self {
                host,
                loaded: StdMutex::new(0),
                drawn: StdMutex::new(Vec::new()),
            })
        }

        fn loaded(&self) -> usize {
            *self.loaded.lock().unwrap()
        }

        fn drawn(&self) -> Vec<(QuizState, usize)> {
            self.drawn.lock().unwrap().clone()
        }
    }

    impl Screen for RecordingScreen {
        async fn show_loaded(&self) {
            *self.loaded.lock().unwrap() += 1;
        }

        async fn show_state(&self, state: QuizState) {
            let ready = self.host.ready_calls();
            self.drawn.lock().unwrap().push((state, ready));
        }
    }

    async fn start(host: Arc<FakeHost>) -> (Frame<FakeHost>, Arc<RecordingScreen>) {
        let screen = RecordingScreen::new(host.clone());
        let frame = Frame::start(host, screen.clone(), &FrameConfig::default()).await;
        (frame, screen)
    }

    // lets the renderer catch up; the paused clock skips ahead
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn draws_only_after_the_host_is_ready() {
        let host = FakeHost::not_added();
        let (_frame, screen) = start(host.clone()).await;
        settle().await;

        assert_eq!(host.pin_requests(), 1);
        assert_eq!(screen.drawn(), vec![(QuizState::default(), 1)]);
        assert_eq!(screen.loaded(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn without_a_host_the_screen_replaces_the_loading_text() {
        let host = FakeHost::new(None, Ok(()));
        let (_frame, screen) = start(host.clone()).await;
        settle().await;

        assert_eq!(host.ready_calls(), 0);
        assert_eq!(screen.loaded(), 1);
        assert_eq!(screen.drawn(), vec![(QuizState::default(), 0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn option_labels_advance_the_quiz() {
        let (mut frame, screen) = start(FakeHost::not_added()).await;

        let state = match frame.answer("Static frames with buttons") {
            AnswerOutcome::Accepted(state) => state,
            other => panic!("expected the answer to be accepted, got {:?}", other),
        };
        assert_eq!(state.current_index, 1);
        assert_eq!(state.answers, vec![1]);
        assert_eq!(state.score, 1);

        settle().await;
        assert_eq!(screen.drawn().last().map(|(s, _)| s.clone()), Some(state));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_labels_are_not_options() {
        let (mut frame, _screen) = start(FakeHost::not_added()).await;

        assert_eq!(frame.answer("complex daos"), AnswerOutcome::NotAnOption);
        // an option of a later question is not an option of this one
        assert_eq!(frame.answer("Image generation"), AnswerOutcome::NotAnOption);

        let outcome = frame.answer("Complex DAOs");
        assert!(matches!(outcome, AnswerOutcome::Accepted(ref s) if s.score == 0));
    }

    #[tokio::test(start_paused = true)]
    async fn answers_during_the_dwell_wait_for_the_reset() {
        let (mut frame, _screen) = start(FakeHost::not_added()).await;
        for label in ["Static frames with buttons", "User authentication", "Image generation"] {
            assert!(matches!(frame.answer(label), AnswerOutcome::Accepted(_)));
        }

        assert_eq!(frame.answer("Frame buttons"), AnswerOutcome::Dwelling);
        tokio::time::sleep(Duration::from_millis(2999)).await;
        assert_eq!(frame.answer("Complex DAOs"), AnswerOutcome::Dwelling);

        tokio::time::sleep(Duration::from_millis(2)).await;
        let outcome = frame.answer("Complex DAOs");
        assert!(matches!(outcome, AnswerOutcome::Accepted(ref s) if s.current_index == 1));
    }

    #[tokio::test(start_paused = true)]
    async fn closing_stops_drawing_and_the_reset() {
        let host = FakeHost::not_added();
        let (mut frame, screen) = start(host.clone()).await;
        for label in ["Complex DAOs", "Basic interactions", "Frame buttons"] {
            frame.answer(label);
        }
        settle().await;
        let drawn = screen.drawn().len();

        frame.close();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(screen.drawn().len(), drawn);
        assert_eq!(host.bus.listener_count(), 0);
        assert_eq!(frame.answer("Complex DAOs"), AnswerOutcome::Dwelling);
    }

    #[tokio::test(start_paused = true)]
    async fn a_busy_frame_does_not_block_other_chats() {
        let registry = FrameRegistry::default();
        let (first, _first_screen) = start(FakeHost::not_added()).await;
        let (second, _second_screen) = start(FakeHost::not_added()).await;
        registry.insert(ChatId(1), first).await;
        registry.insert(ChatId(2), second).await;

        let busy = registry.get(ChatId(1)).await.unwrap();
        let _in_flight = busy.lock().await;

        let other = registry.get(ChatId(2)).await.unwrap();
        let outcome = other.lock().await.answer("Static frames with buttons");
        assert!(matches!(outcome, AnswerOutcome::Accepted(_)));

        assert!(registry.contains(ChatId(1)).await);
        assert!(registry.remove(ChatId(2)).await.is_some());
        assert!(!registry.contains(ChatId(2)).await);
    }

    #[test]
    fn question_text_shows_progress_and_prompt() {
        let config = FrameConfig::default();
        let state = QuizState {
            current_index: 1,
            answers: vec![1],
            score: 1,
        };

        assert_eq!(
            question_text(&config, &state),
            "2 of 3\n\nWhat requires external services?"
        );
    }

    #[test]
    fn score_text_buckets_the_result() {
        let config = FrameConfig::default();
        let perfect = QuizState {
            current_index: 2,
            answers: vec![1, 1, 2],
            score: 3,
        };
        let zero = QuizState {
            current_index: 2,
            answers: vec![0, 0, 0],
            score: 0,
        };

        assert_eq!(
            score_text(&config, &perfect),
            "Your Score: 3/3\nExpert level! You understand the boundaries"
        );
        assert_eq!(
            score_text(&config, &zero),
            "Your Score: 0/3\nNice try! Let's review Maschine's limits"
        );
    }
}
