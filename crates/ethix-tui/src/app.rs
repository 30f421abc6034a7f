use ethix_core::{
    ChatTurn, CompletionBackend, CompletionError, CredentialStore, KeyValueStore, MistralClient,
    Session,
};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, warn};

use crate::tui::AppEvent;
use crate::ui;

pub type Credentials = CredentialStore<Box<dyn KeyValueStore + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// Replace every character with a bullet
pub fn mask_key(key: &str) -> String {
    "•".repeat(key.chars().count())
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Conversation
    pub session: Session,
    pub client: MistralClient,
    pub credentials: Credentials,
    events: UnboundedSender<AppEvent>,

    // Message input
    pub input: String,
    pub input_cursor: usize, // cursor position in chars

    // Chat view
    pub chat_scroll: u16,
    pub chat_height: u16, // inner height, for scroll calculations
    pub chat_width: u16,  // inner width, for wrap calculations
    pub follow_chat: bool, // keep the view on the newest rows

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // API key modal
    pub show_api_key_modal: bool,
    pub api_key_input: String,
    pub api_key_cursor: usize,
    pub reveal_api_key: bool,
    pub api_key_error: Option<String>,
}

impl App {
    pub fn new(client: MistralClient, credentials: Credentials, events: UnboundedSender<AppEvent>) -> Self {
        Self {
            should_quit: false,
            // Start ready to type
            input_mode: InputMode::Editing,

            session: Session::new(),
            client,
            credentials,
            events,

            input: String::new(),
            input_cursor: 0,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            follow_chat: true,

            animation_frame: 0,

            show_api_key_modal: false,
            api_key_input: String::new(),
            api_key_cursor: 0,
            reveal_api_key: false,
            api_key_error: None,
        }
    }

    pub fn turns(&self) -> &[ChatTurn] {
        self.session.turns()
    }

    /// Send the current input. Blank input or a pending request leaves
    /// everything, including the input box, as it was.
    pub fn submit(&mut self) {
        let Some(pending) = self.session.begin(&self.input) else {
            return;
        };

        self.input.clear();
        self.input_cursor = 0;
        self.scroll_chat_to_bottom();

        let client = self.client.clone();
        let api_key = self.credentials.get().to_string();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = client.complete(&api_key, &pending.history, &pending.text).await;
            if events.send(AppEvent::Completion(result)).is_err() {
                warn!("event loop gone before completion arrived");
            }
        });
    }

    pub fn on_completion(&mut self, result: Result<String, CompletionError>) {
        self.session.finish(result);
        self.animation_frame = 0;
        self.scroll_chat_to_bottom();
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.session.is_in_flight() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_down(&mut self) {
        let max = self.max_chat_scroll();
        self.chat_scroll = self.chat_scroll.saturating_add(1).min(max);
        self.follow_chat = self.chat_scroll == max;
    }

    pub fn scroll_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
        self.follow_chat = false;
    }

    pub fn scroll_page_down(&mut self) {
        let page = self.chat_height.max(2) / 2;
        let max = self.max_chat_scroll();
        self.chat_scroll = self.chat_scroll.saturating_add(page).min(max);
        self.follow_chat = self.chat_scroll == max;
    }

    pub fn scroll_page_up(&mut self) {
        let page = self.chat_height.max(2) / 2;
        self.chat_scroll = self.chat_scroll.saturating_sub(page);
        self.follow_chat = false;
    }

    pub fn scroll_chat_to_top(&mut self) {
        self.chat_scroll = 0;
        self.follow_chat = false;
    }

    /// Scroll so the newest turn (or the thinking indicator) is visible.
    /// The view stays pinned there across later renders until the user
    /// scrolls up.
    pub fn scroll_chat_to_bottom(&mut self) {
        self.chat_scroll = self.max_chat_scroll();
        self.follow_chat = true;
    }

    pub(crate) fn max_chat_scroll(&self) -> u16 {
        let visible_height = if self.chat_height > 0 { self.chat_height } else { 20 };
        self.chat_line_count().saturating_sub(visible_height)
    }

    /// Rows the chat takes once wrapped at the chat width, saturating at
    /// `u16::MAX` (the furthest a paragraph can scroll)
    pub fn chat_line_count(&self) -> u16 {
        // Default to 50 until the first render sets the width
        let wrap_width = if self.chat_width > 0 { self.chat_width } else { 50 };
        let rows = ui::chat_paragraph(self).line_count(wrap_width);
        u16::try_from(rows).unwrap_or(u16::MAX)
    }

    // API key modal

    pub fn open_api_key_modal(&mut self) {
        self.api_key_input = self.credentials.override_key().unwrap_or_default().to_string();
        self.api_key_cursor = self.api_key_input.chars().count();
        self.reveal_api_key = false;
        self.api_key_error = None;
        self.show_api_key_modal = true;
    }

    pub fn close_api_key_modal(&mut self) {
        self.show_api_key_modal = false;
        self.api_key_input.clear();
        self.api_key_cursor = 0;
        self.api_key_error = None;
    }

    /// Empty field falls back to the default key
    pub fn save_api_key(&mut self) {
        let key = self.api_key_input.trim().to_string();
        match self.credentials.set(&key) {
            Ok(()) => self.close_api_key_modal(),
            Err(e) => {
                error!(error = %e, "failed to save API key");
                self.api_key_error = Some(format!("Could not save key: {}", e));
            }
        }
    }

    /// Clears the field; nothing is stored until the user saves
    pub fn reset_api_key_field(&mut self) {
        self.api_key_input.clear();
        self.api_key_cursor = 0;
    }

    pub fn toggle_api_key_reveal(&mut self) {
        self.reveal_api_key = !self.reveal_api_key;
    }

    pub fn key_status_label(&self) -> &'static str {
        if self.credentials.is_using_default() {
            "Using Default Key"
        } else {
            "Using Custom Key"
        }
    }

    /// The active key as shown in the modal, masked unless revealed
    pub fn displayed_active_key(&self) -> String {
        let key = self.credentials.get();
        if self.reveal_api_key {
            key.to_string()
        } else {
            mask_key(key)
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ethix_core::{ChatRole, Config, MemoryStore};
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    pub(crate) fn test_app_with(config: &Config) -> (App, UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let storage: Box<dyn KeyValueStore + Send> = Box::new(MemoryStore::new());
        let credentials = CredentialStore::load(storage, "default-key");
        (App::new(MistralClient::new(config), credentials, tx), rx)
    }

    pub(crate) fn test_app() -> (App, UnboundedReceiver<AppEvent>) {
        test_app_with(&Config::default())
    }

    async fn next_completion(rx: &mut UnboundedReceiver<AppEvent>) -> Result<String, CompletionError> {
        loop {
            match rx.recv().await {
                Some(AppEvent::Completion(result)) => return result,
                Some(_) => continue,
                None => panic!("channel closed"),
            }
        }
    }

    #[tokio::test]
    async fn test_submit_round_trip() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer default-key")
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"content":"Hi there"}}]}"#)
            .create_async()
            .await;

        let config = Config { api_base: server.url(), ..Config::default() };
        let (mut app, mut rx) = test_app_with(&config);

        app.input = "Hello".to_string();
        app.input_cursor = 5;
        app.submit();

        assert!(app.input.is_empty());
        assert_eq!(app.input_cursor, 0);
        assert!(app.session.is_in_flight());

        let result = next_completion(&mut rx).await;
        app.on_completion(result);

        let turns = app.turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].role, ChatRole::Assistant);
        assert_eq!(turns[1].content, "Hi there");
        assert!(!app.session.is_in_flight());
    }

    #[tokio::test]
    async fn test_submit_while_waiting_keeps_input() {
        let (mut app, _rx) = test_app_with(&Config {
            api_base: "http://127.0.0.1:1".to_string(),
            ..Config::default()
        });

        app.input = "first".to_string();
        app.submit();
        app.input = "second".to_string();
        app.submit();

        assert_eq!(app.input, "second");
        assert_eq!(app.turns().len(), 1);
    }

    #[test]
    fn test_blank_submit_is_noop() {
        let (mut app, _rx) = test_app();
        app.input = "   ".to_string();
        app.submit();

        assert_eq!(app.input, "   ");
        assert!(app.turns().is_empty());
        assert!(!app.session.is_in_flight());
    }

    #[test]
    fn test_modal_save_and_reset() {
        let (mut app, _rx) = test_app();

        app.open_api_key_modal();
        assert!(app.api_key_input.is_empty());
        app.api_key_input = "  sk-custom  ".to_string();
        app.save_api_key();

        assert!(!app.show_api_key_modal);
        assert_eq!(app.credentials.get(), "sk-custom");
        assert_eq!(app.key_status_label(), "Using Custom Key");

        app.open_api_key_modal();
        assert_eq!(app.api_key_input, "sk-custom");
        app.reset_api_key_field();
        // Reset alone doesn't touch the stored key
        assert_eq!(app.credentials.get(), "sk-custom");
        app.save_api_key();

        assert_eq!(app.credentials.get(), "default-key");
        assert_eq!(app.key_status_label(), "Using Default Key");
    }

    #[test]
    fn test_active_key_masked_until_revealed() {
        let (mut app, _rx) = test_app();
        app.open_api_key_modal();

        assert_eq!(app.displayed_active_key(), "•••••••••••");
        app.toggle_api_key_reveal();
        assert_eq!(app.displayed_active_key(), "default-key");
    }

    #[test]
    fn test_line_count_follows_word_wrap() {
        let (mut app, _rx) = test_app();
        app.chat_width = 10;
        // 27 chars, but only one 6-letter word fits per 10-column row
        app.session.begin("aaaaaa bbbbbb cccccc dddddd").unwrap();

        // header + 4 wrapped rows + blank + thinking (2)
        assert_eq!(app.chat_line_count(), 8);
    }

    #[test]
    fn test_line_count_saturates_on_huge_history() {
        let (mut app, _rx) = test_app();
        app.session.begin("Hello").unwrap();
        app.session.finish(Ok("x\n".repeat(70_000)));

        assert_eq!(app.chat_line_count(), u16::MAX);
        app.scroll_chat_to_bottom();
        assert_eq!(app.chat_scroll, u16::MAX - 20);
    }

    #[test]
    fn test_scrolling_up_stops_following() {
        let (mut app, _rx) = test_app();
        app.chat_width = 20;
        app.chat_height = 4;
        app.session.begin("one\ntwo\nthree\nfour\nfive").unwrap();

        app.scroll_chat_to_bottom();
        let bottom = app.chat_scroll;
        assert!(bottom > 0);
        assert!(app.follow_chat);

        app.scroll_up();
        assert!(!app.follow_chat);
        assert_eq!(app.chat_scroll, bottom - 1);

        for _ in 0..10 {
            app.scroll_down();
        }
        assert_eq!(app.chat_scroll, bottom);
        assert!(app.follow_chat);
    }

    #[test]
    fn test_animation_only_while_waiting() {
        let (mut app, _rx) = test_app();
        app.tick_animation();
        assert_eq!(app.animation_frame, 0);

        app.session.begin("hi").unwrap();
        app.tick_animation();
        app.tick_animation();
        app.tick_animation();
        assert_eq!(app.animation_frame, 0);
        app.tick_animation();
        assert_eq!(app.animation_frame, 1);
    }
}
