use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ratatui::widgets::ListState;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use flowchat_core::format::last_code_block;
use flowchat_core::{ChatSession, Config, Provider, Transport, TransportError};

use crate::highlight::Highlighter;
use crate::theme::ThemeMode;

/// How long the copy confirmation stays in the footer
pub const NOTICE_TTL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

pub type PendingReply = JoinHandle<Result<String, TransportError>>;

/// Clipboard write running on the blocking pool; resolves to whether it succeeded
pub type PendingCopy = JoinHandle<bool>;

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Conversation
    pub session: ChatSession,
    pub pending: Option<PendingReply>,

    // Input box
    pub input: String,
    pub cursor: usize, // cursor position in chars

    // Chat view; `chat_height` and `chat_lines` are written during render
    pub scroll: u16,
    pub follow: bool,
    pub chat_height: u16,
    pub chat_lines: u16,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Transient footer message ("Copied!")
    pub notice: Option<(String, Instant)>,
    pub pending_copy: Option<PendingCopy>,

    // Appearance
    pub theme: ThemeMode,
    pub highlighter: Highlighter,

    // Provider state
    pub config: Config,
    /// File that theme and provider changes are written back to
    pub config_path: PathBuf,
    pub provider: Provider,
    pub transport: Arc<dyn Transport>,
    pub show_provider_picker: bool,
    pub provider_picker_state: ListState,
}

impl App {
    pub fn new(config: Config, provider: Provider, config_path: PathBuf) -> Self {
        let theme = config
            .theme
            .as_deref()
            .and_then(ThemeMode::from_str)
            .unwrap_or_default();
        let transport = config.transport(provider);

        Self {
            should_quit: false,
            input_mode: InputMode::Editing,

            session: ChatSession::new(),
            pending: None,

            input: String::new(),
            cursor: 0,

            scroll: 0,
            follow: true,
            chat_height: 0,
            chat_lines: 0,

            animation_frame: 0,
            notice: None,
            pending_copy: None,

            theme,
            highlighter: Highlighter::new(),

            config,
            config_path,
            provider,
            transport,
            show_provider_picker: false,
            provider_picker_state: ListState::default(),
        }
    }

    /// Send the input box contents; refused while a reply is pending
    pub fn submit_input(&mut self) {
        if self.pending.is_some() {
            return;
        }

        let input = self.input.clone();
        let Some(message) = self.session.submit(&input, self.transport.as_ref()) else {
            if !input.trim().is_empty() {
                // Turn was recorded but config was missing; clear the box anyway
                self.clear_input();
                self.follow = true;
            }
            return;
        };

        self.clear_input();
        self.follow = true;

        let transport = self.transport.clone();
        debug!(transport = transport.name(), "dispatching request");
        self.pending = Some(tokio::spawn(async move { transport.send(&message).await }));
    }

    /// Apply a finished request, if any
    pub async fn poll_pending(&mut self) {
        let finished = self.pending.as_ref().is_some_and(|task| task.is_finished());
        if !finished {
            return;
        }

        if let Some(task) = self.pending.take() {
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(err) => Err(TransportError::Aborted(err.to_string())),
            };
            self.session.complete(outcome);
            self.follow = true;
        }
    }

    /// Called on every Tick event
    pub async fn tick(&mut self) {
        if self.session.is_loading() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
        self.poll_pending().await;
        self.poll_copy().await;

        if self
            .notice
            .as_ref()
            .is_some_and(|(_, shown)| shown.elapsed() >= NOTICE_TTL)
        {
            self.notice = None;
        }
    }

    pub fn clear_input(&mut self) {
        self.input.clear();
        self.cursor = 0;
    }

    pub fn set_notice(&mut self, text: impl Into<String>) {
        self.notice = Some((text.into(), Instant::now()));
    }

    // Scrolling
    pub fn max_scroll(&self) -> u16 {
        self.chat_lines.saturating_sub(self.chat_height)
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.follow = false;
        self.scroll = self.scroll.min(self.max_scroll()).saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_add(lines).min(self.max_scroll());
        if self.scroll >= self.max_scroll() {
            self.follow = true;
        }
    }

    pub fn scroll_to_top(&mut self) {
        self.follow = false;
        self.scroll = 0;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.follow = true;
        self.scroll = self.max_scroll();
    }

    pub fn half_page(&self) -> u16 {
        (self.chat_height / 2).max(1)
    }

    // Clipboard
    pub fn copy_last_code_block(&mut self) {
        let code = self
            .session
            .store()
            .last_assistant()
            .and_then(|turn| last_code_block(&turn.content))
            .map(str::to_string);

        match code {
            Some(code) => self.copy(&code),
            None => self.set_notice("No code block to copy"),
        }
    }

    pub fn copy_last_reply(&mut self) {
        let reply = self
            .session
            .store()
            .last_assistant()
            .map(|turn| turn.content.clone());

        match reply {
            Some(reply) => self.copy(&reply),
            None => self.set_notice("Nothing to copy yet"),
        }
    }

    fn copy(&mut self, text: &str) {
        let text = text.to_string();
        self.pending_copy = Some(tokio::task::spawn_blocking(move || {
            copy_to_clipboard(&text)
        }));
    }

    /// Report a finished clipboard write in the footer
    pub async fn poll_copy(&mut self) {
        let finished = self
            .pending_copy
            .as_ref()
            .is_some_and(|task| task.is_finished());
        if !finished {
            return;
        }

        if let Some(task) = self.pending_copy.take() {
            match task.await {
                Ok(true) => self.set_notice("Copied!"),
                Ok(false) => self.set_notice("Clipboard unavailable"),
                Err(err) => {
                    warn!(error = %err, "clipboard task failed");
                    self.set_notice("Clipboard unavailable");
                }
            }
        }
    }

    // Appearance
    pub fn toggle_theme(&mut self) {
        self.theme = self.theme.toggle();
        if let Err(err) = Config::save_theme(&self.config_path, self.theme.as_str()) {
            warn!(error = %err, "failed to persist theme");
        }
    }

    // Provider picker methods
    pub fn open_provider_picker(&mut self) {
        let current_idx = Provider::all()
            .iter()
            .position(|p| *p == self.provider)
            .unwrap_or(0);
        self.provider_picker_state.select(Some(current_idx));
        self.show_provider_picker = true;
    }

    pub fn provider_picker_nav_down(&mut self) {
        let len = Provider::all().len();
        if len > 0 {
            let i = self.provider_picker_state.selected().unwrap_or(0);
            self.provider_picker_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn provider_picker_nav_up(&mut self) {
        let i = self.provider_picker_state.selected().unwrap_or(0);
        self.provider_picker_state.select(Some(i.saturating_sub(1)));
    }

    pub fn confirm_provider(&mut self) {
        let selected = self
            .provider_picker_state
            .selected()
            .and_then(|i| Provider::all().get(i).copied());
        if let Some(provider) = selected {
            self.set_provider(provider);
            if let Err(err) = Config::save_provider(&self.config_path, provider) {
                warn!(error = %err, "failed to persist provider");
            }
        }
        self.show_provider_picker = false;
    }

    pub fn set_provider(&mut self, provider: Provider) {
        self.provider = provider;
        self.transport = self.config.transport(provider);
    }

    /// Returns the source of the credential for a provider: "env", "config", or None
    pub fn get_key_source(&self, provider: Provider) -> Option<&'static str> {
        self.config.key_source(provider)
    }
}

/// Copy text using the first clipboard tool that is available. Blocks until
/// the tool exits, so call it off the async workers.
pub fn copy_to_clipboard(text: &str) -> bool {
    const TOOLS: &[(&str, &[&str])] = &[
        ("pbcopy", &[]),
        ("wl-copy", &[]),
        ("xclip", &["-selection", "clipboard"]),
        ("xsel", &["--clipboard", "--input"]),
    ];

    TOOLS
        .iter()
        .any(|(program, args)| pipe_to_command(program, args, text))
}

/// Feed `text` to the program's stdin; true when it was fully written and the
/// program exited successfully
fn pipe_to_command(program: &str, args: &[&str], text: &str) -> bool {
    use std::io::Write;
    use std::process::{Command, Stdio};

    let Ok(mut child) = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    else {
        return false;
    };

    // stdin is dropped at the end of the closure so the program sees EOF
    let written = child
        .stdin
        .take()
        .map(|mut stdin| stdin.write_all(text.as_bytes()).is_ok())
        .unwrap_or(false);
    // Always reap the child, even after a failed write
    let exited_ok = child.wait().map(|status| status.success()).unwrap_or(false);
    if !written {
        debug!(program, "clipboard tool closed stdin early");
    }
    written && exited_ok
}

#[cfg(test)]
impl App {
    /// App whose config writes land in a scratch file nobody reads
    pub(crate) fn for_tests() -> Self {
        let path = std::env::temp_dir().join("flowchat-tests-unused-config.json");
        Self::new(Config::new(), Provider::Langflow, path)
    }
}
