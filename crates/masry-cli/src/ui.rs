//! TUI implementation for masry

use std::sync::Arc;
use std::time::Duration;

use crossterm::event::EventStream;
use futures::StreamExt;
use masry_core::{
    AppState, Error, ExchangeEvent, ImageAttachment, KeyValueStore, Message, PendingExchange,
    SearchOutcome, StreamTarget, ThemeMode, Transport, UserInput, ViewMode, drive,
    persona::ASSISTANT_NAME,
};
use masry_tui::{
    TerminalGuard, Theme,
    input::{Action, event_to_action},
    widgets::{
        ChatMessage, ConversationItem, ConversationList, ConversationListState, InputBox,
        LoginScreen, MessageList, SearchPanel, SearchResultItem, SearchView, SourceLink, Speaker,
        Spinner, login, message_list::message_height,
    },
};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};
use tokio::sync::mpsc;

use crate::commands::{CommandResult, execute_command};
use crate::utils::format_date;

/// Width of the conversation sidebar
const SIDEBAR_WIDTH: u16 = 32;

/// Lines scrolled per PageUp/PageDown
const PAGE: usize = 10;

/// Which box receives typing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Sidebar,
    Search,
    Composer,
}

impl Focus {
    fn next(self) -> Self {
        match self {
            Focus::Sidebar => Focus::Search,
            Focus::Search => Focus::Composer,
            Focus::Composer => Focus::Sidebar,
        }
    }

    fn previous(self) -> Self {
        match self {
            Focus::Sidebar => Focus::Composer,
            Focus::Search => Focus::Sidebar,
            Focus::Composer => Focus::Search,
        }
    }
}

/// What the loop should do after an action
#[derive(Debug)]
pub enum Outcome {
    Continue,
    /// Drive this exchange in the background
    Start(PendingExchange),
    Quit,
}

/// View state that lives only as long as the terminal session
pub struct TuiState {
    composer: InputBox,
    search: InputBox,
    login: InputBox,
    login_error: Option<String>,
    sidebar: ConversationListState,
    search_selected: usize,
    focus: Focus,
    attachment: Option<ImageAttachment>,
    /// Command output shown over the main panel
    notice: Option<String>,
    /// Transcript scroll, in lines up from the bottom
    scroll: usize,
    tick: usize,
}

impl TuiState {
    pub fn new<S: KeyValueStore>(state: &AppState<S>) -> Self {
        let mut login = InputBox::new()
            .with_title("Name")
            .with_placeholder("Your name");
        login.set_focused(true);

        let mut ui = Self {
            composer: InputBox::new().with_placeholder("Ask me anything..."),
            search: InputBox::new()
                .with_title("Search")
                .with_placeholder("Search conversations"),
            login,
            login_error: None,
            sidebar: ConversationListState::default(),
            search_selected: 0,
            focus: Focus::Composer,
            attachment: None,
            notice: None,
            scroll: 0,
            tick: 0,
        };
        ui.sync_sidebar(state);
        ui.set_focus(Focus::Composer);
        ui
    }

    fn set_focus(&mut self, focus: Focus) {
        self.focus = focus;
        self.composer.set_focused(focus == Focus::Composer);
        self.search.set_focused(focus == Focus::Search);
    }

    /// Point the sidebar selection at the active conversation
    fn sync_sidebar<S: KeyValueStore>(&mut self, state: &AppState<S>) {
        self.sidebar.selected = state
            .conversations()
            .iter()
            .position(|c| c.id == state.active_id())
            .unwrap_or(0);
    }

    fn composer_title(&self) -> String {
        match &self.attachment {
            Some(image) => format!("Message [image: {}]", image.name),
            None => "Message".to_string(),
        }
    }

    /// Apply one key or paste action
    pub fn handle_action<S: KeyValueStore>(
        &mut self,
        action: Action,
        state: &mut AppState<S>,
        width: u16,
    ) -> Outcome {
        if !state.is_logged_in() {
            return self.handle_login_action(action, state, width);
        }

        match action {
            Action::Quit => return Outcome::Quit,
            Action::Interrupt => {
                if !state.cancel_exchange() {
                    return Outcome::Quit;
                }
            }
            Action::Escape => {
                if !state.cancel_exchange() {
                    self.back(state);
                }
            }
            Action::NewConversation => {
                state.create_conversation();
                self.after_switch(state);
            }
            Action::DeleteConversation => {
                let id = match self.focus {
                    Focus::Sidebar => state
                        .conversations()
                        .get(self.sidebar.selected)
                        .map(|c| c.id.clone()),
                    _ => Some(state.active_id().to_string()),
                };
                if let Some(id) = id {
                    state.delete_conversation(&id);
                }
                self.sync_sidebar(state);
                self.scroll = 0;
            }
            Action::ToggleTheme => {
                state.toggle_theme();
            }
            Action::FocusSearch => self.set_focus(Focus::Search),
            Action::Logout => {
                state.logout();
                self.login.clear();
                self.login_error = None;
            }
            Action::Tab => self.set_focus(self.focus.next()),
            Action::BackTab => self.set_focus(self.focus.previous()),
            Action::PageUp => self.scroll = self.scroll.saturating_add(PAGE),
            Action::PageDown => self.scroll = self.scroll.saturating_sub(PAGE),
            action => {
                return match self.focus {
                    Focus::Sidebar => self.handle_sidebar_action(action, state),
                    Focus::Search => self.handle_search_action(action, state, width),
                    Focus::Composer => self.handle_composer_action(action, state, width),
                };
            }
        }
        Outcome::Continue
    }

    fn handle_login_action<S: KeyValueStore>(
        &mut self,
        action: Action,
        state: &mut AppState<S>,
        width: u16,
    ) -> Outcome {
        match action {
            Action::Quit | Action::Interrupt => return Outcome::Quit,
            Action::Submit => match state.login(self.login.content()) {
                Ok(()) => {
                    self.login.clear();
                    self.login_error = None;
                    self.set_focus(Focus::Composer);
                }
                Err(e) => self.login_error = Some(e.to_string()),
            },
            action => {
                let box_width = width.min(login::CARD_WIDTH).saturating_sub(2);
                self.login.handle_action(&action, box_width);
            }
        }
        Outcome::Continue
    }

    fn handle_sidebar_action<S: KeyValueStore>(
        &mut self,
        action: Action,
        state: &mut AppState<S>,
    ) -> Outcome {
        let count = state.conversations().len();
        match action {
            Action::Up => self.sidebar.up(count),
            Action::Down => self.sidebar.down(count),
            Action::Submit => {
                if let Some(id) = state
                    .conversations()
                    .get(self.sidebar.selected)
                    .map(|c| c.id.clone())
                {
                    state.select_conversation(&id);
                    self.after_switch(state);
                }
            }
            _ => {}
        }
        Outcome::Continue
    }

    fn handle_search_action<S: KeyValueStore>(
        &mut self,
        action: Action,
        state: &mut AppState<S>,
        width: u16,
    ) -> Outcome {
        let hit_count = state.search().hits().len();
        match action {
            Action::Up => self.search_selected = self.search_selected.saturating_sub(1),
            Action::Down if self.search_selected + 1 < hit_count => self.search_selected += 1,
            Action::Submit => {
                let id = state
                    .search()
                    .hits()
                    .get(self.search_selected)
                    .map(|hit| hit.conversation_id.to_string());
                if let Some(id) = id {
                    state.select_conversation(&id);
                    self.after_switch(state);
                }
            }
            action => {
                if self.search.handle_action(&action, width.min(SIDEBAR_WIDTH)) {
                    state.set_search_query(self.search.content());
                    self.search_selected = 0;
                }
            }
        }
        Outcome::Continue
    }

    fn handle_composer_action<S: KeyValueStore>(
        &mut self,
        action: Action,
        state: &mut AppState<S>,
        width: u16,
    ) -> Outcome {
        match action {
            Action::Submit => self.submit(state),
            Action::Up => {
                self.scroll = self.scroll.saturating_add(1);
                Outcome::Continue
            }
            Action::Down => {
                self.scroll = self.scroll.saturating_sub(1);
                Outcome::Continue
            }
            action => {
                let box_width = width.saturating_sub(SIDEBAR_WIDTH);
                self.composer.handle_action(&action, box_width);
                Outcome::Continue
            }
        }
    }

    fn submit<S: KeyValueStore>(&mut self, state: &mut AppState<S>) -> Outcome {
        let content = self.composer.content().to_string();

        if content.trim_start().starts_with('/') {
            self.composer.clear();
            if let Some(result) = execute_command(&content, state) {
                return self.apply_command(result, state);
            }
            return Outcome::Continue;
        }

        let mut input = UserInput::text(content);
        if let Some(image) = self.attachment.clone() {
            input = input.with_image(image);
        }

        match state.begin_exchange(input) {
            Ok(pending) => {
                self.composer.clear();
                self.search.clear();
                self.attachment = None;
                self.notice = None;
                self.scroll = 0;
                Outcome::Start(pending)
            }
            Err(Error::EmptyInput) => Outcome::Continue,
            Err(Error::ExchangeInFlight) => {
                self.notice = Some("Wait for the reply to finish, or press Esc to stop it.".into());
                Outcome::Continue
            }
            Err(e) => {
                self.notice = Some(e.to_string());
                Outcome::Continue
            }
        }
    }

    fn apply_command<S: KeyValueStore>(
        &mut self,
        result: CommandResult,
        state: &mut AppState<S>,
    ) -> Outcome {
        match result {
            CommandResult::Message(msg) => {
                self.notice = Some(msg);
                self.sync_sidebar(state);
                self.scroll = 0;
            }
            CommandResult::Search => {
                self.search.set_content(state.search_query());
                self.search_selected = 0;
                self.notice = None;
                if state.view() == ViewMode::Search {
                    self.set_focus(Focus::Search);
                }
            }
            CommandResult::Attach(image) => {
                self.notice = Some(format!("Attached {} ({})", image.name, image.mime_type));
                self.attachment = Some(image);
            }
            CommandResult::Detach => {
                self.attachment = None;
                self.notice = Some("Attachment removed.".into());
            }
            CommandResult::LoggedOut => {
                self.login.clear();
                self.login_error = None;
            }
            CommandResult::Exit => return Outcome::Quit,
            CommandResult::Unknown(cmd) => {
                self.notice = Some(format!(
                    "Unknown command: /{}\nType /help for available commands.",
                    cmd
                ));
            }
        }
        Outcome::Continue
    }

    /// Esc while idle: close the notice, then the search, then the banner
    fn back<S: KeyValueStore>(&mut self, state: &mut AppState<S>) {
        if self.notice.is_some() {
            self.notice = None;
        } else if state.view() == ViewMode::Search {
            self.search.clear();
            state.set_search_query("");
            self.set_focus(Focus::Composer);
        } else {
            state.dismiss_error();
        }
    }

    /// Reset view state after the active conversation changed
    fn after_switch<S: KeyValueStore>(&mut self, state: &AppState<S>) {
        self.sync_sidebar(state);
        self.notice = None;
        self.scroll = 0;
        self.set_focus(Focus::Composer);
    }

    /// Render the UI
    pub fn render<S: KeyValueStore>(&mut self, frame: &mut Frame, state: &AppState<S>) {
        let theme = Theme::for_dark_mode(state.theme() == ThemeMode::Dark);
        let area = frame.area();
        frame.render_widget(Block::default().style(theme.base_style()), area);

        if !state.is_logged_in() {
            LoginScreen::new(&self.login, &theme)
                .assistant_name(ASSISTANT_NAME)
                .error(self.login_error.as_deref())
                .render(area, frame.buffer_mut());
            return;
        }

        let [sidebar, main] =
            Layout::horizontal([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(1)]).areas(area);
        self.render_sidebar(frame, sidebar, state, &theme);

        let banner_height = if state.error_banner().is_some() { 1 } else { 0 };
        let [banner, panel, status, composer] = Layout::vertical([
            Constraint::Length(banner_height),
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(3),
        ])
        .areas(main);

        if let Some(message) = state.error_banner() {
            let line = Line::from(vec![
                Span::styled(format!(" {} ", message), theme.error_style()),
                Span::styled("(Esc to dismiss)", theme.dim_style()),
            ]);
            frame.render_widget(Paragraph::new(line), banner);
        }

        if let Some(notice) = &self.notice {
            let block = Block::default()
                .borders(Borders::ALL)
                .border_style(theme.border_style())
                .title(" masry ")
                .title_style(theme.dim_style());
            let text = Paragraph::new(notice.as_str())
                .style(theme.base_style())
                .wrap(Wrap { trim: false })
                .block(block);
            frame.render_widget(text, panel);
        } else if state.view() == ViewMode::Search {
            self.render_search(frame, panel, state, &theme);
        } else {
            self.render_transcript(frame, panel, state, &theme);
        }

        self.render_status(frame, status, state, &theme);

        let title = self.composer_title();
        self.composer.set_title(title);
        self.composer.render(composer, frame.buffer_mut(), &theme);
    }

    fn render_sidebar<S: KeyValueStore>(
        &mut self,
        frame: &mut Frame,
        area: Rect,
        state: &AppState<S>,
        theme: &Theme,
    ) {
        let [search, list] =
            Layout::vertical([Constraint::Length(3), Constraint::Min(1)]).areas(area);
        self.search.render(search, frame.buffer_mut(), theme);

        let active = state.active_id();
        let items: Vec<ConversationItem> = state
            .conversations()
            .iter()
            .map(|c| ConversationItem {
                title: c.title.clone(),
                date: format_date(c.created_at),
                is_active: c.id == active,
            })
            .collect();
        let widget = ConversationList::new(&items, theme).focused(self.focus == Focus::Sidebar);
        frame.render_stateful_widget(widget, list, &mut self.sidebar);
    }

    fn render_search<S: KeyValueStore>(
        &mut self,
        frame: &mut Frame,
        area: Rect,
        state: &AppState<S>,
        theme: &Theme,
    ) {
        let view = search_view(state.search_query(), state.search());
        let selected = match &view {
            SearchView::Results { items, .. } if !items.is_empty() => {
                self.search_selected = self.search_selected.min(items.len() - 1);
                Some(self.search_selected)
            }
            _ => None,
        };
        frame.render_widget(SearchPanel::new(&view, theme).selected(selected), area);
    }

    fn render_transcript<S: KeyValueStore>(
        &mut self,
        frame: &mut Frame,
        area: Rect,
        state: &AppState<S>,
        theme: &Theme,
    ) {
        let conversation = state.active_conversation();
        let title = format!(" {} │ {} ", conversation.title, state.model().id);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(theme.border_style())
            .title(title)
            .title_style(theme.accent_bold());
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let messages = transcript(state);
        if messages.is_empty() {
            let welcome = Paragraph::new(vec![
                Line::from(""),
                Line::from(Span::styled(
                    format!("  Hi {}! Ask {} anything.", state.user_name().unwrap_or_default(), ASSISTANT_NAME),
                    theme.accent_bold(),
                )),
                Line::from(""),
                Line::from(Span::styled(
                    "  Replies can use Google Search; sources are listed under the answer.",
                    theme.dim_style(),
                )),
                Line::from(Span::styled(
                    "  Type /help for commands, /attach <path> to send an image.",
                    theme.dim_style(),
                )),
            ]);
            frame.render_widget(welcome, inner);
            return;
        }

        let content_height = message_height(&messages, inner.width as usize);
        self.scroll = self
            .scroll
            .min(content_height.saturating_sub(inner.height as usize));

        let list = MessageList::new(&messages, theme)
            .labels(state.user_name().unwrap_or("You"), ASSISTANT_NAME)
            .scroll(self.scroll)
            .frame(self.tick);
        frame.render_widget(list, inner);
    }

    fn render_status<S: KeyValueStore>(
        &self,
        frame: &mut Frame,
        area: Rect,
        state: &AppState<S>,
        theme: &Theme,
    ) {
        if state.is_loading() {
            let label = format!("{} is typing... (Esc to stop)", ASSISTANT_NAME);
            frame.render_widget(Spinner::new(&label, theme).tick(self.tick), area);
            return;
        }

        let hints = "Tab focus │ Ctrl+N new │ Ctrl+F search │ Ctrl+T theme │ Ctrl+Q quit";
        let line = match state.user_name() {
            Some(name) => Line::from(vec![
                Span::styled(format!("{} │ ", name), theme.dim_style()),
                Span::styled(hints, theme.dim_style()),
            ]),
            None => Line::from(Span::styled(hints, theme.dim_style())),
        };
        frame.render_widget(Paragraph::new(line), area);
    }
}

/// The active conversation as transcript entries
fn transcript<S: KeyValueStore>(state: &AppState<S>) -> Vec<ChatMessage> {
    let conversation = state.active_conversation();
    let streaming = state
        .streaming_target()
        .filter(|t| t.conversation_id == conversation.id);

    let mut messages: Vec<ChatMessage> = conversation
        .messages
        .iter()
        .map(|m| chat_message(m, streaming.is_some_and(|t| t.message_id == m.id)))
        .collect();

    // no fragment yet: show the typing indicator
    if let Some(target) = streaming {
        if !conversation.messages.iter().any(|m| m.id == target.message_id) {
            messages.push(ChatMessage::assistant("").streaming(true));
        }
    }
    messages
}

fn chat_message(message: &Message, is_streaming: bool) -> ChatMessage {
    let base = if message.is_user() {
        ChatMessage::user(message.text.clone())
    } else {
        ChatMessage::assistant(message.text.clone())
    };
    let mut chat = base
        .streaming(is_streaming)
        .error(message.is_failure_notice());
    if let Some(mime) = message.image_mime() {
        chat = chat.with_image(mime);
    }
    if let Some(sources) = &message.sources {
        chat = chat.with_sources(
            sources
                .iter()
                .map(|s| SourceLink {
                    title: s.title.clone(),
                    uri: s.uri.clone(),
                })
                .collect(),
        );
    }
    chat
}

fn search_view(query: &str, outcome: SearchOutcome<'_>) -> SearchView {
    match outcome {
        SearchOutcome::Prompt => SearchView::Prompt,
        SearchOutcome::Results(hits) => SearchView::Results {
            query: query.to_string(),
            items: hits
                .into_iter()
                .map(|hit| SearchResultItem {
                    conversation_title: hit.conversation_title.to_string(),
                    speaker: if hit.message.is_user() {
                        Speaker::User
                    } else {
                        Speaker::Assistant
                    },
                    text: hit.message.text.clone(),
                })
                .collect(),
        },
    }
}

/// Drive an exchange on its own task, forwarding events to the UI loop
fn spawn_exchange(
    pending: PendingExchange,
    transport: Arc<dyn Transport>,
    tx: mpsc::UnboundedSender<(StreamTarget, ExchangeEvent)>,
) {
    let PendingExchange {
        target,
        request,
        cancel,
    } = pending;

    tokio::spawn(async move {
        let mut events = drive(transport, request, cancel);
        while let Some(event) = events.next().await {
            if tx.send((target.clone(), event)).is_err() {
                break;
            }
        }
    });
}

/// Run the TUI application
pub async fn run_tui<S: KeyValueStore>(
    state: &mut AppState<S>,
    transport: Arc<dyn Transport>,
) -> anyhow::Result<()> {
    let mut terminal = TerminalGuard::new()?;
    let (tx, mut rx) = mpsc::unbounded_channel::<(StreamTarget, ExchangeEvent)>();
    let mut ui = TuiState::new(state);
    let mut event_stream = EventStream::new();

    // Tick interval for animations (80ms for smooth spinner)
    let mut tick_interval = tokio::time::interval(Duration::from_millis(80));

    let result = loop {
        terminal.draw(|frame| ui.render(frame, state))?;

        tokio::select! {
            biased;

            // Exchange events first so streamed text shows promptly
            Some((target, event)) = rx.recv() => {
                state.apply(&target, event);
            }

            event = event_stream.next() => {
                match event {
                    Some(Ok(event)) => {
                        let width = crossterm::terminal::size().map(|(w, _)| w).unwrap_or(80);
                        let Some(action) = event_to_action(event) else {
                            continue;
                        };
                        match ui.handle_action(action, state, width) {
                            Outcome::Continue => {}
                            Outcome::Start(pending) => {
                                spawn_exchange(pending, transport.clone(), tx.clone());
                            }
                            Outcome::Quit => break Ok(()),
                        }
                    }
                    Some(Err(e)) => {
                        break Err(anyhow::anyhow!("Event error: {}", e));
                    }
                    None => break Ok(()),
                }
            }

            // Tick for animations (spinner updates)
            _ = tick_interval.tick() => {
                if state.is_loading() {
                    ui.tick = ui.tick.wrapping_add(1);
                }
            }
        }
    };

    state.shutdown();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use masry_core::{MemoryStore, Persistence, Source};

    fn logged_in() -> AppState<MemoryStore> {
        let mut state = AppState::load(Persistence::new(MemoryStore::new()), ThemeMode::Dark);
        state.login("Mona").unwrap();
        state
    }

    fn type_text<S: KeyValueStore>(ui: &mut TuiState, state: &mut AppState<S>, text: &str) {
        for c in text.chars() {
            ui.handle_action(Action::Char(c), state, 120);
        }
    }

    #[test]
    fn test_login_gate() {
        let mut state = AppState::load(Persistence::new(MemoryStore::new()), ThemeMode::Dark);
        let mut ui = TuiState::new(&state);

        ui.handle_action(Action::Submit, &mut state, 120);
        assert!(!state.is_logged_in());
        assert!(ui.login_error.is_some());

        type_text(&mut ui, &mut state, "  Mona ");
        ui.handle_action(Action::Submit, &mut state, 120);
        assert_eq!(state.user_name(), Some("Mona"));
        assert!(ui.login_error.is_none());
        assert_eq!(ui.focus, Focus::Composer);
    }

    #[test]
    fn test_submit_starts_exchange() {
        let mut state = logged_in();
        let mut ui = TuiState::new(&state);
        type_text(&mut ui, &mut state, "Hello");

        match ui.handle_action(Action::Submit, &mut state, 120) {
            Outcome::Start(pending) => {
                assert_eq!(pending.target.conversation_id, state.active_id());
            }
            other => panic!("expected an exchange, got {:?}", other),
        }
        assert!(ui.composer.is_empty());
        assert!(state.is_loading());

        // typing indicator until the first fragment
        let messages = transcript(&state);
        assert_eq!(messages.len(), 2);
        assert!(messages[1].is_streaming && messages[1].text.is_empty());
    }

    #[test]
    fn test_blank_submit_does_nothing() {
        let mut state = logged_in();
        let mut ui = TuiState::new(&state);
        type_text(&mut ui, &mut state, "   ");
        assert!(matches!(
            ui.handle_action(Action::Submit, &mut state, 120),
            Outcome::Continue
        ));
        assert!(!state.is_loading());
    }

    #[test]
    fn test_escape_cancels_then_clears_search() {
        let mut state = logged_in();
        let mut ui = TuiState::new(&state);
        type_text(&mut ui, &mut state, "Hello");
        ui.handle_action(Action::Submit, &mut state, 120);

        ui.handle_action(Action::Escape, &mut state, 120);
        assert!(!state.is_loading());

        ui.handle_action(Action::FocusSearch, &mut state, 120);
        type_text(&mut ui, &mut state, "hel");
        assert_eq!(state.view(), ViewMode::Search);
        ui.handle_action(Action::Escape, &mut state, 120);
        assert_eq!(state.view(), ViewMode::Chat);
        assert_eq!(ui.focus, Focus::Composer);
    }

    #[test]
    fn test_submit_from_search_shows_chat() {
        let mut state = logged_in();
        let mut ui = TuiState::new(&state);
        ui.handle_action(Action::FocusSearch, &mut state, 120);
        type_text(&mut ui, &mut state, "nile");
        assert_eq!(state.view(), ViewMode::Search);

        ui.handle_action(Action::Tab, &mut state, 120);
        assert_eq!(ui.focus, Focus::Composer);
        type_text(&mut ui, &mut state, "How long is the Nile?");
        assert!(matches!(
            ui.handle_action(Action::Submit, &mut state, 120),
            Outcome::Start(_)
        ));
        assert_eq!(state.view(), ViewMode::Chat);
        assert!(ui.search.is_empty());
    }

    #[test]
    fn test_interrupt_quits_when_idle() {
        let mut state = logged_in();
        let mut ui = TuiState::new(&state);
        assert!(matches!(
            ui.handle_action(Action::Interrupt, &mut state, 120),
            Outcome::Quit
        ));
    }

    #[test]
    fn test_search_result_opens_conversation() {
        let mut state = logged_in();
        let mut ui = TuiState::new(&state);
        let first = state.active_id().to_string();
        state
            .begin_exchange(UserInput::text("Pyramids of Giza"))
            .unwrap();
        state.cancel_exchange();
        ui.handle_action(Action::NewConversation, &mut state, 120);
        assert_ne!(state.active_id(), first);

        ui.handle_action(Action::FocusSearch, &mut state, 120);
        type_text(&mut ui, &mut state, "giza");
        ui.handle_action(Action::Submit, &mut state, 120);
        assert_eq!(state.active_id(), first);
        assert_eq!(state.view(), ViewMode::Chat);
    }

    #[test]
    fn test_sidebar_navigation_and_delete() {
        let mut state = logged_in();
        let mut ui = TuiState::new(&state);
        ui.handle_action(Action::NewConversation, &mut state, 120);
        assert_eq!(state.conversations().len(), 2);

        ui.handle_action(Action::BackTab, &mut state, 120);
        assert_eq!(ui.focus, Focus::Search);
        ui.handle_action(Action::BackTab, &mut state, 120);
        assert_eq!(ui.focus, Focus::Sidebar);

        ui.handle_action(Action::Down, &mut state, 120);
        let second = state.conversations()[1].id.clone();
        ui.handle_action(Action::Submit, &mut state, 120);
        assert_eq!(state.active_id(), second);

        ui.handle_action(Action::DeleteConversation, &mut state, 120);
        assert_eq!(state.conversations().len(), 1);
    }

    #[test]
    fn test_slash_commands_show_notice() {
        let mut state = logged_in();
        let mut ui = TuiState::new(&state);
        type_text(&mut ui, &mut state, "/help");
        ui.handle_action(Action::Submit, &mut state, 120);
        assert!(ui.notice.as_deref().is_some_and(|n| n.contains("/attach")));
        assert!(ui.composer.is_empty());

        ui.handle_action(Action::Escape, &mut state, 120);
        assert!(ui.notice.is_none());

        type_text(&mut ui, &mut state, "/quit");
        assert!(matches!(
            ui.handle_action(Action::Submit, &mut state, 120),
            Outcome::Quit
        ));
    }

    #[test]
    fn test_chat_message_mapping() {
        let mut reply = Message::assistant("msg-assistant-1", "Sunny");
        reply.sources = Some(vec![Source {
            uri: "https://w.example".into(),
            title: "Weather".into(),
        }]);
        let chat = chat_message(&reply, true);
        assert_eq!(chat.speaker, Speaker::Assistant);
        assert!(chat.is_streaming);
        assert_eq!(chat.sources.len(), 1);

        let user = Message::user("look", Some("data:image/png;base64,AAAA".into()));
        assert_eq!(chat_message(&user, false).image.as_deref(), Some("image/png"));
    }
}
