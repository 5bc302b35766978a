//! Application state: the single owner of everything the UI shows

use std::sync::Arc;

use futures::StreamExt;
use masry_ai::{Content, Context, Model, Tool};
use tokio_util::sync::CancellationToken;

use crate::{
    attachment::UserInput,
    error::{Error, Result},
    exchange::{ExchangeEvent, ExchangeRequest, Transport, drive},
    message::{Conversation, Message, Sender, new_assistant_message_id, new_error_message_id},
    persistence::{KeyValueStore, Persistence, ThemeMode},
    persona,
    search::{SearchOutcome, search},
    store::{ConversationStore, StreamTarget},
};

/// Text of the transcript entry recorded when an exchange fails
pub const FAILURE_REPLY: &str = "Sorry, a technical problem stopped me from answering right now. 😟";

/// Banner shown for a failed exchange
pub fn failure_banner(error: &str) -> String {
    format!("Something went wrong: {}. Check your API key.", error)
}

/// Which panel the main area shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    Chat,
    Search,
}

/// An exchange that has been accepted and must now be driven
#[derive(Debug, Clone)]
pub struct PendingExchange {
    pub target: StreamTarget,
    pub request: ExchangeRequest,
    pub cancel: CancellationToken,
}

/// What applying an exchange event did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The event belonged to an exchange that is no longer current
    Ignored,
    /// Reply text grew
    Updated,
    Finished,
    Failed,
    Cancelled,
}

#[derive(Debug)]
struct InFlight {
    target: StreamTarget,
    cancel: CancellationToken,
}

/// Owns the conversation store and session state, and writes every change
/// back through the persistence port.
pub struct AppState<S: KeyValueStore> {
    persistence: Persistence<S>,
    store: ConversationStore,
    view: ViewMode,
    search_query: String,
    theme: ThemeMode,
    user_name: Option<String>,
    loading: bool,
    error_banner: Option<String>,
    exchange: Option<InFlight>,
    model: Model,
    system_prompt: Option<String>,
}

impl<S: KeyValueStore> AppState<S> {
    /// Restore state from `persistence`; `default_theme` applies when none was saved
    pub fn load(persistence: Persistence<S>, default_theme: ThemeMode) -> Self {
        let loaded = persistence.load();
        let theme = loaded.theme.unwrap_or(default_theme);

        let mut state = Self {
            persistence,
            store: ConversationStore::from_conversations(loaded.conversations),
            view: ViewMode::Chat,
            search_query: String::new(),
            theme,
            user_name: loaded.user_name,
            loading: false,
            error_banner: None,
            exchange: None,
            model: Model::default(),
            system_prompt: None,
        };
        state.persistence.save_theme(theme);
        state.persist_conversations();
        state
    }

    pub fn with_model(mut self, model: Model) -> Self {
        self.model = model;
        self
    }

    /// Replace the persona; `{user_name}` in the template is filled in per exchange
    pub fn with_system_prompt(mut self, template: Option<String>) -> Self {
        self.system_prompt = template;
        self
    }

    // Accessors

    pub fn conversations(&self) -> &[Conversation] {
        self.store.conversations()
    }

    pub fn active_conversation(&self) -> &Conversation {
        self.store.active()
    }

    pub fn active_id(&self) -> &str {
        self.store.active_id()
    }

    pub fn view(&self) -> ViewMode {
        self.view
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn theme(&self) -> ThemeMode {
        self.theme
    }

    pub fn user_name(&self) -> Option<&str> {
        self.user_name.as_deref()
    }

    pub fn is_logged_in(&self) -> bool {
        self.user_name.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error_banner(&self) -> Option<&str> {
        self.error_banner.as_deref()
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Target of the exchange currently streaming, if any
    pub fn streaming_target(&self) -> Option<&StreamTarget> {
        self.exchange.as_ref().map(|e| &e.target)
    }

    pub fn persistence(&self) -> &Persistence<S> {
        &self.persistence
    }

    // Session commands

    pub fn login(&mut self, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::EmptyName);
        }
        self.user_name = Some(name.to_string());
        self.persistence.save_user_name(name);
        tracing::info!(user = name, "logged in");
        Ok(())
    }

    /// Forget the user name; conversations stay
    pub fn logout(&mut self) {
        self.cancel_exchange();
        self.user_name = None;
        self.persistence.clear_user_name();
        tracing::info!("logged out");
    }

    pub fn toggle_theme(&mut self) -> ThemeMode {
        self.theme = self.theme.toggled();
        self.persistence.save_theme(self.theme);
        self.theme
    }

    pub fn set_theme(&mut self, theme: ThemeMode) {
        self.theme = theme;
        self.persistence.save_theme(theme);
    }

    pub fn dismiss_error(&mut self) {
        self.error_banner = None;
    }

    /// A non-empty query shows search results, an empty one returns to chat
    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.search_query = query.into();
        self.view = if self.search_query.is_empty() {
            ViewMode::Chat
        } else {
            ViewMode::Search
        };
    }

    pub fn search(&self) -> SearchOutcome<'_> {
        search(self.store.conversations(), &self.search_query)
    }

    // Conversation commands

    pub fn create_conversation(&mut self) -> String {
        self.cancel_exchange();
        let id = self.store.create().id.clone();
        self.view = ViewMode::Chat;
        self.persist_conversations();
        id
    }

    pub fn select_conversation(&mut self, id: &str) -> bool {
        if self.store.active_id() == id {
            self.view = ViewMode::Chat;
            return true;
        }
        if self.store.get(id).is_none() {
            return false;
        }
        self.cancel_exchange();
        self.store.select(id);
        self.view = ViewMode::Chat;
        true
    }

    pub fn delete_conversation(&mut self, id: &str) -> bool {
        if self
            .streaming_target()
            .is_some_and(|t| t.conversation_id == id)
        {
            self.cancel_exchange();
        }
        if !self.store.delete(id) {
            return false;
        }
        self.view = ViewMode::Chat;
        self.persist_conversations();
        true
    }

    // Exchange lifecycle

    /// Record the user's message and prepare the request for the reply
    pub fn begin_exchange(&mut self, input: UserInput) -> Result<PendingExchange> {
        if self.exchange.is_some() {
            return Err(Error::ExchangeInFlight);
        }
        let user_name = self.user_name.clone().ok_or(Error::NotLoggedIn)?;
        let input = input.validated()?;

        let conversation_id = self.store.active_id().to_string();
        let message = Message::user(input.text, input.image.map(|i| i.data_uri));
        self.store.append_message(&conversation_id, message)?;
        self.persist_conversations();

        let mut context = Context::with_system(self.render_system_prompt(&user_name));
        context.add_tool(Tool::GoogleSearch);
        for message in &self.store.active().messages {
            context.push(to_provider_message(message));
        }

        let target = StreamTarget {
            conversation_id,
            message_id: new_assistant_message_id(),
        };
        let cancel = CancellationToken::new();

        self.loading = true;
        self.error_banner = None;
        self.view = ViewMode::Chat;
        self.exchange = Some(InFlight {
            target: target.clone(),
            cancel: cancel.clone(),
        });

        tracing::debug!(
            conversation = %target.conversation_id,
            message = %target.message_id,
            turns = context.messages.len(),
            "exchange started"
        );

        Ok(PendingExchange {
            target,
            request: ExchangeRequest {
                model: self.model.clone(),
                context,
            },
            cancel,
        })
    }

    /// Apply one event of the exchange streaming into `target`
    pub fn apply(&mut self, target: &StreamTarget, event: ExchangeEvent) -> Applied {
        if self.streaming_target() != Some(target) {
            tracing::debug!(message = %target.message_id, "discarding event for stale exchange");
            return Applied::Ignored;
        }

        match event {
            ExchangeEvent::Fragment { text, sources } => {
                if let Err(e) = self
                    .store
                    .append_or_start_assistant_stream(target, &text, sources)
                {
                    tracing::warn!(error = %e, "dropping fragment");
                    return Applied::Ignored;
                }
                self.persist_conversations();
                Applied::Updated
            }
            ExchangeEvent::Failed { message } => {
                tracing::warn!(error = %message, "exchange failed");
                self.store.remove_message(target);
                let reply = Message::assistant(new_error_message_id(), FAILURE_REPLY);
                if let Err(e) = self.store.append_message(&target.conversation_id, reply) {
                    tracing::warn!(error = %e, "could not record failure");
                }
                self.error_banner = Some(failure_banner(&message));
                self.finish_exchange();
                Applied::Failed
            }
            ExchangeEvent::Finished => {
                self.finish_exchange();
                Applied::Finished
            }
            ExchangeEvent::Cancelled => {
                self.finish_exchange();
                Applied::Cancelled
            }
        }
    }

    /// Abort the exchange in flight; whatever already streamed is kept
    pub fn cancel_exchange(&mut self) -> bool {
        let Some(exchange) = self.exchange.take() else {
            return false;
        };
        tracing::debug!(message = %exchange.target.message_id, "cancelling exchange");
        exchange.cancel.cancel();
        self.loading = false;
        self.persist_conversations();
        true
    }

    /// Run a whole exchange inline, reporting every event to `on_event`
    pub async fn submit(
        &mut self,
        transport: Arc<dyn Transport>,
        input: UserInput,
        mut on_event: impl FnMut(&ExchangeEvent),
    ) -> Result<Applied> {
        let pending = self.begin_exchange(input)?;
        let mut events = drive(transport, pending.request, pending.cancel);
        let mut outcome = Applied::Ignored;

        while let Some(event) = events.next().await {
            on_event(&event);
            outcome = self.apply(&pending.target, event);
        }
        Ok(outcome)
    }

    /// Stop any exchange before the state is dropped
    pub fn shutdown(&mut self) {
        self.cancel_exchange();
    }

    fn finish_exchange(&mut self) {
        self.exchange = None;
        self.loading = false;
        self.persist_conversations();
    }

    fn persist_conversations(&mut self) {
        self.persistence
            .save_conversations(self.store.conversations());
    }

    fn render_system_prompt(&self, user_name: &str) -> String {
        match &self.system_prompt {
            Some(template) => template.replace("{user_name}", user_name),
            None => persona::system_instruction(user_name),
        }
    }
}

impl<S: KeyValueStore> Drop for AppState<S> {
    fn drop(&mut self) {
        if let Some(exchange) = self.exchange.take() {
            exchange.cancel.cancel();
        }
    }
}

fn to_provider_message(message: &Message) -> masry_ai::Message {
    match message.sender {
        Sender::User => {
            let mut content = Vec::new();
            if let Some(image) = message
                .image
                .as_deref()
                .and_then(Content::image_from_data_uri)
            {
                content.push(image);
            }
            if !message.text.is_empty() {
                content.push(Content::text(message.text.clone()));
            }
            masry_ai::Message::User { content }
        }
        Sender::Assistant => masry_ai::Message::assistant(message.text.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachment::ImageAttachment;
    use crate::exchange::tests::MockTransport;
    use crate::message::{PLACEHOLDER_TITLE, Source};
    use crate::persistence::{KEY_CONVERSATIONS, MemoryStore};

    fn logged_in() -> AppState<MemoryStore> {
        let mut state = AppState::load(Persistence::new(MemoryStore::new()), ThemeMode::Dark);
        state.login("Nour").unwrap();
        state
    }

    fn stored(state: &AppState<MemoryStore>) -> Vec<Conversation> {
        let raw = state.persistence().store().get(KEY_CONVERSATIONS).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        serde_json::from_value(value["conversations"].clone()).unwrap()
    }

    #[test]
    fn test_fresh_start() {
        let state = AppState::load(Persistence::new(MemoryStore::new()), ThemeMode::Light);
        assert_eq!(state.conversations().len(), 1);
        assert_eq!(state.active_conversation().title, PLACEHOLDER_TITLE);
        assert_eq!(state.active_id(), state.conversations()[0].id);
        assert_eq!(state.theme(), ThemeMode::Light);
        assert!(!state.is_logged_in());
        assert_eq!(state.view(), ViewMode::Chat);
    }

    #[test]
    fn test_load_existing_activates_first() {
        let mut store = MemoryStore::new();
        store
            .set(
                KEY_CONVERSATIONS,
                r#"[{"id":"a","title":"A","messages":[]},{"id":"b","title":"B","messages":[]}]"#,
            )
            .unwrap();
        let state = AppState::load(Persistence::new(store), ThemeMode::Dark);
        assert_eq!(state.active_id(), "a");
        let ids: Vec<_> = state.conversations().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_login_rejects_blank_names() {
        let mut state = AppState::load(Persistence::new(MemoryStore::new()), ThemeMode::Dark);
        assert!(matches!(state.login("   "), Err(Error::EmptyName)));
        state.login("  Nour ").unwrap();
        assert_eq!(state.user_name(), Some("Nour"));
    }

    #[test]
    fn test_logout_keeps_conversations() {
        let mut state = logged_in();
        let id = state.create_conversation();
        state.logout();
        assert!(!state.is_logged_in());
        assert!(state.conversations().iter().any(|c| c.id == id));
        assert!(state.persistence().store().get("userName").is_none());
    }

    #[test]
    fn test_toggle_theme_persists() {
        let mut state = logged_in();
        assert_eq!(state.toggle_theme(), ThemeMode::Light);
        assert_eq!(
            state.persistence().store().get("theme").as_deref(),
            Some("light")
        );
    }

    #[test]
    fn test_search_query_switches_view() {
        let mut state = logged_in();
        state.set_search_query("giza");
        assert_eq!(state.view(), ViewMode::Search);
        assert!(matches!(state.search(), SearchOutcome::Results(_)));

        state.set_search_query("");
        assert_eq!(state.view(), ViewMode::Chat);
        assert_eq!(state.search(), SearchOutcome::Prompt);
    }

    #[test]
    fn test_conversation_commands_return_to_chat_and_persist() {
        let mut state = logged_in();
        state.set_search_query("x");
        let id = state.create_conversation();
        assert_eq!(state.view(), ViewMode::Chat);
        assert_eq!(stored(&state)[0].id, id);

        state.set_search_query("x");
        let other = state.conversations()[1].id.clone();
        assert!(state.select_conversation(&other));
        assert_eq!(state.view(), ViewMode::Chat);
        assert_eq!(state.active_id(), other);

        assert!(!state.select_conversation("missing"));
        assert!(!state.delete_conversation("missing"));

        assert!(state.delete_conversation(&other));
        assert_eq!(state.active_id(), id);
        assert_eq!(stored(&state).len(), 1);
    }

    #[test]
    fn test_begin_exchange_builds_request() {
        let mut state = logged_in();
        let image = ImageAttachment::from_bytes("p.png", "image/png", b"png");
        let pending = state
            .begin_exchange(UserInput::text("What is in this picture?").with_image(image))
            .unwrap();

        assert!(state.is_loading());
        assert_eq!(pending.target.conversation_id, state.active_id());
        assert!(pending.target.message_id.starts_with("msg-assistant-"));

        let context = &pending.request.context;
        assert!(context.system_prompt.as_deref().unwrap().contains("Nour"));
        assert_eq!(context.tools, vec![Tool::GoogleSearch]);
        assert_eq!(context.messages.len(), 1);
        assert_eq!(
            context.messages[0].content(),
            &[
                Content::image("cG5n", "image/png"),
                Content::text("What is in this picture?")
            ]
        );
        assert_eq!(state.active_conversation().title, "What is in this picture?");
    }

    #[test]
    fn test_begin_exchange_returns_to_chat() {
        let mut state = logged_in();
        state.set_search_query("pyramids");
        assert_eq!(state.view(), ViewMode::Search);

        state.begin_exchange(UserInput::text("Tell me more")).unwrap();
        assert_eq!(state.view(), ViewMode::Chat);
    }

    #[test]
    fn test_second_submission_rejected_while_streaming() {
        let mut state = logged_in();
        state.begin_exchange(UserInput::text("one")).unwrap();
        assert!(matches!(
            state.begin_exchange(UserInput::text("two")),
            Err(Error::ExchangeInFlight)
        ));
        assert_eq!(state.active_conversation().messages.len(), 1);
    }

    #[test]
    fn test_empty_input_and_logged_out_rejected() {
        let mut state = logged_in();
        assert!(matches!(
            state.begin_exchange(UserInput::text("  ")),
            Err(Error::EmptyInput)
        ));
        state.logout();
        assert!(matches!(
            state.begin_exchange(UserInput::text("hi")),
            Err(Error::NotLoggedIn)
        ));
        assert!(!state.is_loading());
    }

    #[tokio::test]
    async fn test_submit_streams_reply() {
        let mut state = logged_in();
        let transport = Arc::new(MockTransport::scripted(vec![
            ExchangeEvent::Fragment {
                text: "It's ".into(),
                sources: None,
            },
            ExchangeEvent::Fragment {
                text: "sunny.".into(),
                sources: Some(vec![Source {
                    uri: "https://w.example".into(),
                    title: "Weather".into(),
                }]),
            },
            ExchangeEvent::Finished,
        ]));

        let mut seen = 0;
        let outcome = state
            .submit(transport.clone(), UserInput::text("Weather in Cairo?"), |_| seen += 1)
            .await
            .unwrap();

        assert_eq!(outcome, Applied::Finished);
        assert_eq!(seen, 3);
        assert!(!state.is_loading());

        let messages = &state.active_conversation().messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].text, "It's sunny.");
        assert_eq!(messages[1].sources.as_ref().map(Vec::len), Some(1));
        assert_eq!(stored(&state)[0].messages.len(), 2);
    }

    #[tokio::test]
    async fn test_history_is_sent_with_next_exchange() {
        let mut state = logged_in();
        let transport = Arc::new(MockTransport::replying(&["Hi Nour!"]));
        state
            .submit(transport.clone(), UserInput::text("Hello"), |_| {})
            .await
            .unwrap();
        state
            .submit(transport.clone(), UserInput::text("How are you?"), |_| {})
            .await
            .unwrap();

        let requests = transport.requests.lock().unwrap();
        let roles: Vec<_> = requests[1]
            .context
            .messages
            .iter()
            .map(|m| m.role())
            .collect();
        assert_eq!(roles, vec!["user", "assistant", "user"]);
        assert_eq!(requests[1].context.messages[1].text(), "Hi Nour!");
    }

    #[tokio::test]
    async fn test_failure_mid_exchange_leaves_one_error_message() {
        let mut state = logged_in();
        let transport = Arc::new(MockTransport::scripted(vec![
            ExchangeEvent::Fragment {
                text: "Half an ans".into(),
                sources: None,
            },
            ExchangeEvent::Failed {
                message: "connection reset".into(),
            },
        ]));

        let outcome = state
            .submit(transport, UserInput::text("Tell me a story"), |_| {})
            .await
            .unwrap();

        assert_eq!(outcome, Applied::Failed);
        assert!(!state.is_loading());
        assert_eq!(
            state.error_banner(),
            Some("Something went wrong: connection reset. Check your API key.")
        );

        let messages = &state.active_conversation().messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].sender, Sender::User);
        assert_eq!(messages[1].sender, Sender::Assistant);
        assert_eq!(messages[1].text, FAILURE_REPLY);
        assert!(messages[1].id.starts_with("msg-error-"));
    }

    #[tokio::test]
    async fn test_start_failure_is_reported_in_transcript() {
        let mut state = logged_in();
        let transport = Arc::new(MockTransport::failing_to_start("missing key"));
        let outcome = state
            .submit(transport, UserInput::text("hi"), |_| {})
            .await
            .unwrap();
        assert_eq!(outcome, Applied::Failed);
        assert_eq!(state.active_conversation().messages.len(), 2);

        // the banner clears on the next submission
        let transport = Arc::new(MockTransport::replying(&["ok"]));
        state
            .submit(transport, UserInput::text("again"), |_| {})
            .await
            .unwrap();
        assert_eq!(state.error_banner(), None);
    }

    #[test]
    fn test_switching_conversation_cancels_and_discards_late_fragments() {
        let mut state = logged_in();
        let pending = state.begin_exchange(UserInput::text("first")).unwrap();
        let applied = state.apply(
            &pending.target,
            ExchangeEvent::Fragment {
                text: "early".into(),
                sources: None,
            },
        );
        assert_eq!(applied, Applied::Updated);

        state.create_conversation();
        assert!(pending.cancel.is_cancelled());
        assert!(!state.is_loading());

        let applied = state.apply(
            &pending.target,
            ExchangeEvent::Fragment {
                text: " late".into(),
                sources: None,
            },
        );
        assert_eq!(applied, Applied::Ignored);

        let original = state.conversations()[1].clone();
        assert_eq!(original.messages.len(), 2);
        assert_eq!(original.messages[1].text, "early");
    }

    #[test]
    fn test_deleting_streaming_conversation_cancels() {
        let mut state = logged_in();
        let pending = state.begin_exchange(UserInput::text("first")).unwrap();
        let id = pending.target.conversation_id.clone();

        assert!(state.delete_conversation(&id));
        assert!(pending.cancel.is_cancelled());
        assert_eq!(
            state.apply(&pending.target, ExchangeEvent::Finished),
            Applied::Ignored
        );
        assert_eq!(state.conversations().len(), 1);
        assert_ne!(state.active_id(), id);
    }

    #[test]
    fn test_reselecting_active_conversation_keeps_exchange() {
        let mut state = logged_in();
        let pending = state.begin_exchange(UserInput::text("first")).unwrap();
        let id = state.active_id().to_string();
        assert!(state.select_conversation(&id));
        assert!(!pending.cancel.is_cancelled());
        assert!(state.is_loading());
    }

    #[test]
    fn test_drop_cancels_exchange() {
        let mut state = logged_in();
        let pending = state.begin_exchange(UserInput::text("first")).unwrap();
        drop(state);
        assert!(pending.cancel.is_cancelled());
    }

    #[test]
    fn test_custom_system_prompt_template() {
        let mut state = logged_in().with_system_prompt(Some("Be brief with {user_name}.".into()));
        let pending = state.begin_exchange(UserInput::text("hi")).unwrap();
        assert_eq!(
            pending.request.context.system_prompt.as_deref(),
            Some("Be brief with Nour.")
        );
    }
}
