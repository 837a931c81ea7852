//! Chat command surface: `new`, `search`, `clear`, `restart`, `list_keys`, `help`.
//!
//! The Telegram adapter hands over the raw `/command` text; everything the user sees comes
//! back as a plain-text or post reply.

use std::sync::Arc;

use crate::{
    domain::UserId,
    errors::Error,
    formatting::PostMessage,
    messaging::{
        port::MessagingPort,
        types::{CommandRequest, Reply},
    },
    ports::ProcessSupervisor,
    posts::PostService,
    security::is_admin,
    Result,
};

pub const BOT_DESCRIPTION: &str = "Finding good food Reddit posts. Posts a new picture every hour.";

#[derive(Clone, Copy, Debug)]
pub struct CommandInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub usage: Option<&'static str>,
    pub admin_only: bool,
}

pub const COMMANDS: &[CommandInfo] = &[
    CommandInfo {
        name: "new",
        description: "Post a new food picture into the channel",
        usage: None,
        admin_only: false,
    },
    CommandInfo {
        name: "search",
        description: "Searches for a new food picture to post into the channel",
        usage: Some("something I want to search separated by spaces"),
        admin_only: false,
    },
    CommandInfo {
        name: "clear",
        description: "Clears the stored list of previous posts",
        usage: None,
        admin_only: true,
    },
    CommandInfo {
        name: "restart",
        description: "Restarts the bot on request",
        usage: None,
        admin_only: true,
    },
    CommandInfo {
        name: "list_keys",
        description: "Print all stored keys to log",
        usage: None,
        admin_only: true,
    },
    CommandInfo {
        name: "help",
        description: "Show the available commands",
        usage: None,
        admin_only: false,
    },
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BotCommand {
    New,
    Search(String),
    Clear,
    Restart,
    ListKeys,
    Help,
    Unknown(String),
}

impl BotCommand {
    /// Parse `/cmd@botname arg1 ...`. Returns `None` for text that is not a command.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if !text.starts_with('/') {
            return None;
        }

        let mut parts = text.splitn(2, char::is_whitespace);
        let first = parts.next().unwrap_or("");
        let rest = parts.next().unwrap_or("");

        let name = first
            .trim_start_matches('/')
            .split('@')
            .next()
            .unwrap_or("")
            .to_lowercase();

        Some(match name.as_str() {
            "new" => BotCommand::New,
            "search" => BotCommand::Search(join_terms(rest)),
            "clear" => BotCommand::Clear,
            "restart" => BotCommand::Restart,
            "list_keys" => BotCommand::ListKeys,
            "help" | "start" => BotCommand::Help,
            _ => BotCommand::Unknown(name),
        })
    }
}

/// Collapse whitespace runs so `search  deep   dish` searches for `deep dish`.
fn join_terms(rest: &str) -> String {
    rest.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn help_text() -> String {
    let mut lines = vec![BOT_DESCRIPTION.to_string(), String::new()];
    for info in COMMANDS {
        let usage = info.usage.map(|u| format!(" <{u}>")).unwrap_or_default();
        let admin = if info.admin_only { " (admin only)" } else { "" };
        lines.push(format!("/{}{usage} - {}{admin}", info.name, info.description));
    }
    lines.join("\n")
}

pub struct CommandHandler {
    service: Arc<PostService>,
    messenger: Arc<dyn MessagingPort>,
    supervisor: Arc<dyn ProcessSupervisor>,
    admin_users: Vec<i64>,
}

impl CommandHandler {
    pub fn new(
        service: Arc<PostService>,
        messenger: Arc<dyn MessagingPort>,
        supervisor: Arc<dyn ProcessSupervisor>,
        admin_users: Vec<i64>,
    ) -> Self {
        Self {
            service,
            messenger,
            supervisor,
            admin_users,
        }
    }

    /// Parse, run, and send the reply (if any) to the invoking channel.
    pub async fn dispatch(&self, req: &CommandRequest) -> Result<()> {
        let Some(cmd) = BotCommand::parse(&req.text) else {
            return Ok(());
        };

        tracing::info!(
            destination = %req.destination,
            user = ?req.user_id.map(|u| u.0),
            username = ?req.username,
            command = ?cmd,
            "command received"
        );

        let Some(reply) = self.handle(req, cmd).await else {
            return Ok(());
        };
        match reply {
            Reply::Post(post) => self.messenger.send_post(req.channel, &post).await,
            Reply::Text(text) => self.messenger.send_text(req.channel, &text).await,
        }
    }

    pub async fn handle(&self, req: &CommandRequest, cmd: BotCommand) -> Option<Reply> {
        match cmd {
            BotCommand::New => Some(self.new_post(req).await),
            BotCommand::Search(terms) => Some(self.search(req, &terms).await),
            BotCommand::Clear => {
                if let Some(denied) = self.admin_guard(req.user_id, req.is_group, true) {
                    return Some(denied);
                }
                Some(self.clear().await)
            }
            BotCommand::Restart => {
                if let Some(denied) = self.admin_guard(req.user_id, req.is_group, true) {
                    return Some(denied);
                }
                self.restart().await
            }
            BotCommand::ListKeys => {
                if let Some(denied) = self.admin_guard(req.user_id, req.is_group, false) {
                    return Some(denied);
                }
                Some(self.list_keys().await)
            }
            BotCommand::Help => Some(Reply::text(help_text())),
            BotCommand::Unknown(name) => {
                Some(Reply::text(format!("Unknown command /{name}. Try /help")))
            }
        }
    }

    fn admin_guard(&self, user: Option<UserId>, is_group: bool, group_only: bool) -> Option<Reply> {
        if group_only && !is_group {
            return Some(Reply::text("This command can only be used in a group chat."));
        }
        if !is_admin(user, &self.admin_users) {
            return Some(Reply::text(
                "You must be an administrator to use this command.",
            ));
        }
        None
    }

    async fn new_post(&self, req: &CommandRequest) -> Reply {
        match self.service.fresh_post(req.destination).await {
            Ok(post) => Reply::Post(PostMessage::from(&post)),
            Err(e) => {
                tracing::error!(destination = %req.destination, "new post failed: {e}");
                Reply::text(failure_text(&e))
            }
        }
    }

    async fn search(&self, req: &CommandRequest, terms: &str) -> Reply {
        if terms.is_empty() {
            return Reply::text("Specify at least one term to search for");
        }
        match self.service.search_post(terms, req.destination).await {
            Ok(post) => Reply::Post(PostMessage::from(&post)),
            Err(Error::NoMatch { .. }) => Reply::text(format!(
                "No titles containing {terms} found in defined subreddits"
            )),
            Err(e) => {
                tracing::error!(destination = %req.destination, terms, "search failed: {e}");
                Reply::text(failure_text(&e))
            }
        }
    }

    async fn clear(&self) -> Reply {
        match self.service.store().clear_all().await {
            Ok(()) => Reply::text("Successfully cleared contents"),
            Err(e) => {
                tracing::error!("clear failed: {e}");
                Reply::text("Error occurred when clearing stored posts")
            }
        }
    }

    /// Nothing to say on success: the supervisor kills this process.
    async fn restart(&self) -> Option<Reply> {
        match self.supervisor.restart().await {
            Ok(true) => None,
            Ok(false) => Some(Reply::text(
                "Error when attempting to restart bot. Please restart manually.",
            )),
            Err(e) => {
                tracing::error!("restart failed: {e}");
                Some(Reply::text(
                    "Error when attempting to restart bot. Please restart manually.",
                ))
            }
        }
    }

    async fn list_keys(&self) -> Reply {
        match self.service.store().list_keys().await {
            Ok(keys) => {
                tracing::info!(count = keys.len(), "stored keys");
                for key in &keys {
                    tracing::info!(key = %key, "stored key");
                }
                Reply::text("Successfully printed stored keys to log")
            }
            Err(e) => {
                tracing::error!("listing keys failed: {e}");
                Reply::text("Error occurred when printing stored keys to log")
            }
        }
    }
}

fn failure_text(e: &Error) -> String {
    match e {
        Error::SearchExhausted { .. } => {
            "Couldn't find a food post that hasn't been shown yet. Try again later.".to_string()
        }
        Error::StoreUnavailable(_) => "Error occurred when accessing stored posts".to_string(),
        _ => "Something went wrong while finding a post. Try again later.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;

    use super::*;
    use crate::{
        domain::{ChannelId, DestinationId, Scope},
        messaging::testing::FakeMessenger,
        ports::RecordStore,
        selector::{
            tests::{cands, FakeSource},
            SelectionPolicy, Selector,
        },
        store::MemoryRecordStore,
        subreddits::Subreddits,
    };

    #[derive(Default)]
    struct FakeSupervisor {
        known: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ProcessSupervisor for FakeSupervisor {
        async fn restart(&self) -> Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.known)
        }
    }

    struct Harness {
        handler: CommandHandler,
        messenger: Arc<FakeMessenger>,
        store: Arc<MemoryRecordStore>,
        supervisor: Arc<FakeSupervisor>,
    }

    fn harness(source: FakeSource, supervisor: FakeSupervisor) -> Harness {
        let store = Arc::new(MemoryRecordStore::new());
        let selector = Selector::new(
            Arc::new(source),
            store.clone(),
            Subreddits::fixed(["food"]),
            SelectionPolicy::default(),
        );
        let service = Arc::new(PostService::new(selector, store.clone()));
        let messenger = Arc::new(FakeMessenger::default());
        let supervisor = Arc::new(supervisor);
        let handler = CommandHandler::new(
            service,
            messenger.clone(),
            supervisor.clone(),
            vec![100],
        );
        Harness {
            handler,
            messenger,
            store,
            supervisor,
        }
    }

    fn request(text: &str, user: i64, is_group: bool) -> CommandRequest {
        CommandRequest {
            destination: DestinationId(-42),
            channel: ChannelId(-42),
            user_id: Some(UserId(user)),
            username: None,
            is_group,
            text: text.to_string(),
        }
    }

    #[test]
    fn parses_commands() {
        assert_eq!(BotCommand::parse("/new"), Some(BotCommand::New));
        assert_eq!(BotCommand::parse("/NEW@food_bot"), Some(BotCommand::New));
        assert_eq!(
            BotCommand::parse("/search  deep   dish pizza "),
            Some(BotCommand::Search("deep dish pizza".to_string()))
        );
        assert_eq!(
            BotCommand::parse("/search"),
            Some(BotCommand::Search(String::new()))
        );
        assert_eq!(BotCommand::parse("/list_keys"), Some(BotCommand::ListKeys));
        assert_eq!(BotCommand::parse("/start"), Some(BotCommand::Help));
        assert_eq!(
            BotCommand::parse("/pizza"),
            Some(BotCommand::Unknown("pizza".to_string()))
        );
        assert_eq!(BotCommand::parse("hello"), None);
    }

    #[test]
    fn help_lists_every_command() {
        let help = help_text();
        for info in COMMANDS {
            assert!(help.contains(&format!("/{}", info.name)));
        }
        assert!(help.contains("/clear - Clears the stored list of previous posts (admin only)"));
    }

    #[tokio::test]
    async fn new_sends_a_post_and_records_it() {
        let h = harness(
            FakeSource {
                hot: cands("h", 1),
                ..Default::default()
            },
            FakeSupervisor::default(),
        );
        h.handler.dispatch(&request("/new", 1, true)).await.unwrap();
        assert_eq!(
            h.messenger.posts(),
            vec![(ChannelId(-42), "post h0".to_string())]
        );
        assert!(h.store.contains("h0", Scope::Destination(DestinationId(-42))).await);
    }

    #[tokio::test]
    async fn search_without_terms_asks_for_one() {
        let h = harness(FakeSource::default(), FakeSupervisor::default());
        h.handler
            .dispatch(&request("/search", 1, true))
            .await
            .unwrap();
        assert_eq!(
            h.messenger.texts(),
            vec!["Specify at least one term to search for"]
        );
    }

    #[tokio::test]
    async fn search_with_no_results_says_nothing_found() {
        let h = harness(FakeSource::default(), FakeSupervisor::default());
        h.handler
            .dispatch(&request("/search pizza", 1, true))
            .await
            .unwrap();
        assert_eq!(
            h.messenger.texts(),
            vec!["No titles containing pizza found in defined subreddits"]
        );
    }

    #[tokio::test]
    async fn search_hit_is_posted() {
        let mut search = HashMap::new();
        search.insert("all", cands("s", 2));
        let h = harness(
            FakeSource {
                search,
                ..Default::default()
            },
            FakeSupervisor::default(),
        );
        h.handler
            .dispatch(&request("/search pizza", 1, true))
            .await
            .unwrap();
        assert_eq!(h.messenger.posts()[0].1, "post s0");
    }

    #[tokio::test]
    async fn exhausted_new_reports_plain_text() {
        let h = harness(FakeSource::default(), FakeSupervisor::default());
        h.handler.dispatch(&request("/new", 1, true)).await.unwrap();
        assert_eq!(h.messenger.posts().len(), 0);
        assert_eq!(h.messenger.texts().len(), 1);
    }

    #[tokio::test]
    async fn clear_requires_admin_in_a_group() {
        let h = harness(FakeSource::default(), FakeSupervisor::default());
        h.store.record("x", Scope::All).await.unwrap();

        h.handler
            .dispatch(&request("/clear", 1, true))
            .await
            .unwrap();
        h.handler
            .dispatch(&request("/clear", 100, false))
            .await
            .unwrap();
        assert!(h.store.is_used("x").await.unwrap());

        h.handler
            .dispatch(&request("/clear", 100, true))
            .await
            .unwrap();
        assert!(!h.store.is_used("x").await.unwrap());
        assert_eq!(
            h.messenger.texts(),
            vec![
                "You must be an administrator to use this command.",
                "This command can only be used in a group chat.",
                "Successfully cleared contents",
            ]
        );
    }

    #[tokio::test]
    async fn restart_reports_failure_when_supervisor_does_not_know_us() {
        let h = harness(FakeSource::default(), FakeSupervisor::default());
        h.handler
            .dispatch(&request("/restart", 100, true))
            .await
            .unwrap();
        assert_eq!(h.supervisor.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            h.messenger.texts(),
            vec!["Error when attempting to restart bot. Please restart manually."]
        );
    }

    #[tokio::test]
    async fn successful_restart_is_silent() {
        let h = harness(
            FakeSource::default(),
            FakeSupervisor {
                known: true,
                ..Default::default()
            },
        );
        h.handler
            .dispatch(&request("/restart", 100, true))
            .await
            .unwrap();
        assert!(h.messenger.sends().is_empty());
    }

    #[tokio::test]
    async fn list_keys_works_in_private_chats_for_admins() {
        let h = harness(FakeSource::default(), FakeSupervisor::default());
        h.handler
            .dispatch(&request("/list_keys", 100, false))
            .await
            .unwrap();
        assert_eq!(
            h.messenger.texts(),
            vec!["Successfully printed stored keys to log"]
        );
    }

    #[tokio::test]
    async fn plain_text_is_ignored() {
        let h = harness(FakeSource::default(), FakeSupervisor::default());
        h.handler
            .dispatch(&request("just chatting", 1, true))
            .await
            .unwrap();
        assert!(h.messenger.sends().is_empty());
    }
}
