//! Bot engine: turns inbound platform events into state changes and replies.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::ai::{self, CompletionProvider, Prompt};
use crate::bot::access::{self, Access, Permission};
use crate::bot::commands::Command;
use crate::bot::format::escape;
use crate::bot::messenger::{Messenger, Reply};
use crate::bot::profile::{ProfileInput, ProfileState};
use crate::bot::rate_limit;
use crate::bot::scheduler::JobScheduler;
use crate::bot::stats::DailyStats;
use crate::bot::store::{BroadcastRecord, FeedbackEntry, Store, StoreError};
use crate::bot::user::{Activity, EARLY_ADOPTER_LIMIT, Pending, Role, UserRecord};
use crate::config::Config;

const ERROR_NOTICE: &str =
    "❌ An error occurred while processing your request. The developers have been notified.";
const RATE_LIMITED: &str = "⚠️ You're sending messages too fast! Please slow down.";
const AI_DISABLED: &str = "⚠️ AI features are currently disabled. Please contact the bot administrator.";
const AI_FAILED: &str = "⚠️ Sorry, I encountered an error processing your request. Please try again later.";
const NOT_IN_CHAT_MODE: &str =
    "🤖 I'm not in chat mode. Type /chat to start a conversation with me!\n\nOr use /help to see what else I can do!";
const UNKNOWN_COMMAND: &str = "❓ Unknown command. Use /help to see what I can do.";

/// Who the bot is on the platform, resolved once at startup.
#[derive(Debug, Clone, Default)]
pub struct BotIdentity {
    pub username: Option<String>,
    pub first_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatKind {
    Private,
    Group,
    Channel,
}

/// The platform account behind an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
}

impl Sender {
    pub fn full_name(&self) -> String {
        match &self.last_name {
            Some(last) => format!("{} {}", self.first_name, last).trim().to_string(),
            None => self.first_name.trim().to_string(),
        }
    }

    /// Username, else full name.
    pub fn display_name(&self) -> String {
        self.username.clone().unwrap_or_else(|| self.full_name())
    }

    /// Name written to the chat transcript.
    pub fn log_name(&self) -> String {
        self.username.clone().unwrap_or_else(|| format!("user_{}", self.id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Text(String),
    /// Photo, video or document.
    Media,
    Sticker,
    Voice,
}

#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub chat_id: i64,
    pub chat_kind: ChatKind,
    pub sender: Sender,
    pub content: Content,
}

/// An inline button press.
#[derive(Debug, Clone)]
pub struct IncomingCallback {
    pub chat_id: i64,
    pub chat_kind: ChatKind,
    /// Message carrying the keyboard, if the platform still has it.
    pub message_id: Option<i64>,
    pub sender: Sender,
    pub data: String,
}

#[derive(Debug)]
pub enum BotError {
    Store(StoreError),
    Send(String),
}

impl fmt::Display for BotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BotError::Store(e) => write!(f, "store error: {e}"),
            BotError::Send(e) => write!(f, "send error: {e}"),
        }
    }
}

impl std::error::Error for BotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BotError::Store(e) => Some(e),
            BotError::Send(_) => None,
        }
    }
}

impl From<StoreError> for BotError {
    fn from(e: StoreError) -> Self {
        BotError::Store(e)
    }
}

/// Per-event state handed to handlers.
pub(crate) struct Context {
    pub chat_id: i64,
    pub chat_kind: ChatKind,
    pub sender: Sender,
    /// Snapshot taken when the event arrived.
    pub record: UserRecord,
    pub access: Access,
    /// Set for button presses: replies replace this message.
    pub message_id: Option<i64>,
}

impl Context {
    pub fn user_id(&self) -> i64 {
        self.sender.id
    }

    pub fn is_private(&self) -> bool {
        self.chat_kind == ChatKind::Private
    }
}

/// Profile-edit sessions, keyed by `(chat_id, user_id)`. Not persisted.
type Sessions = Mutex<HashMap<(i64, i64), ProfileState>>;

pub struct BotEngine {
    pub(crate) config: Arc<Config>,
    pub(crate) store: Arc<Store>,
    pub(crate) messenger: Arc<dyn Messenger>,
    pub(crate) ai: Option<Arc<dyn CompletionProvider>>,
    pub(crate) scheduler: JobScheduler,
    pub(crate) sessions: Sessions,
    pub(crate) identity: BotIdentity,
    pub(crate) started_at: Instant,
}

impl BotEngine {
    pub fn new(
        config: Arc<Config>,
        store: Arc<Store>,
        messenger: Arc<dyn Messenger>,
        ai: Option<Arc<dyn CompletionProvider>>,
        identity: BotIdentity,
    ) -> Self {
        Self {
            config,
            store,
            scheduler: JobScheduler::new(messenger.clone()),
            messenger,
            ai,
            sessions: Mutex::new(HashMap::new()),
            identity,
            started_at: Instant::now(),
        }
    }

    // ==================== ENTRY POINTS ====================

    /// Handle one inbound message. Never fails: errors are logged and the
    /// user gets a generic notice.
    pub async fn handle_message(&self, msg: IncomingMessage) {
        if msg.chat_kind == ChatKind::Channel {
            return;
        }
        let chat_id = msg.chat_id;
        let user_id = msg.sender.id;
        if let Err(e) = self.process_message(msg).await {
            error!("Error handling message from {user_id} in {chat_id}: {e}");
            self.send_error_notice(chat_id).await;
        }
    }

    /// Handle one inline button press.
    pub async fn handle_callback(&self, callback: IncomingCallback) {
        let chat_id = callback.chat_id;
        let user_id = callback.sender.id;
        if let Err(e) = self.process_callback(callback).await {
            error!("Error handling callback from {user_id} in {chat_id}: {e}");
            self.send_error_notice(chat_id).await;
        }
    }

    /// Start the recurring digest job.
    pub fn spawn_daily_digest(self: &Arc<Self>) -> JoinHandle<()> {
        let engine = self.clone();
        self.scheduler.spawn_daily(
            self.config.daily_digest.clone(),
            self.config.timezone,
            move || {
                let engine = engine.clone();
                async move { engine.send_daily_stats().await }
            },
        )
    }

    /// Send today's statistics to every allow-listed admin.
    pub async fn send_daily_stats(&self) {
        let stats = DailyStats::compute(&self.store.all_users(), Utc::now(), self.config.timezone);
        info!("Sending daily statistics: {:?}", stats);
        self.notify_admins(&stats.render()).await;
    }

    /// Send `message` to every stored user, one at a time.
    ///
    /// A failed recipient is counted and skipped. The outcome is appended to
    /// the broadcast log.
    pub async fn broadcast(&self, admin_id: i64, message: &str) -> BroadcastRecord {
        let users = self.store.all_users();
        let reply = Reply::text(format!("📢 <b>Announcement</b>\n\n{}", escape(message)));
        let mut successful = 0;
        let mut failed = 0;

        info!("Broadcasting from {admin_id} to {} users", users.len());
        for key in users.keys() {
            let result = match key.parse::<i64>() {
                Ok(id) => self.messenger.send(id, &reply).await.map(|_| ()),
                Err(e) => Err(format!("invalid user key '{key}': {e}")),
            };
            match result {
                Ok(()) => successful += 1,
                Err(e) => {
                    warn!("Failed to send broadcast to {key}: {e}");
                    failed += 1;
                }
            }
            tokio::time::sleep(self.config.broadcast_delay).await;
        }

        let record = BroadcastRecord {
            admin_id,
            timestamp: Utc::now(),
            message: message.to_string(),
            total_recipients: users.len(),
            successful,
            failed,
        };
        if let Err(e) = self.store.add_broadcast(record.clone()) {
            error!("Failed to save broadcast record: {e}");
        }
        record
    }

    // ==================== DISPATCH ====================

    async fn process_message(&self, msg: IncomingMessage) -> Result<(), BotError> {
        let now = Utc::now();
        let tz = self.config.timezone;
        let user_id = msg.sender.id;
        let activity = match msg.content {
            Content::Text(_) => Activity::Text,
            Content::Media => Activity::Media,
            Content::Sticker => Activity::Sticker,
            Content::Voice => Activity::Voice,
        };

        let record = self.update_user_at(user_id, now, |u| {
            u.touch(activity, now, tz);
            u.clone()
        })?;

        let Content::Text(text) = msg.content else {
            debug!("Counted {:?} from {user_id}", activity);
            return Ok(());
        };

        let ctx = Context {
            chat_id: msg.chat_id,
            chat_kind: msg.chat_kind,
            access: Access::resolve(user_id, &record, &self.config),
            sender: msg.sender,
            record,
            message_id: None,
        };

        if let Some(command) = Command::parse(&text, self.identity.username.as_deref()) {
            return self.dispatch_command(&ctx, command).await;
        }
        self.dispatch_text(&ctx, &text).await
    }

    async fn dispatch_command(&self, ctx: &Context, command: Command) -> Result<(), BotError> {
        let user_id = ctx.user_id();
        match &command {
            Command::ForOtherBot => return Ok(()),
            Command::Unknown(name) => {
                debug!("Unknown command {name} from {user_id}");
                if ctx.is_private() {
                    self.reply(ctx.chat_id, Reply::text(UNKNOWN_COMMAND)).await?;
                }
                return Ok(());
            }
            _ => {}
        }

        let permission = command.permission();
        if !ctx.access.allows(permission) {
            info!("Denied {} to {user_id}", command.name());
            return self.reply(ctx.chat_id, Reply::text(denial(permission))).await;
        }

        info!("{} ({user_id}) used {}", ctx.sender.display_name(), command.name());
        self.store.log_command(&self.timestamp(), user_id, &command.log_label());
        let now = Utc::now();
        self.update_user(user_id, |u| u.record_command(command.name(), now))?;

        match command {
            Command::Start => self.cmd_start(ctx).await,
            Command::Help => self.cmd_help(ctx).await,
            Command::Profile => self.cmd_profile(ctx).await,
            Command::Cancel => self.cmd_cancel(ctx).await,
            Command::Chat => self.cmd_chat(ctx).await,
            Command::EndChat => self.cmd_end_chat(ctx).await,
            Command::Contact => self.cmd_contact(ctx).await,
            Command::Feedback => self.cmd_feedback(ctx).await,
            Command::Language => self.cmd_language(ctx).await,
            Command::SetLanguage(code) => self.set_language(ctx, &code).await,
            Command::RemindMe(args) => self.cmd_remind_me(ctx, &args).await,
            Command::MyInfo => self.cmd_my_info(ctx).await,
            Command::Settings => self.cmd_settings(ctx).await,
            Command::UserInfo(args) => self.cmd_user_info(ctx, &args).await,
            Command::Broadcast(message) => self.cmd_broadcast(ctx, &message).await,
            Command::Users => self.cmd_users(ctx).await,
            Command::Promote(args) => self.cmd_promote(ctx, &args).await,
            Command::Demote(args) => self.cmd_demote(ctx, &args).await,
            Command::Stats => self.cmd_stats(ctx).await,
            Command::Owner => self.cmd_owner(ctx).await,
            Command::Status => self.cmd_status(ctx).await,
            Command::Unknown(_) | Command::ForOtherBot => Ok(()),
        }
    }

    /// Plain text: rate limit, transcript, then the first route that applies.
    async fn dispatch_text(&self, ctx: &Context, text: &str) -> Result<(), BotError> {
        let user_id = ctx.user_id();
        let tier = rate_limit::tier(&self.config.rate_limit, ctx.access.admin);
        let now = Utc::now();
        let accepted = self.update_user(user_id, |u| rate_limit::check(&mut u.rate_limit, tier, now))?;
        if !accepted {
            info!("Rate limited {user_id}");
            return self.reply(ctx.chat_id, Reply::text(RATE_LIMITED)).await;
        }

        self.store.log_chat(&self.timestamp(), &ctx.sender.log_name(), text);

        if matches!(self.session(ctx).await, Some(ProfileState::Editing(_))) {
            return self.profile_input(ctx, ProfileInput::Text(text)).await;
        }

        if ctx.record.chat_mode {
            return self.ai_reply(ctx, text).await;
        }

        match ctx.chat_kind {
            ChatKind::Group if self.mentions_me(text) => self.group_intro(ctx).await,
            ChatKind::Private => match ctx.record.pending {
                Pending::AwaitingFeedback => self.submit_feedback(ctx, text).await,
                Pending::AwaitingReminder => self.submit_reminder(ctx, text).await,
                Pending::None if !text.starts_with('/') => {
                    self.reply(ctx.chat_id, Reply::text(NOT_IN_CHAT_MODE)).await
                }
                Pending::None => Ok(()),
            },
            _ => Ok(()),
        }
    }

    async fn process_callback(&self, callback: IncomingCallback) -> Result<(), BotError> {
        let user_id = callback.sender.id;
        let record = self.user(user_id);
        let ctx = Context {
            chat_id: callback.chat_id,
            chat_kind: callback.chat_kind,
            access: Access::resolve(user_id, &record, &self.config),
            sender: callback.sender,
            record,
            message_id: callback.message_id,
        };
        debug!("Callback '{}' from {user_id}", callback.data);
        self.dispatch_callback(&ctx, &callback.data).await
    }

    // ==================== PENDING FLOWS ====================

    async fn submit_feedback(&self, ctx: &Context, text: &str) -> Result<(), BotError> {
        let user_id = ctx.user_id();
        let entry = FeedbackEntry {
            user_id,
            username: ctx.sender.display_name(),
            text: text.to_string(),
            timestamp: Utc::now(),
        };
        match self.store.add_feedback(entry) {
            Ok(key) => info!("Stored feedback {key} from {user_id}"),
            Err(e) => error!("Error saving feedback from {user_id}: {e}"),
        }

        self.update_user(user_id, |u| {
            u.pending = Pending::None;
            u.achievements.feedback_provider = true;
        })?;

        let notice = format!(
            "📝 <b>New Feedback</b>\n\nFrom: {} ({user_id})\nText: {}",
            escape(&ctx.sender.display_name()),
            escape(text)
        );
        self.notify_admins(&notice).await;

        self.reply(
            ctx.chat_id,
            Reply::text("🙏 Thank you for your feedback! We appreciate your input."),
        )
        .await
    }

    async fn submit_reminder(&self, ctx: &Context, text: &str) -> Result<(), BotError> {
        self.update_user(ctx.user_id(), |u| u.pending = Pending::None)?;
        let now = Utc::now().with_timezone(&self.config.timezone);
        let request = crate::bot::reminders::parse_reply(text, now);
        self.schedule_reminder(ctx, request).await
    }

    // ==================== AI / MENTIONS ====================

    async fn ai_reply(&self, ctx: &Context, text: &str) -> Result<(), BotError> {
        let Some(ai) = &self.ai else {
            return self.reply(ctx.chat_id, Reply::text(AI_DISABLED)).await;
        };

        if let Err(e) = self.messenger.typing(ctx.chat_id).await {
            debug!("{e}");
        }

        let profile = &ctx.record.profile;
        let prompt = Prompt {
            system: ai::SYSTEM_PROMPT.to_string(),
            user_context: ai::user_context(&profile.full_name, &profile.interests, &profile.location),
            message: text.to_string(),
        };

        match ai.complete(&prompt).await {
            Ok(answer) => {
                self.reply(ctx.chat_id, Reply::text(escape(&answer))).await?;
                self.store.log_chat(&self.timestamp(), "Bot", &answer);
                Ok(())
            }
            Err(e) => {
                error!("Error in AI chat for {}: {e}", ctx.user_id());
                self.reply(ctx.chat_id, Reply::text(AI_FAILED)).await
            }
        }
    }

    fn mentions_me(&self, text: &str) -> bool {
        self.identity
            .username
            .as_deref()
            .is_some_and(|me| text.to_lowercase().contains(&format!("@{}", me.to_lowercase())))
    }

    async fn group_intro(&self, ctx: &Context) -> Result<(), BotError> {
        let text = format!(
            "👋 Hi {}! I'm {}.\n\
             Here's what I can do:\n\
             • Use /help to see available commands\n\
             • Use /chat to start a conversation with me\n\
             • Use /profile to view or edit your profile",
            escape(&ctx.sender.first_name),
            escape(&self.identity.first_name)
        );
        self.reply(ctx.chat_id, Reply::text(text)).await
    }

    // ==================== HELPERS ====================

    /// A fresh record for `user_id` first seen at `now`, given how many users already exist.
    pub(crate) fn new_record(&self, user_id: i64, existing_users: usize, now: DateTime<Utc>) -> UserRecord {
        let mut record = UserRecord::new(
            access::initial_role(user_id, &self.config),
            &self.config.default_language,
            now,
        );
        record.achievements.early_adopter = existing_users < EARLY_ADOPTER_LIMIT;
        info!("New user {user_id} ({})", record.role);
        record
    }

    /// Read a user, creating the record on first sight.
    pub(crate) fn user(&self, user_id: i64) -> UserRecord {
        let now = Utc::now();
        self.store.get_user(
            user_id,
            |existing| self.new_record(user_id, existing, now),
            || UserRecord::new(Role::User, &self.config.default_language, now),
        )
    }

    /// Mutate and persist a user, creating the record on first sight.
    pub(crate) fn update_user<R>(&self, user_id: i64, f: impl FnOnce(&mut UserRecord) -> R) -> Result<R, BotError> {
        self.update_user_at(user_id, Utc::now(), f)
    }

    /// As `update_user`, with `now` as the creation time of a new record.
    pub(crate) fn update_user_at<R>(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
        f: impl FnOnce(&mut UserRecord) -> R,
    ) -> Result<R, BotError> {
        Ok(self
            .store
            .update_user(user_id, |existing| self.new_record(user_id, existing, now), f)?)
    }

    pub(crate) async fn session(&self, ctx: &Context) -> Option<ProfileState> {
        self.sessions.lock().await.get(&(ctx.chat_id, ctx.user_id())).copied()
    }

    pub(crate) async fn reply(&self, chat_id: i64, reply: Reply) -> Result<(), BotError> {
        self.messenger.send(chat_id, &reply).await.map(|_| ()).map_err(BotError::Send)
    }

    /// Replace the pressed message when there is one, else send a new message.
    pub(crate) async fn show(&self, ctx: &Context, reply: Reply) -> Result<(), BotError> {
        if let Some(message_id) = ctx.message_id {
            match self.messenger.edit(ctx.chat_id, message_id, &reply).await {
                Ok(()) => return Ok(()),
                Err(e) => debug!("Edit failed, sending instead: {e}"),
            }
        }
        self.reply(ctx.chat_id, reply).await
    }

    pub(crate) async fn notify_admins(&self, text: &str) {
        let reply = Reply::text(text);
        for &admin_id in &self.config.admin_ids {
            if let Err(e) = self.messenger.send(admin_id, &reply).await {
                error!("Failed to notify admin {admin_id}: {e}");
            }
        }
    }

    pub(crate) fn timestamp(&self) -> String {
        self.local(Utc::now()).format("%Y-%m-%d %H:%M:%S").to_string()
    }

    pub(crate) fn local(&self, at: DateTime<Utc>) -> DateTime<chrono_tz::Tz> {
        at.with_timezone(&self.config.timezone)
    }

    async fn send_error_notice(&self, chat_id: i64) {
        if let Err(e) = self.messenger.send(chat_id, &Reply::text(ERROR_NOTICE)).await {
            error!("Failed to send error message: {e}");
        }
    }
}

fn denial(permission: Permission) -> &'static str {
    match permission {
        Permission::Owner => "🔒 You don't have permission to use this command.",
        Permission::Admin => "❌ This command is for administrators only.",
        Permission::Moderator => "❌ This command is for moderators only.",
        Permission::Everyone => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender(username: Option<&str>, last: Option<&str>) -> Sender {
        Sender {
            id: 7,
            username: username.map(String::from),
            first_name: "Ada".into(),
            last_name: last.map(String::from),
        }
    }

    #[test]
    fn test_sender_names() {
        let s = sender(None, Some("Lovelace"));
        assert_eq!(s.full_name(), "Ada Lovelace");
        assert_eq!(s.display_name(), "Ada Lovelace");
        assert_eq!(s.log_name(), "user_7");

        let s = sender(Some("ada"), None);
        assert_eq!(s.full_name(), "Ada");
        assert_eq!(s.display_name(), "ada");
        assert_eq!(s.log_name(), "ada");
    }

    #[test]
    fn test_denial_texts() {
        assert!(denial(Permission::Admin).contains("administrators only"));
        assert!(denial(Permission::Owner).starts_with("🔒"));
    }
}
