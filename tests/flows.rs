//! End-to-end flows through the engine with a recording messenger.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use assistbot::ai::{self, CompletionProvider, Prompt};
use assistbot::bot::store::{BroadcastRecord, FeedbackMap, LogKind, ReminderRecord, StoreKind};
use assistbot::bot::user::{Pending, Role, UserRecord};
use assistbot::bot::{
    BotEngine, BotIdentity, ChatKind, Content, IncomingCallback, IncomingMessage, Messenger, Reply,
    Sender, Store,
};
use assistbot::config::{Config, RateTier};

const ADMIN: i64 = 1;
const LISTED_MOD: i64 = 2;

#[derive(Default)]
struct MockMessenger {
    outbox: Mutex<Vec<(i64, String)>>,
    failing: HashSet<i64>,
    typing: AtomicUsize,
}

impl MockMessenger {
    fn texts(&self, chat_id: i64) -> Vec<String> {
        self.outbox
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == chat_id)
            .map(|(_, text)| text.clone())
            .collect()
    }

    fn last(&self, chat_id: i64) -> String {
        self.texts(chat_id).pop().unwrap_or_default()
    }

    fn clear(&self) {
        self.outbox.lock().unwrap().clear();
    }
}

#[async_trait]
impl Messenger for MockMessenger {
    async fn send(&self, chat_id: i64, reply: &Reply) -> Result<i64, String> {
        if self.failing.contains(&chat_id) {
            return Err(format!("chat {chat_id} blocked the bot"));
        }
        let mut outbox = self.outbox.lock().unwrap();
        outbox.push((chat_id, reply.text.clone()));
        Ok(outbox.len() as i64)
    }

    async fn edit(&self, chat_id: i64, _message_id: i64, reply: &Reply) -> Result<(), String> {
        self.outbox.lock().unwrap().push((chat_id, reply.text.clone()));
        Ok(())
    }

    async fn typing(&self, _chat_id: i64) -> Result<(), String> {
        self.typing.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct ScriptedProvider {
    answer: Result<String, String>,
    prompts: Mutex<Vec<Prompt>>,
}

impl ScriptedProvider {
    fn new(answer: Result<&str, &str>) -> Arc<Self> {
        Arc::new(Self {
            answer: answer.map(String::from).map_err(String::from),
            prompts: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(&self, prompt: &Prompt) -> Result<String, ai::Error> {
        self.prompts.lock().unwrap().push(prompt.clone());
        self.answer.clone().map_err(ai::Error::Api)
    }
}

struct Harness {
    _dir: TempDir,
    engine: BotEngine,
    messenger: Arc<MockMessenger>,
    store: Arc<Store>,
}

#[derive(Default)]
struct Options {
    ai: Option<Arc<dyn CompletionProvider>>,
    failing: Vec<i64>,
    rate_limit: Option<RateTier>,
}

fn harness(options: Options) -> Harness {
    let dir = TempDir::new().unwrap();
    let mut config = Config {
        admin_ids: [ADMIN].into_iter().collect(),
        moderator_ids: [LISTED_MOD].into_iter().collect(),
        data_dir: dir.path().to_path_buf(),
        broadcast_delay: std::time::Duration::ZERO,
        ..Config::default()
    };
    if let Some(tier) = options.rate_limit {
        config.rate_limit.default = tier;
    }

    let store = Arc::new(Store::new(dir.path()));
    store.ensure_files().unwrap();
    let messenger = Arc::new(MockMessenger {
        failing: options.failing.into_iter().collect(),
        ..MockMessenger::default()
    });
    let identity = BotIdentity {
        username: Some("assist_bot".into()),
        first_name: "Assist".into(),
    };
    let engine = BotEngine::new(Arc::new(config), store.clone(), messenger.clone(), options.ai, identity);
    Harness { _dir: dir, engine, messenger, store }
}

fn sender(id: i64) -> Sender {
    Sender {
        id,
        username: Some(format!("user{id}")),
        first_name: format!("First{id}"),
        last_name: None,
    }
}

impl Harness {
    async fn say(&self, user_id: i64, text: &str) {
        self.say_in(user_id, user_id, ChatKind::Private, text).await;
    }

    async fn say_in(&self, user_id: i64, chat_id: i64, chat_kind: ChatKind, text: &str) {
        self.engine
            .handle_message(IncomingMessage {
                chat_id,
                chat_kind,
                sender: sender(user_id),
                content: Content::Text(text.to_string()),
            })
            .await;
    }

    async fn press(&self, user_id: i64, data: &str) {
        self.engine
            .handle_callback(IncomingCallback {
                chat_id: user_id,
                chat_kind: ChatKind::Private,
                message_id: Some(10),
                sender: sender(user_id),
                data: data.to_string(),
            })
            .await;
    }

    fn record(&self, user_id: i64) -> UserRecord {
        self.store.all_users()[&user_id.to_string()].clone()
    }
}

#[tokio::test]
async fn test_first_contact_creates_record_once() {
    let h = harness(Options::default());
    h.say(100, "/start").await;
    let first = h.record(100);
    assert_eq!(first.role, Role::User);
    assert!(first.achievements.welcome);
    assert!(first.achievements.early_adopter);
    assert_eq!(first.stats.commands_used, 1);
    assert!(h.messenger.last(100).contains("Hello First100"));

    h.say(100, "/help").await;
    let second = h.record(100);
    assert_eq!(second.first_seen, first.first_seen);
    assert_eq!(second.message_count, 2);
    assert_eq!(h.store.all_users().len(), 1);

    let log = std::fs::read_to_string(h.store.log_path(LogKind::Commands)).unwrap();
    assert_eq!(log.lines().count(), 2);
    assert!(log.lines().next().unwrap().ends_with("- User 100 used command: /start"));
}

#[tokio::test]
async fn test_allow_lists_seed_roles() {
    let h = harness(Options::default());
    h.say(ADMIN, "/start").await;
    h.say(LISTED_MOD, "/start").await;
    assert_eq!(h.record(ADMIN).role, Role::Admin);
    assert_eq!(h.record(LISTED_MOD).role, Role::Moderator);
}

#[tokio::test]
async fn test_rate_limit_rejects_after_limit() {
    let h = harness(Options {
        rate_limit: Some(RateTier { limit: 3, window_seconds: 60 }),
        ..Options::default()
    });
    for i in 0..4 {
        h.say(100, &format!("hello {i}")).await;
    }
    let texts = h.messenger.texts(100);
    assert_eq!(texts.len(), 4);
    assert!(texts[..3].iter().all(|t| t.contains("I'm not in chat mode")));
    assert!(texts[3].contains("too fast"));
    assert_eq!(h.record(100).rate_limit.count, 3);

    let transcript = std::fs::read_to_string(h.store.log_path(LogKind::ChatHistory)).unwrap();
    assert_eq!(transcript.lines().count(), 3, "rejected text is not logged");

    // Commands bypass the limiter.
    h.say(100, "/help").await;
    assert!(h.messenger.last(100).contains("Available Commands"));
}

#[tokio::test]
async fn test_rate_limit_window_resets() {
    let h = harness(Options {
        rate_limit: Some(RateTier { limit: 1, window_seconds: 60 }),
        ..Options::default()
    });
    h.say(100, "one").await;
    h.say(100, "two").await;
    assert!(h.messenger.last(100).contains("too fast"));

    let mut record = h.record(100);
    record.rate_limit.last_reset = Utc::now() - Duration::seconds(61);
    h.store.put_user(100, &record).unwrap();

    h.say(100, "three").await;
    assert!(h.messenger.last(100).contains("I'm not in chat mode"));
    assert_eq!(h.record(100).rate_limit.count, 1);
}

#[tokio::test]
async fn test_profile_bio_limits() {
    let h = harness(Options::default());
    h.say(100, "/profile").await;
    assert!(h.messenger.last(100).contains("<b>First100</b> (@user100)"));
    h.press(100, "edit_profile").await;
    assert_eq!(h.messenger.last(100), "What would you like to edit?");
    h.press(100, "edit_bio").await;
    assert!(h.messenger.last(100).contains("new bio"));

    h.say(100, &"x".repeat(501)).await;
    assert_eq!(h.messenger.last(100), "❌ Bio is too long! Maximum 500 characters.");
    assert_eq!(h.record(100).profile.bio, "");

    // Still editing: the next text is taken as the bio.
    let bio = "y".repeat(500);
    h.say(100, &bio).await;
    let texts = h.messenger.texts(100);
    assert!(texts.contains(&"✅ Bio updated successfully!".to_string()));
    assert!(h.messenger.last(100).contains("📝 Bio: yyy"));
    assert_eq!(h.record(100).profile.bio, bio);

    // Back to viewing: plain text goes to normal dispatch.
    h.say(100, "hello").await;
    assert!(h.messenger.last(100).contains("I'm not in chat mode"));
    assert_eq!(h.record(100).profile.bio, bio);
}

#[tokio::test]
async fn test_profile_interests_limits() {
    let h = harness(Options::default());
    h.say(100, "/profile").await;
    h.press(100, "edit_profile").await;
    h.press(100, "edit_interests").await;

    let eleven: Vec<String> = (1..=11).map(|i| format!("topic{i}")).collect();
    h.say(100, &eleven.join(", ")).await;
    assert_eq!(h.messenger.last(100), "❌ You can have a maximum of 10 interests.");
    assert!(h.record(100).profile.interests.is_empty());

    h.say(100, &format!("music, {}", "z".repeat(31))).await;
    assert_eq!(h.messenger.last(100), "❌ Each interest must be 30 characters or less.");

    h.say(100, " rust , ,  chess,music,a,b,c,d,e,f,g ").await;
    assert!(h.messenger.texts(100).contains(&"🎯 Updated 10 interests!".to_string()));
    assert_eq!(
        h.record(100).profile.interests,
        ["rust", "chess", "music", "a", "b", "c", "d", "e", "f", "g"]
    );
}

#[tokio::test]
async fn test_profile_cancel_discards_edit() {
    let h = harness(Options::default());
    h.say(100, "/profile").await;
    h.press(100, "edit_profile").await;
    h.press(100, "edit_location").await;
    h.say(100, "/cancel").await;
    assert!(h.messenger.texts(100).contains(&"❌ Profile editing cancelled.".to_string()));

    h.say(100, "Paris").await;
    assert_eq!(h.record(100).profile.location, "");
    assert!(h.messenger.last(100).contains("I'm not in chat mode"));
}

#[tokio::test]
async fn test_profile_back_and_menu() {
    let h = harness(Options::default());
    h.say(100, "/profile").await;
    h.press(100, "edit_profile").await;
    h.press(100, "back_to_profile").await;
    assert!(h.messenger.last(100).contains("🆔 User ID: <code>100</code>"));
    h.press(100, "back_to_menu").await;
    assert!(h.messenger.last(100).contains("Available Commands"));
}

#[tokio::test]
async fn test_promote_then_demote() {
    let h = harness(Options::default());
    h.say(200, "/start").await;

    h.say(ADMIN, "/promote 200 moderator").await;
    assert_eq!(h.messenger.last(ADMIN), "✅ User 200 promoted from user to moderator.");
    assert_eq!(h.record(200).role, Role::Moderator);
    assert!(h.messenger.last(200).contains("promoted to moderator"));

    h.say(ADMIN, "/demote 200").await;
    assert_eq!(h.messenger.last(ADMIN), "✅ User 200 demoted from moderator to user.");
    assert_eq!(h.record(200).role, Role::User);

    h.say(ADMIN, "/demote 200").await;
    assert_eq!(h.messenger.last(ADMIN), "❌ User is already a regular user.");
    assert_eq!(h.record(200).role, Role::User);
}

#[tokio::test]
async fn test_promote_rejects_bad_input() {
    let h = harness(Options::default());
    h.say(ADMIN, "/promote abc").await;
    assert!(h.messenger.last(ADMIN).starts_with("❌ Invalid format"));
    h.say(ADMIN, "/promote 200 owner").await;
    assert_eq!(h.messenger.last(ADMIN), "❌ Invalid role. Use 'moderator' or 'admin'.");
}

#[tokio::test]
async fn test_promoted_admin_gains_admin_commands() {
    let h = harness(Options::default());
    h.say(300, "/stats").await;
    assert_eq!(h.messenger.last(300), "❌ This command is for administrators only.");

    h.say(ADMIN, "/promote 300 admin").await;
    h.say(300, "/stats").await;
    assert!(h.messenger.last(300).contains("Daily Statistics"));
    // Owner commands need the static allow-list.
    h.say(300, "/status").await;
    assert!(h.messenger.last(300).starts_with("🔒"));
}

#[tokio::test]
async fn test_allow_listed_admin_survives_demotion() {
    let h = harness(Options::default());
    h.say(ADMIN, "/demote 1").await;
    assert_eq!(h.record(ADMIN).role, Role::User);

    h.say(ADMIN, "/stats").await;
    assert!(h.messenger.last(ADMIN).contains("Daily Statistics"));
    h.say(ADMIN, "/status").await;
    assert!(h.messenger.last(ADMIN).contains("Bot Status"));
}

#[tokio::test]
async fn test_moderator_commands() {
    let h = harness(Options::default());
    h.say(100, "/start").await;
    h.say(LISTED_MOD, "/userinfo 100").await;
    let info = h.messenger.last(LISTED_MOD);
    assert!(info.contains("User 100"));
    assert!(info.contains("Role: user"));

    h.say(LISTED_MOD, "/userinfo 999").await;
    assert_eq!(h.messenger.last(LISTED_MOD), "❌ User not found.");

    h.say(100, "/userinfo 2").await;
    assert_eq!(h.messenger.last(100), "❌ This command is for moderators only.");
}

#[tokio::test]
async fn test_remindme_with_arguments() {
    let h = harness(Options::default());
    let before = Utc::now();
    h.say(100, "/remindme in 30 minutes Call mom").await;
    let after = Utc::now();

    let reminders: Vec<ReminderRecord> = h.store.load(StoreKind::Reminders);
    assert_eq!(reminders.len(), 1);
    assert_eq!(reminders[0].user_id, 100);
    assert_eq!(reminders[0].message, "Call mom");
    assert!(reminders[0].time >= before + Duration::minutes(30));
    assert!(reminders[0].time <= after + Duration::minutes(30));
    assert!(h.messenger.last(100).contains("I'll remind you at"));
    assert!(h.messenger.last(100).ends_with("Call mom"));
}

#[tokio::test]
async fn test_remindme_past_time_is_rejected() {
    let h = harness(Options::default());
    h.say(100, "/remindme in -5 minutes too late").await;
    assert_eq!(h.messenger.last(100), "❌ Please specify a future time for the reminder.");
    let reminders: Vec<ReminderRecord> = h.store.load(StoreKind::Reminders);
    assert!(reminders.is_empty());
}

#[tokio::test]
async fn test_remindme_unparseable_time_is_flagged() {
    let h = harness(Options::default());
    h.say(100, "/remindme someday water plants").await;
    let reply = h.messenger.last(100);
    assert!(reply.contains("couldn't understand the time"));
    let reminders: Vec<ReminderRecord> = h.store.load(StoreKind::Reminders);
    assert_eq!(reminders[0].message, "someday water plants");
}

#[tokio::test]
async fn test_remindme_pending_flow() {
    let h = harness(Options::default());
    h.say(100, "/feedback").await;
    h.say(100, "/remindme").await;
    assert_eq!(h.record(100).pending, Pending::AwaitingReminder, "reminder replaces feedback");

    h.say(100, "10 minutes Stretch").await;
    assert_eq!(h.record(100).pending, Pending::None);
    let reminders: Vec<ReminderRecord> = h.store.load(StoreKind::Reminders);
    assert_eq!(reminders.len(), 1);
    assert_eq!(reminders[0].message, "Stretch");
    let feedback: FeedbackMap = h.store.load(StoreKind::Feedback);
    assert!(feedback.is_empty());
}

#[tokio::test]
async fn test_feedback_flow() {
    let h = harness(Options::default());
    h.say(100, "/feedback").await;
    assert_eq!(h.record(100).pending, Pending::AwaitingFeedback);

    h.say(100, "Great bot").await;
    let record = h.record(100);
    assert_eq!(record.pending, Pending::None);
    assert!(record.achievements.feedback_provider);
    assert_eq!(
        h.messenger.last(100),
        "🙏 Thank you for your feedback! We appreciate your input."
    );
    assert!(h.messenger.last(ADMIN).contains("New Feedback"));
    assert!(h.messenger.last(ADMIN).contains("Great bot"));

    h.say(100, "/feedback").await;
    h.say(100, "Still great").await;
    let feedback: FeedbackMap = h.store.load(StoreKind::Feedback);
    assert_eq!(feedback.len(), 2);
    let texts: HashSet<&str> = feedback.values().map(|f| f.text.as_str()).collect();
    assert!(texts.contains("Great bot") && texts.contains("Still great"));
}

#[tokio::test]
async fn test_cancel_clears_pending_flow() {
    let h = harness(Options::default());
    h.say(100, "/feedback").await;
    h.say(100, "/cancel").await;
    assert_eq!(h.record(100).pending, Pending::None);
    assert_eq!(h.messenger.last(100), "❌ Cancelled.");
    h.say(100, "/cancel").await;
    assert_eq!(h.messenger.last(100), "ℹ️ Nothing to cancel.");
}

#[tokio::test]
async fn test_broadcast_counts_failures() {
    let h = harness(Options {
        failing: vec![301, 302],
        ..Options::default()
    });
    for id in [300, 301, 302, 303] {
        h.store.put_user(id, &UserRecord::default()).unwrap();
    }
    h.say(ADMIN, "/broadcast Maintenance at <2 AM>").await;

    let broadcasts: Vec<BroadcastRecord> = h.store.load(StoreKind::Broadcasts);
    assert_eq!(broadcasts.len(), 1);
    let record = &broadcasts[0];
    assert_eq!(record.admin_id, ADMIN);
    assert_eq!(record.total_recipients, 5);
    assert_eq!(record.successful, 3);
    assert_eq!(record.failed, 2);

    assert!(h.messenger.last(303).contains("Maintenance at &lt;2 AM&gt;"));
    let report = h.messenger.last(ADMIN);
    assert!(report.contains("Broadcast Sent"));
    assert!(report.contains("• Failed: 2"));
}

#[tokio::test]
async fn test_broadcast_is_admin_only() {
    let h = harness(Options::default());
    h.say(LISTED_MOD, "/broadcast hi").await;
    assert_eq!(h.messenger.last(LISTED_MOD), "❌ This command is for administrators only.");
    let broadcasts: Vec<BroadcastRecord> = h.store.load(StoreKind::Broadcasts);
    assert!(broadcasts.is_empty());
}

#[tokio::test]
async fn test_chat_mode_forwards_to_ai() {
    let provider = ScriptedProvider::new(Ok("Rust is a <systems> language."));
    let h = harness(Options {
        ai: Some(provider.clone()),
        ..Options::default()
    });
    h.say(100, "/chat").await;
    assert!(h.record(100).chat_mode);

    h.say(100, "What is Rust?").await;
    assert_eq!(h.messenger.last(100), "Rust is a &lt;systems&gt; language.");
    assert_eq!(h.messenger.typing.load(Ordering::SeqCst), 1);

    let prompts = provider.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0].message, "What is Rust?");
    assert_eq!(prompts[0].system, ai::SYSTEM_PROMPT);

    let transcript = std::fs::read_to_string(h.store.log_path(LogKind::ChatHistory)).unwrap();
    assert!(transcript.contains("] user100: What is Rust?"));
    assert!(transcript.contains("] Bot: Rust is a <systems> language."));
}

#[tokio::test]
async fn test_chat_mode_ai_failure_apologizes() {
    let provider = ScriptedProvider::new(Err("503"));
    let h = harness(Options {
        ai: Some(provider),
        ..Options::default()
    });
    h.say(100, "/chat").await;
    h.say(100, "hello?").await;
    assert!(h.messenger.last(100).starts_with("⚠️ Sorry, I encountered an error"));

    h.say(100, "/endchat").await;
    assert!(!h.record(100).chat_mode);
}

#[tokio::test]
async fn test_chat_mode_without_provider() {
    let h = harness(Options::default());
    h.say(100, "/chat").await;
    h.say(100, "hello?").await;
    assert!(h.messenger.last(100).contains("AI features are currently disabled"));
}

#[tokio::test]
async fn test_group_mentions() {
    let h = harness(Options::default());
    h.say_in(100, -500, ChatKind::Group, "just chatting").await;
    assert!(h.messenger.texts(-500).is_empty());

    h.say_in(100, -500, ChatKind::Group, "hey @Assist_Bot what can you do").await;
    assert!(h.messenger.last(-500).contains("I'm Assist."));

    // Commands for another bot are ignored, ours are answered.
    h.say_in(100, -500, ChatKind::Group, "/help@other_bot").await;
    assert_eq!(h.messenger.texts(-500).len(), 1);
    h.say_in(100, -500, ChatKind::Group, "/help@assist_bot").await;
    assert!(h.messenger.last(-500).contains("Available Commands"));
}

#[tokio::test]
async fn test_channel_posts_are_ignored() {
    let h = harness(Options::default());
    h.say_in(100, -700, ChatKind::Channel, "/start").await;
    assert!(h.messenger.texts(-700).is_empty());
    assert!(h.store.all_users().is_empty());
}

#[tokio::test]
async fn test_unknown_command_hint() {
    let h = harness(Options::default());
    h.say(100, "/dance").await;
    assert!(h.messenger.last(100).starts_with("❓ Unknown command"));
}

#[tokio::test]
async fn test_non_text_messages_are_counted() {
    let h = harness(Options::default());
    for content in [Content::Sticker, Content::Voice, Content::Media, Content::Media] {
        h.engine
            .handle_message(IncomingMessage {
                chat_id: 100,
                chat_kind: ChatKind::Private,
                sender: sender(100),
                content,
            })
            .await;
    }
    let stats = h.record(100).stats;
    assert_eq!(stats.stickers_sent, 1);
    assert_eq!(stats.voice_messages, 1);
    assert_eq!(stats.media_sent, 2);
    assert_eq!(stats.messages_sent, 0);
    assert!(h.messenger.texts(100).is_empty());
}

#[tokio::test]
async fn test_language_and_settings_buttons() {
    let h = harness(Options::default());
    h.say(100, "/language").await;
    assert!(h.messenger.last(100).contains("Select Language"));
    h.press(100, "set_lang_es").await;
    assert_eq!(h.messenger.last(100), "✅ Language set to ES");
    assert_eq!(h.record(100).language, "es");

    h.say(100, "/help").await;
    assert!(h.messenger.last(100).contains("Comandos disponibles"));

    h.press(100, "set_lang_fr").await;
    assert_eq!(h.messenger.last(100), "❌ Invalid language selection.");

    h.messenger.clear();
    h.press(100, "toggle_notifications").await;
    h.press(100, "toggle_digest").await;
    h.press(100, "cycle_theme").await;
    let settings = h.record(100).settings;
    assert!(!settings.notifications);
    assert!(settings.daily_digest);
    assert_eq!(settings.theme.as_str(), "light");
    assert!(h.messenger.last(100).contains("🎨 Theme: light"));
}

#[tokio::test]
async fn test_daily_stats_go_to_admins() {
    let h = harness(Options::default());
    h.say(100, "hi").await;
    h.say(101, "hi").await;
    h.engine.send_daily_stats().await;
    let digest = h.messenger.last(ADMIN);
    assert!(digest.contains("• Total users: 2"));
    assert!(digest.contains("• New users today: 2"));
    assert!(digest.contains("• Total messages today: 2"));
}

#[tokio::test]
async fn test_new_user_is_last_seen_when_first_seen() {
    let h = harness(Options::default());
    h.say(100, "hello").await;
    let record = h.record(100);
    assert_eq!(record.last_seen, record.first_seen);
    assert_eq!(record.stats.active_days, 1);
}

#[tokio::test]
async fn test_truncated_users_file_is_kept_aside() {
    let h = harness(Options::default());
    let truncated = r#"{"10": {"profile": {"bio": "keep me"}, "chat_mo"#;
    std::fs::write(h.store.path(StoreKind::Users), truncated).unwrap();

    h.say(99, "hello").await;

    let backups: Vec<String> = std::fs::read_dir(h.store.data_dir())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.file_name().unwrap().to_string_lossy().starts_with("users.json.corrupt-"))
        .map(|path| std::fs::read_to_string(path).unwrap())
        .collect();
    assert_eq!(backups, vec![truncated.to_string()]);
    assert!(h.store.all_users().contains_key("99"));
}
