//! Command and button handlers.

use chrono::Utc;
use tracing::{debug, error, info};

use crate::bot::engine::{BotEngine, BotError, Context};
use crate::bot::format::{self, escape};
use crate::bot::i18n;
use crate::bot::messenger::{Button, Keyboard, Reply};
use crate::bot::profile::{self, ProfileEffect, ProfileField, ProfileInput, ProfileState};
use crate::bot::reminders::{self, ReminderRequest};
use crate::bot::stats::{DailyStats, UserSummary};
use crate::bot::store::ReminderRecord;
use crate::bot::user::{Pending, Role, Settings, UserRecord};

type Result = std::result::Result<(), BotError>;

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

impl BotEngine {
    // ==================== EVERYONE ====================

    pub(super) async fn cmd_start(&self, ctx: &Context) -> Result {
        self.update_user(ctx.user_id(), |u| u.achievements.welcome = true)?;
        let greeting = i18n::welcome(
            &ctx.record.language,
            &self.config.default_language,
            &escape(&ctx.sender.first_name),
        );
        let text = format!(
            "{greeting}\n\n\
             I'm your friendly AI bot! Here's what I can do:\n\
             • Use /help to see available commands\n\
             • Use /chat to start AI chat mode\n\
             • Use /contact to get in touch"
        );
        self.reply(ctx.chat_id, Reply::text(text)).await
    }

    pub(super) async fn cmd_help(&self, ctx: &Context) -> Result {
        let strings = i18n::strings(&ctx.record.language, &self.config.default_language);
        let mut text = format!(
            "{}\n\n{}\n\
             • /start - Show welcome message\n\
             • /help - Show this help message\n\
             • /profile - View and edit your profile\n\
             • /chat - Start AI chat mode\n\
             • /endchat - Leave AI chat mode\n\
             • /contact - Contact information\n\
             • /feedback - Send us your feedback\n\
             • /language - Change language\n\
             • /remindme - Set a reminder\n\
             • /myinfo - Show your information\n\
             • /settings - Your preferences\n\
             • /cancel - Cancel the current action\n",
            strings.help, strings.user_commands
        );
        if ctx.access.moderator {
            text.push_str(&format!(
                "\n{}\n• /userinfo [user_id] - Get user information\n",
                strings.moderator_commands
            ));
        }
        if ctx.access.admin {
            text.push_str(&format!(
                "\n{}\n\
                 • /broadcast [message] - Send message to all users\n\
                 • /stats - Show bot statistics\n",
                strings.admin_commands
            ));
        }

        let mut keyboard = Keyboard::new()
            .row(vec![
                Button::new("💬 Start Chat", "start_chat"),
                Button::new("📝 Feedback", "give_feedback"),
            ])
            .button("⚙️ Settings", "settings");
        if ctx.access.moderator {
            keyboard = keyboard.button("👥 User Management", "user_management");
        }

        self.show(ctx, Reply::text(text).with_keyboard(keyboard)).await
    }

    pub(super) async fn cmd_profile(&self, ctx: &Context) -> Result {
        let now = Utc::now();
        let full_name = ctx.sender.full_name();
        let username = ctx.sender.username.clone();
        self.update_user(ctx.user_id(), |u| u.fill_identity(&full_name, username.as_deref(), now))?;
        self.sessions
            .lock()
            .await
            .insert((ctx.chat_id, ctx.user_id()), ProfileState::Viewing);
        self.show_profile(ctx).await
    }

    pub(super) async fn cmd_cancel(&self, ctx: &Context) -> Result {
        let editing = matches!(
            self.session(ctx).await,
            Some(ProfileState::Choosing | ProfileState::Editing(_))
        );
        let had_pending = ctx.record.pending != Pending::None;
        if had_pending {
            self.update_user(ctx.user_id(), |u| u.pending = Pending::None)?;
        }
        if editing {
            return self.profile_input(ctx, ProfileInput::Cancel).await;
        }
        let text = if had_pending { "❌ Cancelled." } else { "ℹ️ Nothing to cancel." };
        self.reply(ctx.chat_id, Reply::text(text)).await
    }

    pub(super) async fn cmd_chat(&self, ctx: &Context) -> Result {
        self.update_user(ctx.user_id(), |u| u.chat_mode = true)?;
        let mut text = String::from(
            "💬 <b>AI Chat Mode Activated</b>\n\n\
             You're now chatting with the AI! Send any message and I'll respond.\n\
             Type /endchat to exit chat mode.",
        );
        if self.ai.is_none() {
            text.push_str("\n\n⚠️ AI features are currently disabled.");
        }
        self.reply(ctx.chat_id, Reply::text(text)).await
    }

    pub(super) async fn cmd_end_chat(&self, ctx: &Context) -> Result {
        self.update_user(ctx.user_id(), |u| u.chat_mode = false)?;
        self.reply(
            ctx.chat_id,
            Reply::text(
                "👋 <b>AI Chat Mode Deactivated</b>\n\n\
                 You've exited chat mode. Type /chat to start again.",
            ),
        )
        .await
    }

    pub(super) async fn cmd_contact(&self, ctx: &Context) -> Result {
        let text = format!("📧 <b>Contact Information</b>\n\n{}", self.config.contact_text);
        self.reply(ctx.chat_id, Reply::text(text)).await
    }

    pub(super) async fn cmd_feedback(&self, ctx: &Context) -> Result {
        self.update_user(ctx.user_id(), |u| u.pending = Pending::AwaitingFeedback)?;
        self.reply(
            ctx.chat_id,
            Reply::text("💬 Please share your feedback. What would you like to tell us?"),
        )
        .await
    }

    pub(super) async fn cmd_language(&self, ctx: &Context) -> Result {
        let mut keyboard = Keyboard::new();
        for (code, flag) in i18n::LANGUAGES {
            let mark = if *code == ctx.record.language { " ✅" } else { "" };
            keyboard = keyboard.button(
                format!("{flag} {}{mark}", code.to_uppercase()),
                format!("set_lang_{code}"),
            );
        }
        keyboard = keyboard.button("🔙 Back", "back_to_menu");
        let text = "🌐 <b>Select Language</b>\n\nChoose your preferred language:";
        self.show(ctx, Reply::text(text).with_keyboard(keyboard)).await
    }

    pub(super) async fn set_language(&self, ctx: &Context, code: &str) -> Result {
        let code = code.trim().to_lowercase();
        if code.is_empty() {
            let available: Vec<&str> = i18n::LANGUAGES.iter().map(|(c, _)| *c).collect();
            let text = format!("Usage: /setlanguage [code]\nAvailable: {}", available.join(", "));
            return self.reply(ctx.chat_id, Reply::text(text)).await;
        }
        if !i18n::is_supported(&code) {
            return self.show(ctx, Reply::text("❌ Invalid language selection.")).await;
        }
        self.update_user(ctx.user_id(), |u| u.language = code.clone())?;
        info!("User {} set language to {code}", ctx.user_id());
        self.show(ctx, Reply::text(format!("✅ Language set to {}", code.to_uppercase())))
            .await
    }

    pub(super) async fn cmd_remind_me(&self, ctx: &Context, args: &str) -> Result {
        if args.trim().is_empty() {
            self.update_user(ctx.user_id(), |u| u.pending = Pending::AwaitingReminder)?;
            let text = "⏰ <b>Set a Reminder</b>\n\n\
                        When should I remind you, and of what? For example:\n\
                        • <code>in 30 minutes Take the pizza out of the oven</code>\n\
                        • <code>at 14:00 Submit report</code>\n\n\
                        You can also use /remindme [time] [message] directly. Send /cancel to stop.";
            return self.reply(ctx.chat_id, Reply::text(text)).await;
        }
        let now = Utc::now().with_timezone(&self.config.timezone);
        let request = reminders::parse_reminder(args, now);
        self.schedule_reminder(ctx, request).await
    }

    /// Schedule delivery, record it, and confirm to the user.
    pub(super) async fn schedule_reminder(&self, ctx: &Context, request: ReminderRequest) -> Result {
        let now = Utc::now();
        let delay = match (request.at - now).to_std() {
            Ok(delay) if !delay.is_zero() => delay,
            _ => {
                return self
                    .reply(ctx.chat_id, Reply::text("❌ Please specify a future time for the reminder."))
                    .await;
            }
        };

        self.scheduler
            .schedule_reminder(delay, ctx.chat_id, request.message.clone());
        let record = ReminderRecord {
            user_id: ctx.user_id(),
            time: request.at,
            message: request.message.clone(),
            created_at: now,
        };
        if let Err(e) = self.store.add_reminder(record) {
            error!("Error saving reminder for {}: {e}", ctx.user_id());
        }
        info!("Reminder for {} in {}s", ctx.user_id(), delay.as_secs());

        let mut text = String::new();
        if request.guessed {
            text.push_str("⚠️ I couldn't understand the time, so I'll remind you in 1 hour.\n\n");
        }
        text.push_str(&format!(
            "⏰ I'll remind you at {}:\n{}",
            self.local(request.at).format(DATE_FORMAT),
            escape(&request.message)
        ));
        self.reply(ctx.chat_id, Reply::text(text)).await
    }

    pub(super) async fn cmd_my_info(&self, ctx: &Context) -> Result {
        let now = Utc::now();
        let full_name = ctx.sender.full_name();
        let username = ctx.sender.username.clone();
        let record = self.update_user(ctx.user_id(), |u| {
            u.fill_identity(&full_name, username.as_deref(), now);
            u.clone()
        })?;
        let profile = &record.profile;
        let text = format!(
            "👤 <b>Your Information</b>\n\n\
             🆔 User ID: <code>{}</code>\n\
             👤 Full Name: {}\n\
             🔖 Username: {}\n\
             📅 Member since: {}\n\
             🌐 Language: {}\n\
             📊 Messages sent: {}\n\
             📱 Last seen: {}\n\
             📝 Bio: {}\n\
             📍 Location: {}\n\
             🎯 Interests: {}",
            ctx.user_id(),
            escape(&profile.full_name),
            if profile.username.is_empty() { "Not set".to_string() } else { format!("@{}", escape(&profile.username)) },
            self.local(record.first_seen).format(DATE_FORMAT),
            record.language.to_uppercase(),
            record.stats.messages_sent,
            self.local(record.last_seen).format(DATE_FORMAT),
            or_not_set(&profile.bio),
            or_not_set(&profile.location),
            interests(&profile.interests),
        );
        self.reply(ctx.chat_id, Reply::text(text)).await
    }

    pub(super) async fn cmd_settings(&self, ctx: &Context) -> Result {
        let record = self.user(ctx.user_id());
        self.show(ctx, settings_view(&record)).await
    }

    // ==================== MODERATOR ====================

    pub(super) async fn cmd_user_info(&self, ctx: &Context, args: &str) -> Result {
        let Some(target) = args.split_whitespace().next().and_then(|s| s.parse::<i64>().ok()) else {
            return self
                .reply(ctx.chat_id, Reply::text("Usage: /userinfo [user_id]"))
                .await;
        };
        let users = self.store.all_users();
        let Some(record) = users.get(&target.to_string()) else {
            return self.reply(ctx.chat_id, Reply::text("❌ User not found.")).await;
        };

        let favorite = record
            .favorite_command()
            .map(|(name, count)| format!("{name} ({count})"))
            .unwrap_or_else(|| "None".to_string());
        let username = if record.profile.username.is_empty() {
            "N/A".to_string()
        } else {
            format!("@{}", escape(&record.profile.username))
        };
        let text = format!(
            "🔎 <b>User {target}</b>\n\n\
             👤 Name: {}\n\
             🔖 Username: {}\n\
             🎖 Role: {}\n\
             💬 Chat mode: {}\n\
             📅 First seen: {}\n\
             📱 Last seen: {}\n\
             📊 Messages: {} (media {}, stickers {}, voice {})\n\
             ⌨️ Commands: {} (favorite: {})\n\
             📆 Active days: {}",
            or_not_set(&record.profile.full_name),
            username,
            record.role,
            on_off(record.chat_mode),
            self.local(record.first_seen).format(DATE_FORMAT),
            self.local(record.last_seen).format(DATE_FORMAT),
            record.stats.messages_sent,
            record.stats.media_sent,
            record.stats.stickers_sent,
            record.stats.voice_messages,
            record.stats.commands_used,
            escape(&favorite),
            record.stats.active_days,
        );
        self.reply(ctx.chat_id, Reply::text(text)).await
    }

    // ==================== ADMIN ====================

    pub(super) async fn cmd_broadcast(&self, ctx: &Context, message: &str) -> Result {
        if message.trim().is_empty() {
            let text = "📢 <b>Broadcast a Message</b>\n\n\
                        Usage: /broadcast [message]\n\n\
                        Example: /broadcast Hello everyone! We'll have maintenance tomorrow at 2 AM UTC.";
            return self.reply(ctx.chat_id, Reply::text(text)).await;
        }

        let record = self.broadcast(ctx.user_id(), message).await;
        let text = format!(
            "📢 <b>Broadcast Sent</b>\n\n\
             • Total recipients: {}\n\
             • Successfully sent: {}\n\
             • Failed: {}\n\n\
             Message: {}",
            record.total_recipients,
            record.successful,
            record.failed,
            escape(&format::preview(message, 100))
        );
        self.reply(ctx.chat_id, Reply::text(text)).await
    }

    pub(super) async fn cmd_users(&self, ctx: &Context) -> Result {
        let users = self.store.all_users();
        if users.is_empty() {
            return self.reply(ctx.chat_id, Reply::text("📝 No users found.")).await;
        }
        let text = UserSummary::compute(&users).render(self.config.timezone);
        self.reply(ctx.chat_id, Reply::text(text)).await
    }

    pub(super) async fn cmd_promote(&self, ctx: &Context, args: &str) -> Result {
        if args.trim().is_empty() {
            let text = "📈 <b>Promote User</b>\n\n\
                        Usage: /promote [user_id] [role]\n\n\
                        Roles: moderator, admin\n\
                        Example: /promote 123456789 moderator";
            return self.reply(ctx.chat_id, Reply::text(text)).await;
        }

        let mut parts = args.split_whitespace();
        let Some(target) = parts.next().and_then(|s| s.parse::<i64>().ok()) else {
            return self
                .reply(ctx.chat_id, Reply::text("❌ Invalid format. Use: /promote [user_id] [role]"))
                .await;
        };
        let role = match parts.next().map(Role::parse) {
            None => Role::Moderator,
            Some(Some(role @ (Role::Moderator | Role::Admin))) => role,
            Some(_) => {
                return self
                    .reply(ctx.chat_id, Reply::text("❌ Invalid role. Use 'moderator' or 'admin'."))
                    .await;
            }
        };

        let old = self.update_user(target, |u| std::mem::replace(&mut u.role, role))?;
        info!("{} promoted {target} from {old} to {role}", ctx.user_id());
        self.reply(
            ctx.chat_id,
            Reply::text(format!("✅ User {target} promoted from {old} to {role}.")),
        )
        .await?;

        let notice = Reply::text(format!("🎉 Congratulations! You've been promoted to {role}."));
        if let Err(e) = self.messenger.send(target, &notice).await {
            debug!("Could not notify promoted user {target}: {e}");
        }
        Ok(())
    }

    pub(super) async fn cmd_demote(&self, ctx: &Context, args: &str) -> Result {
        if args.trim().is_empty() {
            let text = "📉 <b>Demote User</b>\n\n\
                        Usage: /demote [user_id]\n\n\
                        Example: /demote 123456789";
            return self.reply(ctx.chat_id, Reply::text(text)).await;
        }

        let Some(target) = args.split_whitespace().next().and_then(|s| s.parse::<i64>().ok()) else {
            return self
                .reply(ctx.chat_id, Reply::text("❌ Invalid format. Use: /demote [user_id]"))
                .await;
        };

        let old = self.update_user(target, |u| std::mem::replace(&mut u.role, Role::User))?;
        if old == Role::User {
            return self
                .reply(ctx.chat_id, Reply::text("❌ User is already a regular user."))
                .await;
        }
        info!("{} demoted {target} from {old}", ctx.user_id());
        self.reply(
            ctx.chat_id,
            Reply::text(format!("✅ User {target} demoted from {old} to user.")),
        )
        .await?;

        let notice = Reply::text("⚠️ You've been demoted to regular user.");
        if let Err(e) = self.messenger.send(target, &notice).await {
            debug!("Could not notify demoted user {target}: {e}");
        }
        Ok(())
    }

    pub(super) async fn cmd_stats(&self, ctx: &Context) -> Result {
        let stats = DailyStats::compute(&self.store.all_users(), Utc::now(), self.config.timezone);
        self.reply(ctx.chat_id, Reply::text(stats.render())).await
    }

    // ==================== OWNER ====================

    pub(super) async fn cmd_owner(&self, ctx: &Context) -> Result {
        let text = "👑 <b>Bot Owner Commands</b>\n\n\
                    • /status - Show bot status\n\
                    • /users - Show user statistics\n\
                    • /promote [user_id] [role] - Promote a user\n\
                    • /demote [user_id] - Demote a user";
        self.reply(ctx.chat_id, Reply::text(text)).await
    }

    pub(super) async fn cmd_status(&self, ctx: &Context) -> Result {
        let text = format!(
            "📊 <b>Bot Status</b>\n\n\
             • Total Users: {}\n\
             • Commands Processed: {}\n\
             • Uptime: {}",
            self.store.all_users().len(),
            self.store.command_count(),
            format::uptime(self.started_at.elapsed())
        );
        self.reply(ctx.chat_id, Reply::text(text)).await
    }

    // ==================== BUTTONS ====================

    pub(super) async fn dispatch_callback(&self, ctx: &Context, data: &str) -> Result {
        if let Some(field) = ProfileField::from_callback(data) {
            return self.profile_input(ctx, ProfileInput::Choose(field)).await;
        }
        if let Some(code) = data.strip_prefix("set_lang_") {
            return self.set_language(ctx, code).await;
        }
        match data {
            "edit_profile" => self.profile_input(ctx, ProfileInput::Edit).await,
            "back_to_profile" => self.profile_input(ctx, ProfileInput::Back).await,
            "back_to_menu" => {
                self.sessions.lock().await.remove(&(ctx.chat_id, ctx.user_id()));
                self.cmd_help(ctx).await
            }
            "start_chat" => self.cmd_chat(ctx).await,
            "give_feedback" => self.cmd_feedback(ctx).await,
            "settings" => self.cmd_settings(ctx).await,
            "toggle_notifications" => {
                self.change_settings(ctx, |s| s.notifications = !s.notifications).await
            }
            "toggle_digest" => self.change_settings(ctx, |s| s.daily_digest = !s.daily_digest).await,
            "cycle_theme" => self.change_settings(ctx, |s| s.theme = s.theme.next()).await,
            "user_management" => self.user_management(ctx).await,
            other => {
                debug!("Ignoring callback '{other}' from {}", ctx.user_id());
                Ok(())
            }
        }
    }

    async fn change_settings(&self, ctx: &Context, f: impl FnOnce(&mut Settings)) -> Result {
        let record = self.update_user(ctx.user_id(), |u| {
            f(&mut u.settings);
            u.clone()
        })?;
        self.show(ctx, settings_view(&record)).await
    }

    async fn user_management(&self, ctx: &Context) -> Result {
        if !ctx.access.moderator {
            return self
                .reply(ctx.chat_id, Reply::text("❌ This command is for moderators only."))
                .await;
        }
        let mut text = String::from(
            "👥 <b>User Management</b>\n\n\
             • /userinfo [user_id] - Show a user's information\n",
        );
        if ctx.access.admin {
            text.push_str(
                "• /users - List users\n\
                 • /promote [user_id] [role] - Promote a user\n\
                 • /demote [user_id] - Demote a user\n\
                 • /broadcast [message] - Message all users\n",
            );
        }
        let keyboard = Keyboard::new().button("🔙 Back to Menu", "back_to_menu");
        self.show(ctx, Reply::text(text).with_keyboard(keyboard)).await
    }

    // ==================== PROFILE CONVERSATION ====================

    /// Feed one input to the caller's profile conversation and act on the result.
    pub(super) async fn profile_input(&self, ctx: &Context, input: ProfileInput<'_>) -> Result {
        let key = (ctx.chat_id, ctx.user_id());
        let effect = {
            let mut sessions = self.sessions.lock().await;
            // "Edit" on a profile card from an earlier run starts a fresh session.
            let current = sessions.get(&key).copied().or(match input {
                ProfileInput::Edit => Some(ProfileState::Viewing),
                _ => None,
            });
            let (next, effect) = profile::step(current, input);
            match next {
                Some(state) => sessions.insert(key, state),
                None => sessions.remove(&key),
            };
            effect
        };

        match effect {
            ProfileEffect::ShowFieldPicker => {
                let keyboard = Keyboard::new()
                    .button("📝 Bio", "edit_bio")
                    .button("📍 Location", "edit_location")
                    .button("🎯 Interests", "edit_interests")
                    .button("🔙 Back to Profile", "back_to_profile");
                self.show(ctx, Reply::text("What would you like to edit?").with_keyboard(keyboard))
                    .await
            }
            ProfileEffect::Prompt(field) => self.show(ctx, Reply::text(field.prompt())).await,
            ProfileEffect::ShowProfile => self.show_profile(ctx).await,
            ProfileEffect::Rejected(e) => self.reply(ctx.chat_id, Reply::text(e.to_string())).await,
            ProfileEffect::Save(update) => {
                let confirmation = update.confirmation();
                let now = Utc::now();
                self.update_user(ctx.user_id(), |u| update.apply(&mut u.profile, now))?;
                info!("User {} updated their profile", ctx.user_id());
                self.reply(ctx.chat_id, Reply::text(confirmation)).await?;
                self.show_profile(ctx).await
            }
            ProfileEffect::Cancelled => {
                self.reply(ctx.chat_id, Reply::text("❌ Profile editing cancelled.")).await?;
                self.show_profile(ctx).await
            }
            ProfileEffect::Ignored => {
                debug!("Profile input ignored for {}", ctx.user_id());
                Ok(())
            }
        }
    }

    async fn show_profile(&self, ctx: &Context) -> Result {
        let record = self.user(ctx.user_id());
        let profile = &record.profile;
        let handle = if profile.username.is_empty() {
            String::new()
        } else {
            format!(" (@{})", escape(&profile.username))
        };
        let text = format!(
            "👤 <b>{}</b>{handle}\n\n\
             🆔 User ID: <code>{}</code>\n\
             📅 Member since: {}\n\
             🌐 Language: {}\n\
             📝 Bio: {}\n\
             📍 Location: {}\n\
             🎯 Interests: {}\n\
             📊 Messages sent: {}\n\
             📱 Last seen: {}",
            escape(&profile.full_name),
            ctx.user_id(),
            self.local(record.first_seen).format(DATE_FORMAT),
            record.language.to_uppercase(),
            or_not_set(&profile.bio),
            or_not_set(&profile.location),
            interests(&profile.interests),
            record.stats.messages_sent,
            self.local(record.last_seen).format(DATE_FORMAT),
        );
        let keyboard = Keyboard::new()
            .button("✏️ Edit Profile", "edit_profile")
            .button("🔙 Back to Menu", "back_to_menu");
        self.show(ctx, Reply::text(text).with_keyboard(keyboard)).await
    }
}

fn settings_view(record: &UserRecord) -> Reply {
    let settings = &record.settings;
    let text = format!(
        "⚙️ <b>Settings</b>\n\n\
         🔔 Notifications: {}\n\
         📰 Daily digest: {}\n\
         🎨 Theme: {}\n\
         🌐 Language: {}",
        on_off(settings.notifications),
        on_off(settings.daily_digest),
        settings.theme.as_str(),
        record.language.to_uppercase()
    );
    let keyboard = Keyboard::new()
        .button("🔔 Toggle notifications", "toggle_notifications")
        .button("📰 Toggle daily digest", "toggle_digest")
        .button("🎨 Change theme", "cycle_theme")
        .button("🔙 Back to Menu", "back_to_menu");
    Reply::text(text).with_keyboard(keyboard)
}

fn on_off(value: bool) -> &'static str {
    if value { "On" } else { "Off" }
}

fn or_not_set(value: &str) -> String {
    if value.is_empty() { "Not set".to_string() } else { escape(value) }
}

fn interests(list: &[String]) -> String {
    if list.is_empty() { "None".to_string() } else { escape(&list.join(", ")) }
}
