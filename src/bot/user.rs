//! Persisted per-user state.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Messages needed for the `active_user` achievement.
const ACTIVE_USER_MESSAGES: u64 = 100;
/// Commands needed for the `power_user` achievement.
const POWER_USER_COMMANDS: u64 = 50;
/// Records created while the user base is smaller than this get `early_adopter`.
pub const EARLY_ADOPTER_LIMIT: usize = 100;

/// Stored role. Ordered: user < moderator < admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Moderator,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "user" => Some(Role::User),
            "moderator" | "mod" => Some(Role::Moderator),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single-step flow waiting for the user's next private text message.
///
/// Being an enum, at most one flow can be pending at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pending {
    #[default]
    None,
    AwaitingFeedback,
    AwaitingReminder,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub full_name: String,
    pub username: String,
    pub bio: String,
    pub location: String,
    pub interests: Vec<String>,
    pub preferred_topics: Vec<String>,
    pub last_activity: DateTime<Utc>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            full_name: String::new(),
            username: String::new(),
            bio: String::new(),
            location: String::new(),
            interests: Vec::new(),
            preferred_topics: Vec::new(),
            last_activity: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Privacy {
    pub show_last_seen: bool,
    pub show_join_date: bool,
    pub show_activity_stats: bool,
}

impl Default for Privacy {
    fn default() -> Self {
        Self {
            show_last_seen: true,
            show_join_date: true,
            show_activity_stats: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    System,
    Light,
    Dark,
}

impl Theme {
    pub fn next(self) -> Self {
        match self {
            Theme::System => Theme::Light,
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::System,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::System => "system",
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub notifications: bool,
    pub daily_digest: bool,
    pub privacy: Privacy,
    pub theme: Theme,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            notifications: true,
            daily_digest: false,
            privacy: Privacy::default(),
            theme: Theme::System,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stats {
    pub commands_used: u64,
    pub messages_sent: u64,
    pub media_sent: u64,
    pub stickers_sent: u64,
    pub voice_messages: u64,
    pub active_days: u32,
    pub last_command: Option<String>,
    pub last_command_time: Option<DateTime<Utc>>,
    pub favorite_commands: BTreeMap<String, u64>,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            commands_used: 0,
            messages_sent: 0,
            media_sent: 0,
            stickers_sent: 0,
            voice_messages: 0,
            active_days: 1,
            last_command: None,
            last_command_time: None,
            favorite_commands: BTreeMap::new(),
        }
    }
}

/// Fixed-window counter state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitState {
    pub count: u32,
    pub last_reset: DateTime<Utc>,
}

impl Default for RateLimitState {
    fn default() -> Self {
        Self {
            count: 0,
            last_reset: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Achievements {
    pub welcome: bool,
    pub early_adopter: bool,
    pub active_user: bool,
    pub feedback_provider: bool,
    pub power_user: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    pub referral_code: String,
    pub referred_by: String,
    pub devices: Vec<String>,
    pub timezone: String,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            referral_code: String::new(),
            referred_by: String::new(),
            devices: Vec::new(),
            timezone: "UTC".to_string(),
        }
    }
}

/// What kind of inbound message bumped the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Text,
    Media,
    Sticker,
    Voice,
}

/// Everything persisted for one platform user, keyed by the user ID string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserRecord {
    pub chat_mode: bool,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub message_count: u64,
    pub language: String,
    /// Derived from the allow-lists at creation only; authoritative afterwards.
    pub role: Role,
    pub profile: Profile,
    pub settings: Settings,
    pub stats: Stats,
    pub rate_limit: RateLimitState,
    pub achievements: Achievements,
    pub metadata: Metadata,
    /// Conversation marker kept apart from the profile data.
    pub pending: Pending,
}

impl Default for UserRecord {
    fn default() -> Self {
        Self::new(Role::User, "en", Utc::now())
    }
}

impl UserRecord {
    /// A fully populated record for a first-time user.
    pub fn new(role: Role, language: &str, now: DateTime<Utc>) -> Self {
        Self {
            chat_mode: false,
            first_seen: now,
            last_seen: now,
            message_count: 0,
            language: language.to_string(),
            role,
            profile: Profile {
                last_activity: now,
                ..Profile::default()
            },
            settings: Settings::default(),
            stats: Stats::default(),
            rate_limit: RateLimitState { count: 0, last_reset: now },
            achievements: Achievements::default(),
            metadata: Metadata::default(),
            pending: Pending::None,
        }
    }

    /// Record an inbound message: last seen, counters, active days.
    pub fn touch(&mut self, activity: Activity, now: DateTime<Utc>, tz: Tz) {
        if self.last_seen.with_timezone(&tz).date_naive() != now.with_timezone(&tz).date_naive() {
            self.stats.active_days += 1;
        }
        self.last_seen = now;
        self.message_count += 1;
        match activity {
            Activity::Text => self.stats.messages_sent += 1,
            Activity::Media => self.stats.media_sent += 1,
            Activity::Sticker => self.stats.stickers_sent += 1,
            Activity::Voice => self.stats.voice_messages += 1,
        }
        if self.stats.messages_sent >= ACTIVE_USER_MESSAGES {
            self.achievements.active_user = true;
        }
    }

    /// Record a dispatched command.
    pub fn record_command(&mut self, command: &str, now: DateTime<Utc>) {
        self.stats.commands_used += 1;
        self.stats.last_command = Some(command.to_string());
        self.stats.last_command_time = Some(now);
        *self.stats.favorite_commands.entry(command.to_string()).or_insert(0) += 1;
        if self.stats.commands_used >= POWER_USER_COMMANDS {
            self.achievements.power_user = true;
        }
    }

    /// Fill name fields from the platform account when the profile has none yet.
    ///
    /// Returns true if anything changed.
    pub fn fill_identity(&mut self, full_name: &str, username: Option<&str>, now: DateTime<Utc>) -> bool {
        if !self.profile.full_name.is_empty() {
            return false;
        }
        self.profile.full_name = full_name.trim().to_string();
        self.profile.username = username.unwrap_or_default().to_string();
        self.profile.last_activity = now;
        true
    }

    /// The user's most used command, if any.
    pub fn favorite_command(&self) -> Option<(&str, u64)> {
        self.stats
            .favorite_commands
            .iter()
            .max_by_key(|(_, count)| **count)
            .map(|(name, count)| (name.as_str(), *count))
    }
}
