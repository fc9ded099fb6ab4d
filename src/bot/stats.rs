//! Aggregates over the user mapping: daily digest and /users summary.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::bot::format::escape;
use crate::bot::store::UserMap;
use crate::bot::user::Role;

const RECENT_USERS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyStats {
    pub total: usize,
    pub new_today: usize,
    pub active_today: usize,
    pub total_messages: u64,
}

impl DailyStats {
    /// Count against the calendar day of `now` in `tz`.
    pub fn compute(users: &UserMap, now: DateTime<Utc>, tz: Tz) -> Self {
        let today = local_date(now, tz);
        Self {
            total: users.len(),
            new_today: users.values().filter(|u| local_date(u.first_seen, tz) == today).count(),
            active_today: users.values().filter(|u| local_date(u.last_seen, tz) == today).count(),
            total_messages: users.values().map(|u| u.stats.messages_sent).sum(),
        }
    }

    pub fn render(&self) -> String {
        format!(
            "📊 <b>Daily Statistics</b>\n\n\
             • Total users: {}\n\
             • New users today: {}\n\
             • Active users today: {}\n\
             • Total messages today: {}",
            self.total, self.new_today, self.active_today, self.total_messages
        )
    }
}

/// Role counts plus the most recently joined users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSummary {
    pub total: usize,
    pub admins: usize,
    pub moderators: usize,
    pub regular: usize,
    /// `(id, first_seen, username, role)`, newest first.
    pub recent: Vec<(String, DateTime<Utc>, String, Role)>,
}

impl UserSummary {
    pub fn compute(users: &UserMap) -> Self {
        let admins = users.values().filter(|u| u.role == Role::Admin).count();
        let moderators = users.values().filter(|u| u.role == Role::Moderator).count();

        let mut recent: Vec<_> = users
            .iter()
            .map(|(id, u)| (id.clone(), u.first_seen, u.profile.username.clone(), u.role))
            .collect();
        recent.sort_by(|a, b| b.1.cmp(&a.1));
        recent.truncate(RECENT_USERS);

        Self {
            total: users.len(),
            admins,
            moderators,
            regular: users.len() - admins - moderators,
            recent,
        }
    }

    pub fn render(&self, tz: Tz) -> String {
        let mut text = format!(
            "👥 <b>User Statistics</b>\n\n\
             • Total Users: {}\n\
             • Administrators: {}\n\
             • Moderators: {}\n\
             • Regular Users: {}\n\n\
             🕐 <b>Recent Users:</b>\n",
            self.total, self.admins, self.moderators, self.regular
        );
        for (id, first_seen, username, role) in &self.recent {
            let username = if username.is_empty() { "N/A" } else { username };
            text.push_str(&format!(
                "• {} - {} (ID: {}) - {}\n",
                first_seen.with_timezone(&tz).format("%Y-%m-%d"),
                escape(username),
                id,
                role
            ));
        }
        text
    }
}

fn local_date(at: DateTime<Utc>, tz: Tz) -> NaiveDate {
    at.with_timezone(&tz).date_naive()
}
