//! Background jobs: one-shot reminders and the cron-driven daily digest.

use chrono::Utc;
use chrono_tz::Tz;
use cron::Schedule;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::bot::format::escape;
use crate::bot::messenger::{Messenger, Reply};

/// Text delivered when a reminder fires.
pub fn reminder_text(message: &str) -> String {
    format!("🔔 <b>Reminder</b>: {}", escape(message))
}

/// Spawns timed deliveries. Jobs live only as long as the process.
#[derive(Clone)]
pub struct JobScheduler {
    messenger: Arc<dyn Messenger>,
}

impl JobScheduler {
    pub fn new(messenger: Arc<dyn Messenger>) -> Self {
        Self { messenger }
    }

    /// Deliver `message` to `chat_id` after `delay`.
    pub fn schedule_reminder(&self, delay: Duration, chat_id: i64, message: String) -> JoinHandle<()> {
        let messenger = self.messenger.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match messenger.send(chat_id, &Reply::text(reminder_text(&message))).await {
                Ok(_) => info!("Sent reminder to {chat_id}"),
                Err(e) => warn!("Failed to send reminder to {chat_id}: {e}"),
            }
        })
    }

    /// Run `job` at every upcoming time of `schedule`, evaluated in `tz`.
    pub fn spawn_daily<F, Fut>(&self, schedule: Schedule, tz: Tz, job: F) -> JoinHandle<()>
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        tokio::spawn(async move {
            loop {
                let now = Utc::now().with_timezone(&tz);
                let Some(next) = schedule.after(&now).next() else {
                    warn!("Digest schedule has no upcoming time, stopping");
                    return;
                };
                let wait = (next.with_timezone(&Utc) - Utc::now()).to_std().unwrap_or_default();
                info!("Next digest at {next}");
                tokio::time::sleep(wait).await;
                job().await;
            }
        })
    }
}
