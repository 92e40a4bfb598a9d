use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tokio::sync::Mutex;
use tracing::info;

use crate::platform::ChatContext;
use crate::stores::BirthdayStore;

/// Who has already been congratulated, reset when the date changes
#[derive(Default)]
struct Congratulated {
    date: Option<NaiveDate>,
    users: HashSet<String>,
}

/// Congratulates a sender on their birthday, once per day per platform.
pub struct BirthdayGreeter {
    store: Arc<dyn BirthdayStore>,
    congratulated: Mutex<Congratulated>,
}

impl BirthdayGreeter {
    pub fn new(store: Arc<dyn BirthdayStore>) -> Self {
        Self {
            store,
            congratulated: Mutex::new(Congratulated::default()),
        }
    }

    /// Send a greeting if today is the sender's birthday and they have not
    /// been greeted yet. Returns whether a greeting was sent.
    pub async fn greet_if_birthday(&self, ctx: &ChatContext, today: NaiveDate) -> Result<bool> {
        let username = ctx.username.to_lowercase();
        let birthdays = self.store.birthdays_on(today).await?;
        if !birthdays.contains(&username) {
            return Ok(false);
        }

        {
            let mut congratulated = self.congratulated.lock().await;
            if congratulated.date != Some(today) {
                congratulated.date = Some(today);
                congratulated.users.clear();
            }
            if !congratulated.users.insert(username) {
                return Ok(false);
            }
        }

        info!(platform = %ctx.platform(), username = %ctx.username, "Sending birthday greeting");
        let text = format!("С днём рождения, {}! 🎉", ctx.format.bold(&ctx.username));
        ctx.send_message(&text)
            .await
            .context("Failed to send birthday greeting")?;
        Ok(true)
    }
}
