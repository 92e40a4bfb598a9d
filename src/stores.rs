//! Application stores the core talks to through narrow traits, plus the
//! in-memory implementations the binary runs with.

use std::collections::{BTreeSet, HashMap};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use tokio::sync::RwLock;

#[async_trait]
pub trait CensorWordStore: Send + Sync {
    /// Returns `false` if the word was already censored
    async fn add_word(&self, word: &str) -> Result<bool>;
    /// Returns `false` if the word was not censored
    async fn remove_word(&self, word: &str) -> Result<bool>;
    async fn words(&self) -> Result<Vec<String>>;
}

#[derive(Default)]
pub struct InMemoryCensorWords {
    words: RwLock<BTreeSet<String>>,
}

impl InMemoryCensorWords {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            words: RwLock::new(words.into_iter().map(|w| normalize(w.as_ref())).collect()),
        }
    }
}

fn normalize(word: &str) -> String {
    word.trim().to_lowercase()
}

#[async_trait]
impl CensorWordStore for InMemoryCensorWords {
    async fn add_word(&self, word: &str) -> Result<bool> {
        Ok(self.words.write().await.insert(normalize(word)))
    }

    async fn remove_word(&self, word: &str) -> Result<bool> {
        Ok(self.words.write().await.remove(&normalize(word)))
    }

    async fn words(&self) -> Result<Vec<String>> {
        Ok(self.words.read().await.iter().cloned().collect())
    }
}

#[async_trait]
pub trait BirthdayStore: Send + Sync {
    /// Lower-cased usernames whose birthday falls on `date`
    async fn birthdays_on(&self, date: NaiveDate) -> Result<Vec<String>>;
}

/// Birthdays keyed by (month, day); the year is ignored.
#[derive(Debug, Default)]
pub struct InMemoryBirthdays {
    by_day: HashMap<(u32, u32), Vec<String>>,
}

impl InMemoryBirthdays {
    /// Build from `username → "MM-DD"` pairs.
    pub fn from_config(entries: &HashMap<String, String>) -> Result<Self> {
        let mut by_day: HashMap<(u32, u32), Vec<String>> = HashMap::new();
        for (username, date) in entries {
            let day = parse_month_day(date)
                .with_context(|| format!("Invalid birthday for {}: {}", username, date))?;
            by_day.entry(day).or_default().push(username.to_lowercase());
        }
        for names in by_day.values_mut() {
            names.sort();
        }
        Ok(Self { by_day })
    }
}

fn parse_month_day(text: &str) -> Option<(u32, u32)> {
    let (month, day) = text.trim().split_once('-')?;
    let (month, day) = (month.parse().ok()?, day.parse().ok()?);
    // 2000 is a leap year, so 02-29 is accepted
    NaiveDate::from_ymd_opt(2000, month, day)?;
    Some((month, day))
}

#[async_trait]
impl BirthdayStore for InMemoryBirthdays {
    async fn birthdays_on(&self, date: NaiveDate) -> Result<Vec<String>> {
        Ok(self
            .by_day
            .get(&(date.month(), date.day()))
            .cloned()
            .unwrap_or_default())
    }
}
