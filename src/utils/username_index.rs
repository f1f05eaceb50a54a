//! Registration-time username lookups that avoid a database round trip
//! whenever possible.
//!
//! A cuckoo filter answers "definitely free" for names it has never seen, a
//! TTL cache answers "taken" for names recently confirmed, and everything
//! else falls through to the `users` table.

use std::{
    sync::{PoisonError, RwLock},
    time::Duration,
};

use autoscale_cuckoo_filter::CuckooFilter;
use futures_util::StreamExt;
use moka::future::Cache;
use sqlx::MySqlPool;

use crate::{error::AppError, store::directory::Directory};

const FILTER_CAPACITY: usize = 100_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;
const CACHE_CAPACITY: u64 = 500_000;
const CACHE_TTL: Duration = Duration::from_secs(86_400);

#[inline]
fn normalize(username: &str) -> String {
    username.trim().to_lowercase()
}

pub struct UsernameIndex {
    filter: RwLock<CuckooFilter<String>>,
    taken: Cache<String, ()>,
}

impl Default for UsernameIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl UsernameIndex {
    pub fn new() -> Self {
        Self {
            filter: RwLock::new(CuckooFilter::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE)),
            taken: Cache::builder()
                .max_capacity(CACHE_CAPACITY)
                .time_to_live(CACHE_TTL)
                .build(),
        }
    }

    /// False positives possible, false negatives not.
    fn might_exist(&self, username: &str) -> bool {
        let username = normalize(username);
        self.filter
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&username)
    }

    fn add_to_filter<'a, I: IntoIterator<Item = &'a String>>(&self, usernames: I) {
        let mut filter = self.filter.write().unwrap_or_else(PoisonError::into_inner);
        for username in usernames {
            filter.add(username);
        }
    }

    pub async fn mark_taken(&self, username: &str) {
        let username = normalize(username);
        self.add_to_filter([&username]);
        self.taken.insert(username, ()).await;
    }

    /// Answer from memory alone, `None` when only the database can tell.
    async fn quick_answer(&self, username: &str) -> Option<bool> {
        if !self.might_exist(username) {
            return Some(true);
        }
        if self.taken.contains_key(&normalize(username)) {
            return Some(false);
        }
        None
    }

    /// `true` when nobody has registered `username` yet.
    pub async fn is_available(&self, username: &str, directory: &Directory) -> Result<bool, AppError> {
        let username = normalize(username);

        if let Some(answer) = self.quick_answer(&username).await {
            return Ok(answer);
        }

        let exists = directory.username_exists(&username).await?;
        if exists {
            self.mark_taken(&username).await;
        }
        Ok(!exists)
    }

    /// Streams every username into the filter.
    pub async fn warmup_filter(&self, pool: &MySqlPool, batch_size: usize) -> anyhow::Result<usize> {
        let mut stream = sqlx::query_scalar::<_, String>("SELECT username FROM users").fetch(pool);

        let mut batch = Vec::with_capacity(batch_size);
        let mut total = 0usize;

        while let Some(row) = stream.next().await {
            batch.push(normalize(&row?));
            total += 1;

            if batch.len() >= batch_size {
                self.add_to_filter(&batch);
                batch.clear();
            }
        }
        self.add_to_filter(&batch);

        tracing::info!(total, "Username filter warmup complete");
        Ok(total)
    }

    /// Caches users who logged in during the last `days` days.
    pub async fn warmup_cache(&self, pool: &MySqlPool, days: u32, batch_size: usize) -> anyhow::Result<usize> {
        let mut stream = sqlx::query_scalar::<_, String>(
            r#"
            SELECT username
            FROM users
            WHERE last_login_at >= NOW() - INTERVAL ? DAY
            ORDER BY last_login_at DESC
            "#,
        )
        .bind(days)
        .fetch(pool);

        let mut batch = Vec::with_capacity(batch_size);
        let mut total = 0usize;

        while let Some(row) = stream.next().await {
            batch.push(normalize(&row?));
            total += 1;

            if batch.len() >= batch_size {
                self.cache_batch(&mut batch).await;
            }
        }
        self.cache_batch(&mut batch).await;

        tracing::info!(total, days, "Username cache warmup complete");
        Ok(total)
    }

    async fn cache_batch(&self, batch: &mut Vec<String>) {
        let inserts: Vec<_> = batch.drain(..).map(|u| self.taken.insert(u, ())).collect();
        futures::future::join_all(inserts).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn unseen_names_are_free_without_database() {
        let index = UsernameIndex::new();
        assert_eq!(index.quick_answer("nobody").await, Some(true));
    }

    #[actix_web::test]
    async fn marked_names_are_taken_case_insensitively() {
        let index = UsernameIndex::new();
        index.mark_taken("An.Nguyen").await;

        let name = normalize(" an.nguyen ");
        assert!(index.might_exist(&name));
        assert_eq!(index.quick_answer(&name).await, Some(false));
    }

    #[actix_web::test]
    async fn filter_hit_without_cache_entry_needs_database() {
        let index = UsernameIndex::new();
        index.add_to_filter(&[String::from("ghost")]);
        assert_eq!(index.quick_answer("ghost").await, None);
    }
}
