//! Subscriber cache: job name -> subscriber document names
//!
//! Owned by one long-lived [`WatchListStore`](crate::WatchListStore)
//! instance; mutation happens only through the explicit populate,
//! invalidate, add and remove operations.

use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct SubscriberCache {
    subscribers: HashMap<String, Vec<String>>,
}

impl SubscriberCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached subscriber list for a job.
    pub fn populate(&mut self, job_name: &str, subscribers: Vec<String>) {
        self.subscribers.insert(job_name.to_string(), subscribers);
    }

    /// Drop a job's entry entirely.
    pub fn invalidate(&mut self, job_name: &str) {
        self.subscribers.remove(job_name);
    }

    /// Cached subscribers for a job; empty when the job is unknown.
    pub fn subscribers(&self, job_name: &str) -> &[String] {
        self.subscribers.get(job_name).map_or(&[], Vec::as_slice)
    }

    /// Add one subscriber to an already-cached job. Unknown jobs are
    /// ignored, they get a full populate when discovered.
    pub fn add(&mut self, job_name: &str, subscriber: &str) {
        if let Some(list) = self.subscribers.get_mut(job_name) {
            if !list.iter().any(|s| s == subscriber) {
                list.push(subscriber.to_string());
            }
        }
    }

    /// Remove one subscriber from an already-cached job.
    pub fn remove(&mut self, job_name: &str, subscriber: &str) {
        if let Some(list) = self.subscribers.get_mut(job_name) {
            list.retain(|s| s != subscriber);
        }
    }

    pub fn jobs(&self) -> Vec<&str> {
        self.subscribers.keys().map(String::as_str).collect()
    }
}
