//! Rate Limiter
//!
//! Per-device sliding window over accepted command timestamps.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

fn default_max_commands() -> usize {
    10
}

fn default_window_secs() -> f64 {
    60.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Commands allowed per device inside the window; 0 disables limiting
    #[serde(default = "default_max_commands")]
    pub max_commands: usize,
    #[serde(default = "default_window_secs")]
    pub window_secs: f64,
}

impl RateLimitConfig {
    pub fn new(max_commands: usize, window: Duration) -> Self {
        Self {
            max_commands,
            window_secs: window.as_secs_f64(),
        }
    }

    pub fn window(&self) -> Duration {
        Duration::try_from_secs_f64(self.window_secs.max(0.0)).unwrap_or(Duration::ZERO)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_commands: default_max_commands(),
            window_secs: default_window_secs(),
        }
    }
}

/// Rejection details when a device is over its limit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitExceeded {
    pub count: usize,
    pub limit: usize,
    pub window: Duration,
}

pub struct RateLimiter {
    config: RateLimitConfig,
    history: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            history: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.max_commands > 0
    }

    /// Check the window for `device_id` and record `now` if there is room.
    /// Check and record happen under one lock.
    pub fn try_acquire(&self, device_id: &str, now: Instant) -> Result<(), RateLimitExceeded> {
        if !self.is_enabled() {
            return Ok(());
        }

        let window = self.config.window();
        let mut history = self.lock_history();
        let entries = history.entry(device_id.to_string()).or_default();
        Self::prune(entries, now, window);

        if entries.len() >= self.config.max_commands {
            return Err(RateLimitExceeded {
                count: entries.len(),
                limit: self.config.max_commands,
                window,
            });
        }
        entries.push_back(now);
        Ok(())
    }

    /// Commands recorded for `device_id` inside the window ending at `now`
    pub fn count_at(&self, device_id: &str, now: Instant) -> usize {
        let window = self.config.window();
        let mut history = self.lock_history();
        match history.get_mut(device_id) {
            Some(entries) => {
                Self::prune(entries, now, window);
                entries.len()
            }
            None => 0,
        }
    }

    pub fn count(&self, device_id: &str) -> usize {
        self.count_at(device_id, Instant::now())
    }

    /// Devices with any recorded history, sorted
    pub fn tracked_devices(&self) -> Vec<String> {
        let mut devices: Vec<String> = self
            .lock_history()
            .iter()
            .filter(|(_, entries)| !entries.is_empty())
            .map(|(device, _)| device.clone())
            .collect();
        devices.sort();
        devices
    }

    pub fn clear_device(&self, device_id: &str) {
        self.lock_history().remove(device_id);
    }

    pub fn clear_all(&self) {
        self.lock_history().clear();
    }

    fn prune(entries: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(oldest) = entries.front() {
            if now.saturating_duration_since(*oldest) >= window {
                entries.pop_front();
            } else {
                break;
            }
        }
    }

    fn lock_history(&self) -> std::sync::MutexGuard<'_, HashMap<String, VecDeque<Instant>>> {
        self.history.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}
