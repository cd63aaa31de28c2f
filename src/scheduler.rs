// Copyright 2026 Storysearch Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Periodic background driver for [`IndexUpdater`].

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;
use std::time::Instant;

use anyhow::Context;
use anyhow::Result;
use tracing::error;
use tracing::info;

use crate::config::DEFAULT_LOCALE;
use crate::updater::IndexUpdater;

const STOP_POLL: Duration = Duration::from_millis(100);

/// Result of one locale within a pass.
#[derive(Debug)]
pub struct LocaleOutcome {
    pub locale: String,
    pub result: Result<Option<usize>>,
}

pub struct IndexScheduler {
    updater: Arc<IndexUpdater>,
    locales: Vec<String>,
    tick: Duration,
    interval: Duration,
}

impl IndexScheduler {
    pub fn new(updater: Arc<IndexUpdater>, locales: Vec<String>) -> Self {
        let locales = if locales.is_empty() {
            vec![DEFAULT_LOCALE.to_string()]
        } else {
            locales
        };
        Self {
            updater,
            locales,
            tick: Duration::from_secs(3),
            interval: Duration::from_secs(3600),
        }
    }

    pub fn with_timing(mut self, tick: Duration, interval: Duration) -> Self {
        self.tick = tick.max(Duration::from_millis(1));
        self.interval = interval;
        self
    }

    pub fn locales(&self) -> &[String] {
        &self.locales
    }

    /// Updates every locale once, in order. A failing locale is logged and
    /// does not stop the others.
    pub fn run_once(&self) -> Vec<LocaleOutcome> {
        let mut outcomes = Vec::with_capacity(self.locales.len());
        for locale in &self.locales {
            self.updater.source().invalidate(locale);
            let result = self.updater.update_index(locale);
            match &result {
                Ok(Some(docs)) => info!(locale = %locale, docs, "scheduled update rebuilt index"),
                Ok(None) => info!(locale = %locale, "scheduled update found index current"),
                Err(err) => error!(locale = %locale, error = %format!("{err:#}"), "scheduled update failed"),
            }
            outcomes.push(LocaleOutcome {
                locale: locale.clone(),
                result,
            });
        }
        outcomes
    }

    /// Runs passes until `stop` is set: wakes every tick, starts a pass when
    /// at least one interval has elapsed since the previous pass started.
    pub fn run(&self, stop: &AtomicBool) {
        info!(locales = ?self.locales, interval_secs = self.interval.as_secs(), "scheduler started");
        let mut last_run: Option<Instant> = None;
        while !stop.load(Ordering::SeqCst) {
            let due = last_run.is_none_or(|at| at.elapsed() >= self.interval);
            if due {
                let started = Instant::now();
                self.run_once();
                last_run = Some(started);
            }
            sleep_unless_stopped(self.tick, stop);
        }
        info!("scheduler stopped");
    }

    pub fn spawn(self) -> Result<SchedulerHandle> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let thread = thread::Builder::new()
            .name("storysearch-scheduler".to_string())
            .spawn(move || self.run(&flag))
            .context("spawn scheduler thread")?;
        Ok(SchedulerHandle {
            stop,
            thread: Some(thread),
        })
    }
}

fn sleep_unless_stopped(duration: Duration, stop: &AtomicBool) {
    let deadline = Instant::now() + duration;
    while !stop.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::sleep((deadline - now).min(STOP_POLL));
    }
}

/// Stops the background scheduler when dropped.
pub struct SchedulerHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    /// Blocks until the scheduler exits (after its stop flag is set).
    pub fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
