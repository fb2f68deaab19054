use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::ifctl::InterfaceControl;
use crate::rule::Rule;
use crate::store::RuleStore;
use crate::window::{local_now, should_block};

/// The enforcement loop and its supervised rule watcher.
///
/// Clones share state; the run flag and the held rule are the only shared
/// mutable values and every access goes through their locks. The rule is
/// always replaced wholesale under its lock, never field by field, so a
/// tick can never observe a half-updated window.
#[derive(Clone)]
pub struct Controller {
    rule: Arc<Mutex<Rule>>,
    running: Arc<Mutex<bool>>,
    store: Arc<RuleStore>,
    interfaces: Arc<dyn InterfaceControl>,
    tick_interval: Duration,
    watch_interval: Duration,
    tick_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Controller {
    pub fn new(
        initial_rule: Rule,
        store: Arc<RuleStore>,
        interfaces: Arc<dyn InterfaceControl>,
        tick_interval: Duration,
        watch_interval: Duration,
    ) -> Self {
        Self {
            rule: Arc::new(Mutex::new(initial_rule)),
            running: Arc::new(Mutex::new(false)),
            store,
            interfaces,
            tick_interval,
            watch_interval,
            tick_task: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the enforcement loop and its rule watcher.
    ///
    /// Idempotent: a no-op while already running, so concurrent callers can
    /// never leak a duplicate tick loop.
    pub async fn start(&self) {
        {
            let mut running = self.running.lock().await;
            if *running {
                debug!("Enforcement loop already running");
                return;
            }
            *running = true;
        }

        let baseline = *self.rule.lock().await;
        info!(
            "Starting enforcement loop (window {} - {}{})",
            baseline.start,
            baseline.end,
            if baseline.is_sentinel() {
                ", no restriction"
            } else {
                ""
            }
        );

        let tick = tokio::spawn(Self::run_ticks(self.clone()));
        *self.tick_task.lock().await = Some(tick);

        tokio::spawn(Self::run_watcher(self.clone(), baseline));
    }

    /// Request the loop to stop.
    ///
    /// Cooperative: the tick task observes the flag at the top of its next
    /// iteration; a tick already in flight is never interrupted.
    pub async fn stop(&self) {
        let mut running = self.running.lock().await;
        if *running {
            *running = false;
            info!("Stopping enforcement loop");
        }
    }

    pub async fn is_running(&self) -> bool {
        *self.running.lock().await
    }

    /// Snapshot of the currently held rule
    pub async fn current_rule(&self) -> Rule {
        *self.rule.lock().await
    }

    async fn run_ticks(this: Controller) {
        let mut interval = tokio::time::interval(this.tick_interval);

        loop {
            interval.tick().await;

            if !*this.running.lock().await {
                debug!("Enforcement loop exited");
                break;
            }

            let rule = *this.rule.lock().await;
            if rule.is_sentinel() {
                // Rule disabled: interfaces are left in whatever state they are
                continue;
            }

            let block = should_block(rule, local_now());
            this.drive_interfaces(block);
        }
    }

    /// Drive every managed interface toward the decided state.
    ///
    /// Only currently-enabled interfaces are disabled and only
    /// currently-disabled ones are enabled, so repeating a decision is a
    /// harmless no-op. Failures are logged and retried on the next tick.
    fn drive_interfaces(&self, block: bool) {
        let interfaces = match self.interfaces.list() {
            Ok(list) => list,
            Err(e) => {
                warn!("Failed to enumerate interfaces, retrying next tick: {:#}", e);
                return;
            }
        };

        for iface in interfaces {
            let enabled = match self.interfaces.is_enabled(&iface) {
                Ok(enabled) => enabled,
                Err(e) => {
                    warn!("Failed to query state of {}: {:#}", iface.name, e);
                    continue;
                }
            };

            let result = if block && enabled {
                info!("Blocking window active, disabling {}", iface.name);
                self.interfaces.disable(&iface)
            } else if !block && !enabled {
                info!("Blocking window inactive, enabling {}", iface.name);
                self.interfaces.enable(&iface)
            } else {
                Ok(())
            };

            if let Err(e) = result {
                warn!("Failed to toggle {}: {:#}", iface.name, e);
            }
        }
    }

    /// Poll the store for rule changes while the loop runs.
    ///
    /// Compares each snapshot against the rule the current loop was started
    /// with; on a change this watcher performs the hot-swap once and exits,
    /// leaving the restarted loop to spawn its own watcher with the new
    /// baseline. The future is boxed because the restart path spawns a new
    /// watcher from inside this one.
    fn run_watcher(this: Controller, baseline: Rule) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async move {
            loop {
                tokio::time::sleep(this.watch_interval).await;

                if !*this.running.lock().await {
                    debug!("Rule watcher exited");
                    break;
                }

                let current = this.store.load();
                if current == baseline {
                    continue;
                }

                if current == *this.rule.lock().await {
                    // A restart already installed this rule; the watcher it
                    // spawned owns polling now
                    debug!("Rule watcher baseline is stale, handing off");
                    break;
                }

                info!(
                    "Rule changed on disk ({} - {} => {} - {}), restarting enforcement",
                    baseline.start, baseline.end, current.start, current.end
                );
                this.hot_swap(current).await;
                break;
            }
        })
    }

    /// Stop, swap the held rule wholesale, and start again.
    ///
    /// The old tick task is awaited to completion before the rule is
    /// replaced, so no tick ever runs against a mix of old and new fields
    /// and no two tick loops overlap.
    async fn hot_swap(&self, new_rule: Rule) {
        self.stop().await;

        if let Some(handle) = self.tick_task.lock().await.take() {
            if let Err(e) = handle.await {
                error!("Enforcement tick task failed: {}", e);
            }
        }

        *self.rule.lock().await = new_rule;
        self.start().await;
    }
}
