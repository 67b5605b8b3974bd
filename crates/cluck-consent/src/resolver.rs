//! The permission resolution heuristic
//!
//! Resolution rules, in the order they can fire:
//!
//! - the prompt answers: granted is `Allowed`, refused is `Denied`;
//! - a status poll sees `Authorized` or `Denied`;
//! - the app goes to background and comes back while the status is still
//!   undetermined and the dismissal window has not elapsed: `Skipped`.
//!
//! A round trip after the window has elapsed keeps polling, so a slow
//! decision is not mistaken for a dismissal.

use crate::authority::{NotificationAuthority, RemoteRegistrar};
use crate::lifecycle::{LifecycleEvent, LifecycleEvents};
use cluck_core::types::{AuthorizationStatus, ConsentOutcome};
use cluck_core::{ConsentConfig, SharedFlags};
use std::sync::PoisonError;
use tokio::time::{Instant, MissedTickBehavior};

type SettledHandler = Box<dyn Fn(ConsentOutcome) + Send>;

/// Obtains a terminal consent outcome for push notifications
pub struct PermissionResolver<A, R> {
    authority: A,
    registrar: R,
    flags: SharedFlags,
    lifecycle: LifecycleEvents,
    settings: ConsentConfig,
    outcome: ConsentOutcome,
    on_settled: Option<SettledHandler>,
}

impl<A, R> PermissionResolver<A, R>
where
    A: NotificationAuthority,
    R: RemoteRegistrar,
{
    /// Create a resolver, picking up an outcome persisted by an earlier run
    pub fn new(
        authority: A,
        registrar: R,
        flags: SharedFlags,
        lifecycle: LifecycleEvents,
        settings: &ConsentConfig,
    ) -> Self {
        let outcome = flags
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .consent_outcome();
        if outcome.is_terminal() {
            log::info!("Push consent already resolved: {:?}", outcome);
        }

        Self {
            authority,
            registrar,
            flags,
            lifecycle,
            settings: settings.clone(),
            outcome,
            on_settled: None,
        }
    }

    /// Register the listener notified when the outcome is settled
    pub fn with_settled_handler(
        mut self,
        handler: impl Fn(ConsentOutcome) + Send + 'static,
    ) -> Self {
        self.on_settled = Some(Box::new(handler));
        self
    }

    pub fn outcome(&self) -> ConsentOutcome {
        self.outcome
    }

    pub fn is_resolved(&self) -> bool {
        self.outcome.is_terminal()
    }

    /// Resolve the outcome, prompting only if no terminal outcome exists.
    ///
    /// An already resolved outcome is signalled again so callers waiting on
    /// the settled handler still progress.
    pub async fn request_if_needed(&mut self) -> ConsentOutcome {
        if self.outcome.is_terminal() {
            self.notify_settled();
            return self.outcome;
        }

        let outcome = self.await_resolution().await;
        self.finish(outcome);
        self.outcome
    }

    /// Forget the outcome, in memory and on disk
    pub fn reset(&mut self) {
        let mut flags = self.flags.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = flags.clear_consent_outcome() {
            log::error!("Failed to clear persisted push consent: {}", e);
        }
        self.outcome = ConsentOutcome::Unknown;
        log::info!("Push consent reset");
    }

    /// Prompt and observe until a terminal outcome is known. The lifecycle
    /// subscription and the poll timer live only as long as this future.
    async fn await_resolution(&self) -> ConsentOutcome {
        let mut lifecycle = self.lifecycle.subscribe();
        let mut lifecycle_open = true;
        let mut went_background = false;

        let requested_at = Instant::now();
        let prompt = self.authority.request_authorization();
        tokio::pin!(prompt);
        let mut prompt_pending = true;
        log::info!("Push permission prompt issued");

        let period = self.settings.poll_interval();
        let mut poll = tokio::time::interval_at(requested_at + period, period);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                answer = &mut prompt, if prompt_pending => {
                    prompt_pending = false;
                    match answer {
                        Ok(true) => return ConsentOutcome::Allowed,
                        Ok(false) => return ConsentOutcome::Denied,
                        Err(e) => log::warn!("Permission prompt failed, still waiting: {}", e),
                    }
                }
                event = lifecycle.next(), if lifecycle_open => match event {
                    Some(LifecycleEvent::Background) => went_background = true,
                    Some(LifecycleEvent::Foreground) if went_background => {
                        went_background = false;
                        let delay = self.settings.foreground_check_delay();
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }

                        if let Some(outcome) = self.poll_status().await {
                            return outcome;
                        }
                        let elapsed = requested_at.elapsed();
                        if elapsed < self.settings.dismissal_window() {
                            log::info!("Prompt left undecided after {:?}, treating as skipped", elapsed);
                            return ConsentOutcome::Skipped;
                        }
                        log::debug!("Still undetermined after {:?}, polling on", elapsed);
                    }
                    Some(LifecycleEvent::Foreground) => {}
                    None => lifecycle_open = false,
                },
                _ = poll.tick() => {
                    if let Some(outcome) = self.poll_status().await {
                        return outcome;
                    }
                }
            }
        }
    }

    /// Terminal outcome implied by the current status, if any
    async fn poll_status(&self) -> Option<ConsentOutcome> {
        let status = match self.authority.authorization_status().await {
            Ok(status) => status,
            Err(e) => {
                log::warn!("Permission status query failed: {}", e);
                AuthorizationStatus::NotDetermined
            }
        };

        match status {
            AuthorizationStatus::Authorized => Some(ConsentOutcome::Allowed),
            AuthorizationStatus::Denied => Some(ConsentOutcome::Denied),
            AuthorizationStatus::NotDetermined => None,
        }
    }

    fn finish(&mut self, outcome: ConsentOutcome) {
        if self.outcome.is_terminal() || !outcome.is_terminal() {
            return;
        }

        self.outcome = outcome;
        log::info!("Push consent resolved: {:?}", outcome);

        {
            let mut flags = self.flags.lock().unwrap_or_else(PoisonError::into_inner);
            if let Err(e) = flags.set_consent_outcome(outcome) {
                log::error!("Failed to persist push consent: {}", e);
            }
        }

        if outcome == ConsentOutcome::Allowed {
            self.registrar.register_for_remote_notifications();
        }

        self.notify_settled();
    }

    fn notify_settled(&self) {
        if let Some(handler) = &self.on_settled {
            handler(self.outcome);
        }
    }
}
