//! Hourly delivery loop.
//!
//! `WAITING_FOR_CLOCK -> DELIVERING -> WAITING_FOR_CLOCK`, for the life of the process:
//! - every poll interval, compare the current UTC hour with the hour of the last round
//! - on a new hour, pick one shared post and send it to every connected destination
//! - a destination that already saw the shared post gets its own fresh post instead
//! - the shared post is recorded under the `all` scope once every destination is done

use std::{sync::Arc, time::Duration};

use chrono::{Timelike, Utc};
use tokio_util::sync::CancellationToken;

use crate::{
    domain::{DestinationId, Scope},
    errors::Error,
    formatting::PostMessage,
    messaging::port::MessagingPort,
    posts::PostService,
    Result,
};

/// Source of the current hour (0..=23).
pub trait Clock: Send + Sync {
    fn current_hour(&self) -> u32;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct UtcClock;

impl Clock for UtcClock {
    fn current_hour(&self) -> u32 {
        Utc::now().hour()
    }
}

/// True when `current` is a later hour than `stored`.
///
/// From 23 the next hour is 0, so any hour below 23 counts as the next one.
pub fn is_scheduled_time(current: u32, stored: u32) -> bool {
    if stored == 23 {
        current < 23
    } else {
        current > stored
    }
}

/// Hour of the last delivery round. Owned by the loop task.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScheduleState {
    stored_hour: Option<u32>,
}

impl ScheduleState {
    pub fn stored_hour(&self) -> Option<u32> {
        self.stored_hour
    }

    /// No round yet means deliver right away.
    pub fn is_due(&self, current: u32) -> bool {
        match self.stored_hour {
            None => true,
            Some(stored) => is_scheduled_time(current, stored),
        }
    }

    pub fn mark(&mut self, hour: u32) {
        self.stored_hour = Some(hour);
    }
}

/// Outcome of one round.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoundReport {
    pub shared_post_id: String,
    /// Destinations that got the shared post.
    pub shared: usize,
    /// Destinations that got their own post because they had already seen the shared one.
    pub substituted: usize,
    /// Destinations with no channel the bot may post in.
    pub skipped: Vec<DestinationId>,
    /// Destinations whose send failed; the rest of the round still ran.
    pub failed: Vec<DestinationId>,
}

/// One `DELIVERING` pass. Runs to completion; the round lock is held throughout.
///
/// Selection and store errors end the round. A failed send only costs that destination.
/// The shared post is recorded under `all` unless every attempt to send it failed.
pub async fn deliver_round(
    service: &PostService,
    messenger: &dyn MessagingPort,
) -> Result<RoundReport> {
    let _round = service.lock_round().await;

    let shared = service.pick_shared().await?;
    let shared_msg = PostMessage::from(&shared);
    let mut report = RoundReport {
        shared_post_id: shared.id.clone(),
        ..Default::default()
    };
    let mut shared_attempts = 0usize;

    for destination in messenger.destinations().await? {
        let Some(channel) = destination.delivery_target() else {
            let err = Error::MissingDeliveryTarget(destination.id);
            tracing::warn!(
                destination = %destination.id,
                name = %destination.name,
                "{err}; skipping"
            );
            report.skipped.push(destination.id);
            continue;
        };

        // The shared pick was computed before looking at each destination; repair here.
        if service.store().is_used(&shared.id).await? {
            let own = service.pick_for(destination.id).await?;
            tracing::info!(
                destination = %destination.id,
                shared = %shared.id,
                substitute = %own.id,
                "destination already saw the shared post; sending a fresh one"
            );
            match messenger.send_post(channel.id, &PostMessage::from(&own)).await {
                Ok(()) => report.substituted += 1,
                Err(e) => {
                    tracing::error!(
                        destination = %destination.id,
                        post = %own.id,
                        "delivery failed: {e}"
                    );
                    report.failed.push(destination.id);
                }
            }
            continue;
        }

        shared_attempts += 1;
        match messenger.send_post(channel.id, &shared_msg).await {
            Ok(()) => report.shared += 1,
            Err(e) => {
                tracing::error!(
                    destination = %destination.id,
                    post = %shared.id,
                    "delivery failed: {e}"
                );
                report.failed.push(destination.id);
            }
        }
    }

    if shared_attempts > 0 && report.shared == 0 {
        tracing::warn!(post = %shared.id, "shared post reached no destination; not recording it");
        return Ok(report);
    }
    service.store().record(&shared.id, Scope::All).await?;
    Ok(report)
}

pub struct DeliveryLoop {
    service: Arc<PostService>,
    messenger: Arc<dyn MessagingPort>,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    state: ScheduleState,
}

impl DeliveryLoop {
    pub fn new(
        service: Arc<PostService>,
        messenger: Arc<dyn MessagingPort>,
        clock: Arc<dyn Clock>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            service,
            messenger,
            clock,
            poll_interval,
            state: ScheduleState::default(),
        }
    }

    pub fn state(&self) -> ScheduleState {
        self.state
    }

    /// One clock check. Returns the round report when a round ran.
    ///
    /// The baseline hour moves before the round starts, so a failed round waits for the
    /// next hour rather than retrying every poll.
    pub async fn tick(&mut self) -> Result<Option<RoundReport>> {
        let hour = self.clock.current_hour();
        if !self.state.is_due(hour) {
            return Ok(None);
        }
        self.state.mark(hour);

        tracing::info!(hour, "starting delivery round");
        let report = deliver_round(&self.service, self.messenger.as_ref()).await?;
        Ok(Some(report))
    }

    /// Poll until `cancel` fires. A round in progress is never interrupted.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
              _ = cancel.cancelled() => break,
              _ = interval.tick() => {}
            }

            match self.tick().await {
                Ok(Some(report)) => tracing::info!(
                    post = %report.shared_post_id,
                    shared = report.shared,
                    substituted = report.substituted,
                    skipped = report.skipped.len(),
                    failed = report.failed.len(),
                    "delivery round finished"
                ),
                Ok(None) => {}
                Err(e) => tracing::error!("delivery round failed: {e}"),
            }
        }

        tracing::info!("delivery loop stopped");
    }
}
