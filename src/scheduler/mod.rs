//! Background jobs: the morning event-post digest and the closure sweep.

use std::sync::Arc;

use serde::Serialize;
use time::{macros::format_description, Date, Duration, PrimitiveDateTime, Time};
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::{
    clock::Clock,
    config::SchedulerConfig,
    event_time::{round_to_minute, EventTime},
    events::{Event, EventStore},
    notify::Notifier,
};

/// Group an event post is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Audience {
    /// Heads-up a day before registration opens.
    Committee,
    /// Announcement on the day registration opens.
    Members,
}

/// One block of the daily digest.
#[derive(Debug, Clone, Serialize)]
pub struct EventPost {
    pub event_id: i64,
    pub audience: Audience,
    pub post_on: String,
    pub location: String,
    pub meet_time: String,
    pub meet_point: String,
    pub closes: EventTime,
    pub link: String,
}

impl EventPost {
    pub fn new(event: &Event, audience: Audience, public_url: &str) -> Self {
        Self {
            event_id: event.id,
            audience,
            post_on: format_date(post_date(event, audience)),
            location: event.location.clone(),
            meet_time: event.meet_time.clone(),
            meet_point: event.meet_location.clone(),
            closes: event.closes,
            link: event.registration_link(public_url),
        }
    }
}

fn format_date(date: Date) -> String {
    date.format(format_description!("[day]/[month]/[year]"))
        .unwrap_or_else(|_| date.to_string())
}

fn post_date(event: &Event, audience: Audience) -> Date {
    let opens = event.opens.rounded_to_minute();
    match audience {
        Audience::Committee => opens.hours_before(24).date(),
        Audience::Members => opens.date(),
    }
}

/// Posts an event owes on `today`; empty once it is closed.
pub fn posts_due(event: &Event, today: Date, public_url: &str) -> Vec<EventPost> {
    if event.is_closed() {
        return Vec::new();
    }
    [Audience::Committee, Audience::Members]
        .into_iter()
        .filter(|audience| post_date(event, *audience) == today)
        .map(|audience| EventPost::new(event, audience, public_url))
        .collect()
}

/// Whether the minute sweep should close the event at `now`.
pub fn is_past_close(event: &Event, now: PrimitiveDateTime) -> bool {
    !event.is_closed() && round_to_minute(now) > event.closes.rounded_to_minute().as_datetime()
}

/// Time left until the next `hour:00:00`, always in the future.
pub fn until_next_run(now: PrimitiveDateTime, hour: u8) -> Duration {
    let at = Time::from_hms(hour, 0, 0).unwrap_or(Time::MIDNIGHT);
    let mut next = PrimitiveDateTime::new(now.date(), at);
    if next <= now {
        next += Duration::days(1);
    }
    next - now
}

pub struct Scheduler {
    events: Arc<dyn EventStore>,
    notifier: Arc<Notifier>,
    clock: Arc<dyn Clock>,
    public_url: String,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(
        events: Arc<dyn EventStore>,
        notifier: Arc<Notifier>,
        clock: Arc<dyn Clock>,
        public_url: String,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            events,
            notifier,
            clock,
            public_url,
            config,
        }
    }

    /// Sends today's digest. Returns the number of posts it carried.
    pub async fn check_upcoming_events(&self) -> usize {
        let today = round_to_minute(self.clock.now()).date();
        let events = match self.events.list().await {
            Ok(events) => events,
            Err(e) => {
                error!(error = %e, "[ERR] list events for daily posts");
                return 0;
            }
        };

        let posts: Vec<EventPost> = events
            .iter()
            .flat_map(|event| posts_due(event, today, &self.public_url))
            .collect();
        debug!(%today, posts = posts.len(), "daily event check");

        if posts.is_empty() {
            return 0;
        }
        if let Err(e) = self.notifier.send_event_posts(&posts).await {
            error!(error = %e, "[ERR] send event posts");
            return 0;
        }
        info!(posts = posts.len(), "event posts digest sent");
        posts.len()
    }

    /// Closes every overdue event and mails its summary. Returns the ids it closed.
    pub async fn check_closed_events(&self) -> Vec<i64> {
        let now = self.clock.now();
        let events = match self.events.list().await {
            Ok(events) => events,
            Err(e) => {
                error!(error = %e, "[ERR] list events for closure");
                return Vec::new();
            }
        };

        let mut closed = Vec::new();
        for event in events.iter().filter(|e| is_past_close(e, now)) {
            match self.close_and_report(event.id).await {
                Ok(true) => closed.push(event.id),
                Ok(false) => debug!(event_id = event.id, "already closed elsewhere"),
                Err(e) => error!(event_id = event.id, error = %e, "[ERR] closing event"),
            }
        }
        closed
    }

    /// Transitions first so registrations stop before the roster is read.
    async fn close_and_report(&self, id: i64) -> anyhow::Result<bool> {
        if !self.events.close_event(id).await? {
            return Ok(false);
        }
        info!(event_id = id, "event closed");

        let event = self.events.get(id).await?;
        let participants = self.events.participants(id).await?;
        if let Err(e) = self.notifier.send_closure_summary(&event, &participants).await {
            // The event stays closed; only the mail is lost.
            warn!(event_id = id, error = %e, "closure summary not delivered");
        }
        Ok(true)
    }

    /// Starts the daily digest task and the closure sweep.
    pub fn spawn(self: Arc<Self>) -> (JoinHandle<()>, JoinHandle<()>) {
        info!(
            reminder_hour = self.config.reminder_hour,
            closure_check_secs = self.config.closure_check_secs,
            "scheduler started"
        );
        let daily = {
            let this = self.clone();
            tokio::spawn(async move {
                loop {
                    let wait = until_next_run(this.clock.now(), this.config.reminder_hour);
                    debug!(seconds = wait.whole_seconds(), "next daily event check");
                    tokio::time::sleep(wait.unsigned_abs()).await;
                    this.check_upcoming_events().await;
                }
            })
        };

        let sweep = tokio::spawn(async move {
            let period = std::time::Duration::from_secs(self.config.closure_check_secs.max(1));
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                self.check_closed_events().await;
            }
        });

        (daily, sweep)
    }
}
