//! Delivery scheduling
//!
//! For each (subscriber, channel) pair a one-shot job is registered to
//! fire at a random instant inside the subscriber's preferred delivery
//! window. Jobs are ephemeral and in-memory; they do not survive a process
//! restart and their outcome is never reported back to the request that
//! registered them.
//!
//! The fire time draws hour-of-day and minute-of-day independently within
//! the window's component ranges; the window is two component ranges, not
//! one continuous time range. See DESIGN.md for the consequences.

use crate::models::{DeliveryPayload, DeliveryWindow, NewsItem, Subscriber};
use crate::services::delivery::DeliveryExecutor;
use chrono::{Local, Timelike};
use rand::Rng;
use std::sync::Arc;

/// A one-shot delivery job: destination, payload, fire time
#[derive(Debug, Clone)]
pub struct DeliveryJob {
    pub channel_url: String,
    pub payload: DeliveryPayload,
    pub hour: u32,
    pub minute: u32,
}

/// Owner of job registration and firing; the sole retry policy is "none".
pub struct DeliveryScheduler {
    executor: Arc<DeliveryExecutor>,
}

impl DeliveryScheduler {
    pub fn new(executor: Arc<DeliveryExecutor>) -> Self {
        Self { executor }
    }

    /// Register one job per (subscriber, channel) pair.
    ///
    /// Returns the number of jobs registered; it does not wait for any of
    /// them to fire.
    pub fn schedule_news(&self, news: &NewsItem, subscribers: &[Subscriber]) -> usize {
        let mut rng = rand::thread_rng();
        let mut jobs = 0;

        for subscriber in subscribers {
            for subscription in &subscriber.channel_subscriptions {
                let (hour, minute) = sample_fire_time(&subscriber.window, &mut rng);
                let job = DeliveryJob {
                    channel_url: subscription.channel.url.clone(),
                    payload: DeliveryPayload {
                        title: news.title.clone(),
                        content: news.content.clone(),
                        handle: subscription.handle.clone(),
                    },
                    hour,
                    minute,
                };
                self.register(job);
                jobs += 1;
            }
        }

        tracing::info!(title = %news.title, jobs = jobs, "Registered delivery jobs");
        jobs
    }

    /// Spawn the detached task that sleeps until the job's fire time and
    /// performs the single delivery attempt.
    pub fn register(&self, job: DeliveryJob) {
        let executor = self.executor.clone();
        let delay = delay_until(job.hour, job.minute);

        tracing::debug!(
            handle = %job.payload.handle,
            hour = job.hour,
            minute = job.minute,
            delay_secs = delay.as_secs(),
            "Scheduled delivery"
        );

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            executor.deliver(&job.channel_url, &job.payload).await;
        });
    }
}

/// Draw a fire time inside the window, hour and minute independently.
///
/// Inverted component ranges (a window rolling past midnight) are sampled
/// over [min, max] of the components.
pub fn sample_fire_time(window: &DeliveryWindow, rng: &mut impl Rng) -> (u32, u32) {
    let (h_lo, h_hi) = ordered(window.start.hour(), window.end.hour());
    let (m_lo, m_hi) = ordered(window.start.minute(), window.end.minute());
    (rng.gen_range(h_lo..=h_hi), rng.gen_range(m_lo..=m_hi))
}

fn ordered(a: u32, b: u32) -> (u32, u32) {
    (a.min(b), a.max(b))
}

/// Duration until the next wall-clock occurrence of hour:minute
fn delay_until(hour: u32, minute: u32) -> std::time::Duration {
    let now = Local::now().naive_local();
    // Safe: hour and minute come from NaiveTime components
    let mut target = now.date().and_hms_opt(hour, minute, 0).unwrap();
    if target <= now {
        target = target + chrono::Duration::days(1);
    }
    (target - now).to_std().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn window(start: (u32, u32), end: (u32, u32)) -> DeliveryWindow {
        DeliveryWindow {
            start: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            end: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
        }
    }

    #[test]
    fn sampled_components_stay_inside_the_window() {
        let window = window((8, 15), (17, 45));
        let mut rng = rand::thread_rng();

        for _ in 0..1000 {
            let (hour, minute) = sample_fire_time(&window, &mut rng);
            assert!((8..=17).contains(&hour), "hour {} out of range", hour);
            assert!((15..=45).contains(&minute), "minute {} out of range", minute);
        }
    }

    #[test]
    fn degenerate_window_pins_the_fire_time() {
        let window = window((9, 30), (9, 30));
        let mut rng = rand::thread_rng();

        for _ in 0..10 {
            assert_eq!(sample_fire_time(&window, &mut rng), (9, 30));
        }
    }

    #[test]
    fn inverted_window_does_not_panic() {
        // start 23:50, end 00:10: the documented midnight-rollover quirk
        let window = window((23, 50), (0, 10));
        let mut rng = rand::thread_rng();

        for _ in 0..100 {
            let (hour, minute) = sample_fire_time(&window, &mut rng);
            assert!((0..=23).contains(&hour));
            assert!((10..=50).contains(&minute));
        }
    }

    #[test]
    fn delay_until_is_under_a_day() {
        let delay = delay_until(12, 30);
        assert!(delay <= std::time::Duration::from_secs(24 * 60 * 60));
    }

    #[tokio::test]
    async fn schedule_news_registers_one_job_per_channel_pair() {
        use crate::models::{Channel, ChannelSubscription};
        use chrono::Utc;
        use std::collections::BTreeSet;
        use uuid::Uuid;

        let executor = Arc::new(DeliveryExecutor::new(1).unwrap());
        let scheduler = DeliveryScheduler::new(executor);

        let subscriber = Subscriber {
            id: Uuid::new_v4(),
            tag_subscriptions: BTreeSet::new(),
            channel_subscriptions: vec![
                ChannelSubscription {
                    handle: "alice#42".to_string(),
                    channel: Channel {
                        name: "a".to_string(),
                        url: "http://127.0.0.1:1".to_string(),
                    },
                },
                ChannelSubscription {
                    handle: "alice#relay".to_string(),
                    channel: Channel {
                        name: "b".to_string(),
                        url: "http://127.0.0.1:1".to_string(),
                    },
                },
            ],
            window: window((8, 0), (17, 0)),
            likes: BTreeSet::new(),
            phases: BTreeSet::new(),
        };

        let news = NewsItem {
            title: "t".to_string(),
            content: "c".to_string(),
            tags: vec![],
            creator_id: "creator".to_string(),
            creation_date: Utc::now(),
        };

        // Returns as soon as the jobs are registered
        let jobs = scheduler.schedule_news(&news, &[subscriber]);
        assert_eq!(jobs, 2);
    }
}
