//! Pacing calculator
//!
//! Pure timing arithmetic shared by the admission planner, the operator
//! schedule preview and the dispatcher. The preview path
//! ([`plan_schedule`]) uses the expected value of each randomized delay;
//! the dispatcher replaces the averages with uniform samples
//! ([`sample_send_delay`]) but goes through the same pause-window helpers,
//! so planned and realized timing agree in expectation.

use cadence_storage::models::{AutomaticPause, BusinessHoursStrategy, PolicyConfig};
use chrono::{DateTime, Days, Duration, LocalResult, NaiveDate, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use cadence_common::types::TimeOfDay;
use rand::{thread_rng, Rng};
use std::time::Duration as StdDuration;

/// Expected send instants for a campaign of `count` messages starting at
/// `start`. All arithmetic is in whole seconds; HH:MM policy fields are
/// interpreted in `tz`.
pub fn plan_schedule(
    config: &PolicyConfig,
    start: DateTime<Utc>,
    count: usize,
    tz: Tz,
) -> Vec<DateTime<Utc>> {
    let avg_interval = (i64::from(config.min_interval) + i64::from(config.max_interval)) / 2;
    let avg_batch_pause =
        (i64::from(config.batch_pause_min) + i64::from(config.batch_pause_max)) / 2;

    let mut planned = Vec::with_capacity(count);
    let mut cursor = start;

    for i in 0..count {
        if i > 0 {
            cursor += Duration::seconds(avg_interval);
            if config.use_batching && config.batch_size > 0 && i % config.batch_size as usize == 0
            {
                cursor += Duration::seconds(avg_batch_pause);
            }
        }
        cursor = apply_pause_windows(config, cursor, start, tz);
        planned.push(cursor);
    }

    planned
}

/// Uniformly sampled delay before the next send. Adds the batch pause when
/// the confirmed counter sits exactly on a batch boundary.
pub fn sample_send_delay(config: &PolicyConfig, sent_messages: i32) -> StdDuration {
    let mut rng = thread_rng();
    let mut secs = u64::from(rng.gen_range(config.min_interval..=config.max_interval));
    if config.use_batching
        && config.batch_size > 0
        && sent_messages > 0
        && sent_messages as u32 % config.batch_size == 0
    {
        secs += u64::from(rng.gen_range(config.batch_pause_min..=config.batch_pause_max));
    }
    StdDuration::from_secs(secs)
}

/// One-shot pause first, then the recurring business-hour window; the
/// window is re-checked against the jump target. Reordering these changes
/// outcomes near midnight.
fn apply_pause_windows(
    config: &PolicyConfig,
    cursor: DateTime<Utc>,
    start: DateTime<Utc>,
    tz: Tz,
) -> DateTime<Utc> {
    let mut cursor = apply_business_hours(config, cursor, tz);
    if let Some(pause) = &config.automatic_pause {
        if one_shot_pause_applies(pause, cursor, start, tz) {
            cursor = apply_business_hours(config, pause.resume_at, tz);
        }
    }
    cursor
}

/// Roll an instant that falls outside business hours forward to the next
/// `resume_at`. Inclusive at `pause_at`, exclusive at `resume_at`; an
/// instant at or past `pause_at` lands on the next day.
pub fn apply_business_hours(config: &PolicyConfig, cursor: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    if config.business_hours != BusinessHoursStrategy::Pause {
        return cursor;
    }
    let (pause_at, resume_at) = match (config.pause_at, config.resume_at) {
        (Some(p), Some(r)) => (p, r),
        _ => return cursor,
    };

    let local = cursor.with_timezone(&tz);
    let minute = minute_of(&local);
    if minute >= pause_at.minute_of_day() {
        let next_day = local.date_naive() + Days::new(1);
        resolve_local(next_day, resume_at, tz).unwrap_or(cursor)
    } else if minute < resume_at.minute_of_day() {
        resolve_local(local.date_naive(), resume_at, tz).unwrap_or(cursor)
    } else {
        cursor
    }
}

/// Whether the one-shot pause suppresses sending at instant `at`.
///
/// Active while `at` is before the absolute resume instant and either the
/// wall clock has passed `pause_at` or `at` falls on a day strictly after
/// the campaign start day.
pub fn one_shot_pause_applies(
    pause: &AutomaticPause,
    at: DateTime<Utc>,
    start: DateTime<Utc>,
    tz: Tz,
) -> bool {
    if at >= pause.resume_at {
        return false;
    }
    let local = at.with_timezone(&tz);
    minute_of(&local) >= pause.pause_at.minute_of_day()
        || local.date_naive() > start.with_timezone(&tz).date_naive()
}

/// Whether sending must pause at instant `at` under a `pause` strategy.
/// The allowed window is `[resume_at, pause_at)` by time-of-day.
pub fn outside_business_hours(config: &PolicyConfig, at: DateTime<Utc>, tz: Tz) -> bool {
    if config.business_hours != BusinessHoursStrategy::Pause {
        return false;
    }
    let (pause_at, resume_at) = match (config.pause_at, config.resume_at) {
        (Some(p), Some(r)) => (p, r),
        _ => return false,
    };
    let minute = minute_of(&at.with_timezone(&tz));
    minute >= pause_at.minute_of_day() || minute < resume_at.minute_of_day()
}

fn minute_of<T: Timelike>(t: &T) -> u32 {
    t.hour() * 60 + t.minute()
}

fn resolve_local(day: NaiveDate, t: TimeOfDay, tz: Tz) -> Option<DateTime<Utc>> {
    let naive = day.and_hms_opt(t.hour(), t.minute(), 0)?;
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        // DST transitions: take the earlier reading, or give up and let the
        // caller keep its cursor.
        LocalResult::Ambiguous(dt, _) => Some(dt.with_timezone(&Utc)),
        LocalResult::None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::UTC;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    fn policy(min: u32, max: u32) -> PolicyConfig {
        PolicyConfig {
            min_interval: min,
            max_interval: max,
            ..Default::default()
        }
    }

    #[test]
    fn plan_empty_campaign() {
        let planned = plan_schedule(&policy(5, 5), at(2025, 6, 2, 10, 0, 0), 0, UTC);
        assert!(planned.is_empty());
    }

    #[test]
    fn plan_fixed_interval() {
        let start = at(2025, 6, 2, 10, 0, 0);
        let planned = plan_schedule(&policy(5, 5), start, 3, UTC);
        assert_eq!(
            planned,
            vec![
                start,
                start + Duration::seconds(5),
                start + Duration::seconds(10)
            ]
        );
    }

    #[test]
    fn plan_uses_average_interval() {
        let start = at(2025, 6, 2, 10, 0, 0);
        let planned = plan_schedule(&policy(5, 15), start, 2, UTC);
        assert_eq!(planned[1], start + Duration::seconds(10));
    }

    #[test]
    fn plan_batch_pause() {
        let mut config = policy(1, 1);
        config.use_batching = true;
        config.batch_size = 2;
        config.batch_pause_min = 10;
        config.batch_pause_max = 10;

        let start = at(2025, 6, 2, 10, 0, 0);
        let planned = plan_schedule(&config, start, 4, UTC);
        assert_eq!(
            planned,
            vec![
                start,
                start + Duration::seconds(1),
                start + Duration::seconds(12),
                start + Duration::seconds(13)
            ]
        );
    }

    #[test]
    fn plan_no_batch_pause_after_last_message() {
        let mut config = policy(1, 1);
        config.use_batching = true;
        config.batch_size = 3;
        config.batch_pause_min = 100;
        config.batch_pause_max = 100;

        let start = at(2025, 6, 2, 10, 0, 0);
        let planned = plan_schedule(&config, start, 3, UTC);
        // n == batch_size: every gap is the plain interval.
        assert_eq!(planned[2], start + Duration::seconds(2));
    }

    #[test]
    fn plan_business_hours_rollover() {
        let mut config = policy(1, 1);
        config.business_hours = BusinessHoursStrategy::Pause;
        config.pause_at = TimeOfDay::parse("18:00");
        config.resume_at = TimeOfDay::parse("08:00");

        let start = at(2025, 6, 2, 17, 59, 59);
        let planned = plan_schedule(&config, start, 2, UTC);
        assert_eq!(planned[0], start);
        assert_eq!(planned[1], at(2025, 6, 3, 8, 0, 0));
    }

    #[test]
    fn plan_business_hours_early_morning() {
        let mut config = policy(60, 60);
        config.business_hours = BusinessHoursStrategy::Pause;
        config.pause_at = TimeOfDay::parse("18:00");
        config.resume_at = TimeOfDay::parse("08:00");

        // Start before the window opens: everything lands at resume time.
        let start = at(2025, 6, 2, 7, 30, 0);
        let planned = plan_schedule(&config, start, 2, UTC);
        assert_eq!(planned[0], at(2025, 6, 2, 8, 0, 0));
    }

    #[test]
    fn plan_one_shot_pause_jump() {
        let mut config = policy(7200, 7200);
        config.automatic_pause = Some(AutomaticPause {
            pause_at: TimeOfDay::parse("12:00").unwrap(),
            resume_at: at(2025, 6, 2, 14, 0, 0),
        });

        let start = at(2025, 6, 2, 10, 0, 0);
        let planned = plan_schedule(&config, start, 2, UTC);
        assert_eq!(planned[0], start);
        // Second instant would land at 12:00 and is deferred to the resume
        // instant.
        assert_eq!(planned[1], at(2025, 6, 2, 14, 0, 0));
    }

    #[test]
    fn plan_one_shot_pause_then_business_hours_recheck() {
        let mut config = policy(7200, 7200);
        config.business_hours = BusinessHoursStrategy::Pause;
        config.pause_at = TimeOfDay::parse("18:00");
        config.resume_at = TimeOfDay::parse("08:00");
        config.automatic_pause = Some(AutomaticPause {
            pause_at: TimeOfDay::parse("12:00").unwrap(),
            resume_at: at(2025, 6, 3, 2, 0, 0),
        });

        let start = at(2025, 6, 2, 10, 0, 0);
        let planned = plan_schedule(&config, start, 2, UTC);
        // The jump target (02:00 next day) is itself outside business hours
        // and rolls forward to 08:00 that morning.
        assert_eq!(planned[1], at(2025, 6, 3, 8, 0, 0));
    }

    #[test]
    fn one_shot_gate_day_boundary() {
        let pause = AutomaticPause {
            pause_at: TimeOfDay::parse("22:00").unwrap(),
            resume_at: at(2025, 6, 3, 9, 0, 0),
        };
        let start = at(2025, 6, 2, 10, 0, 0);

        // Same day, before pause_at: sending allowed.
        assert!(!one_shot_pause_applies(
            &pause,
            at(2025, 6, 2, 15, 0, 0),
            start,
            UTC
        ));
        // Same day, past pause_at: suppressed.
        assert!(one_shot_pause_applies(
            &pause,
            at(2025, 6, 2, 22, 0, 0),
            start,
            UTC
        ));
        // Day strictly after the start day, even before pause_at: suppressed.
        assert!(one_shot_pause_applies(
            &pause,
            at(2025, 6, 3, 1, 0, 0),
            start,
            UTC
        ));
        // At or past the resume instant the pause is spent.
        assert!(!one_shot_pause_applies(
            &pause,
            at(2025, 6, 3, 9, 0, 0),
            start,
            UTC
        ));
    }

    #[test]
    fn business_hours_gate_bounds() {
        let mut config = policy(5, 5);
        config.business_hours = BusinessHoursStrategy::Pause;
        config.pause_at = TimeOfDay::parse("18:00");
        config.resume_at = TimeOfDay::parse("08:00");

        assert!(outside_business_hours(&config, at(2025, 6, 2, 18, 0, 0), UTC));
        assert!(outside_business_hours(&config, at(2025, 6, 2, 7, 59, 0), UTC));
        assert!(!outside_business_hours(&config, at(2025, 6, 2, 8, 0, 0), UTC));
        assert!(!outside_business_hours(&config, at(2025, 6, 2, 17, 59, 0), UTC));

        config.business_hours = BusinessHoursStrategy::Ignore;
        assert!(!outside_business_hours(&config, at(2025, 6, 2, 3, 0, 0), UTC));
    }

    #[test]
    fn business_hours_respect_timezone() {
        let mut config = policy(5, 5);
        config.business_hours = BusinessHoursStrategy::Pause;
        config.pause_at = TimeOfDay::parse("18:00");
        config.resume_at = TimeOfDay::parse("08:00");

        let tz: Tz = "America/Sao_Paulo".parse().unwrap();
        // 21:30 UTC is 18:30 in Sao Paulo (UTC-3): outside the window.
        assert!(outside_business_hours(&config, at(2025, 6, 2, 21, 30, 0), tz));
        // 12:00 UTC is 09:00 local: inside.
        assert!(!outside_business_hours(&config, at(2025, 6, 2, 12, 0, 0), tz));
    }

    #[test]
    fn sampled_delay_within_bounds() {
        let config = policy(5, 9);
        for _ in 0..100 {
            let delay = sample_send_delay(&config, 0).as_secs();
            assert!((5..=9).contains(&delay));
        }
    }

    #[test]
    fn sampled_delay_adds_batch_pause_on_boundary() {
        let mut config = policy(1, 1);
        config.use_batching = true;
        config.batch_size = 2;
        config.batch_pause_min = 10;
        config.batch_pause_max = 10;

        assert_eq!(sample_send_delay(&config, 0).as_secs(), 1);
        assert_eq!(sample_send_delay(&config, 1).as_secs(), 1);
        assert_eq!(sample_send_delay(&config, 2).as_secs(), 11);
        assert_eq!(sample_send_delay(&config, 4).as_secs(), 11);
    }
}
