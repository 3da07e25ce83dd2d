//! Schedule parsing and multi-slot planning
//!
//! Two ways to pick posting times:
//! - [`parse_schedule`] turns one human-readable string ("2h", "tomorrow 3pm",
//!   "random:10m-1h") into a single UTC instant.
//! - [`SchedulePlan`] expands a start date, a wall-clock time and a
//!   days × posts-per-day grid into many instants, optionally randomized.

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeSet;

use crate::config::{default_best_times, Config};
use crate::{Result, RocketError};

const MIN_RANDOM_SECONDS: i64 = 30;
const MAX_RANDOM_SECONDS: i64 = 30 * 24 * 3600;

/// Minutes either side of the base time used by [`Randomization::Jitter`]
pub const JITTER_MINUTES: i64 = 15;

pub const MAX_POSTS_PER_DAY: u32 = 5;

/// Parse a schedule string into a UTC instant
///
/// Accepted forms:
/// - durations: "30m", "2h", "1 day"
/// - natural language: "tomorrow", "next monday 10am"
/// - random intervals: "random:10m-20m", counted from `last_scheduled`
///   when given, otherwise from now
pub fn parse_schedule(input: &str, last_scheduled: Option<DateTime<Utc>>) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return Err(invalid("Schedule string cannot be empty"));
    }

    if let Some(range) = input.strip_prefix("random:") {
        return parse_random_schedule(range, last_scheduled);
    }

    if let Some(duration) = parse_duration(input) {
        return Ok(Utc::now() + duration);
    }

    chrono_english::parse_date_string(input, Local::now(), chrono_english::Dialect::Us)
        .map(|local| local.with_timezone(&Utc))
        .map_err(|_| invalid(format!("Could not parse schedule string: {}", input)))
}

fn parse_duration(input: &str) -> Option<Duration> {
    let std_duration = humantime::parse_duration(input).ok()?;
    Duration::try_seconds(i64::try_from(std_duration.as_secs()).ok()?)
}

fn parse_random_schedule(
    range: &str,
    last_scheduled: Option<DateTime<Utc>>,
) -> Result<DateTime<Utc>> {
    let (min_str, max_str) = range
        .split_once('-')
        .filter(|(_, max)| !max.contains('-'))
        .ok_or_else(|| invalid("Random format must be MIN-MAX"))?;

    let min = parse_duration(min_str.trim())
        .ok_or_else(|| invalid(format!("Could not parse duration: {}", min_str)))?;
    let max = parse_duration(max_str.trim())
        .ok_or_else(|| invalid(format!("Could not parse duration: {}", max_str)))?;

    let (min_secs, max_secs) = (min.num_seconds(), max.num_seconds());
    if min_secs < MIN_RANDOM_SECONDS {
        return Err(invalid(format!(
            "Minimum random interval must be at least {} seconds",
            MIN_RANDOM_SECONDS
        )));
    }
    if max_secs > MAX_RANDOM_SECONDS {
        return Err(invalid(format!(
            "Maximum random interval must be less than {} days",
            MAX_RANDOM_SECONDS / (24 * 3600)
        )));
    }
    if min_secs >= max_secs {
        return Err(invalid("Minimum must be less than maximum"));
    }

    let offset = rand::thread_rng().gen_range(min_secs..=max_secs);
    Ok(last_scheduled.unwrap_or_else(Utc::now) + Duration::seconds(offset))
}

/// How each planned slot deviates from the base time
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Randomization {
    #[default]
    None,
    /// Shift by a random whole number of minutes in ±[`JITTER_MINUTES`]
    Jitter,
    /// Random hour in `start..=end` (24h clock) and random minute
    HourRange { start: u32, end: u32 },
    /// A random entry from the given best times
    BestTime(Vec<NaiveTime>),
}

/// A days × posts-per-day grid of posting slots
///
/// Slot times are wall-clock times in the local timezone, converted to UTC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulePlan {
    pub start_date: NaiveDate,
    pub time: NaiveTime,
    pub days: u32,
    pub posts_per_day: u32,
    pub randomization: Randomization,
}

impl SchedulePlan {
    /// One post at `time` on `start_date`
    pub fn single(start_date: NaiveDate, time: NaiveTime) -> Self {
        Self {
            start_date,
            time,
            days: 1,
            posts_per_day: 1,
            randomization: Randomization::None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.days == 0 {
            return Err(invalid("Number of days must be at least 1"));
        }
        if self.posts_per_day == 0 || self.posts_per_day > MAX_POSTS_PER_DAY {
            return Err(invalid(format!(
                "Posts per day must be between 1 and {}",
                MAX_POSTS_PER_DAY
            )));
        }
        if let Randomization::HourRange { start, end } = self.randomization {
            if start > end || end > 23 {
                return Err(invalid(format!("Invalid hour range: {}-{}", start, end)));
            }
        }
        Ok(())
    }

    /// Every slot strictly after `now`, in ascending order
    pub fn expand(&self, now: DateTime<Utc>) -> Result<Vec<DateTime<Utc>>> {
        self.expand_with(now, &mut rand::thread_rng())
    }

    /// [`SchedulePlan::expand`] with a caller-supplied random source
    pub fn expand_with<R: Rng + ?Sized>(
        &self,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<Vec<DateTime<Utc>>> {
        self.validate()?;

        let mut slots = Vec::new();
        for day in 0..self.days {
            let date = self.start_date + Duration::days(i64::from(day));
            for _ in 0..self.posts_per_day {
                let Some(base) = local_to_utc(date, self.time) else {
                    tracing::warn!("Skipping nonexistent local time {} {}", date, self.time);
                    continue;
                };
                let Some(slot) = self.randomize(base, rng) else {
                    continue;
                };
                if slot > now {
                    slots.push(slot);
                }
            }
        }

        if slots.is_empty() {
            return Err(invalid("All selected times are in the past."));
        }

        slots.sort();
        Ok(slots)
    }

    fn randomize<R: Rng + ?Sized>(&self, base: DateTime<Utc>, rng: &mut R) -> Option<DateTime<Utc>> {
        match &self.randomization {
            Randomization::None => Some(base),
            Randomization::Jitter => {
                Some(base + Duration::minutes(rng.gen_range(-JITTER_MINUTES..=JITTER_MINUTES)))
            }
            Randomization::HourRange { start, end } => {
                let hour = rng.gen_range(*start..=*end);
                let minute = rng.gen_range(0..60);
                let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
                local_to_utc(base.with_timezone(&Local).date_naive(), time)
            }
            Randomization::BestTime(times) => match times.choose(rng) {
                Some(time) => local_to_utc(base.with_timezone(&Local).date_naive(), *time),
                None => Some(base),
            },
        }
    }
}

fn local_to_utc(date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
    Local
        .from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// All configured best times, de-duplicated and sorted
///
/// Falls back to the built-in table when the config has none; entries that
/// are not `HH:MM` are skipped.
pub fn best_times(config: &Config) -> Vec<NaiveTime> {
    let defaults;
    let table = if config.best_times.values().all(Vec::is_empty) {
        defaults = default_best_times();
        &defaults
    } else {
        &config.best_times
    };

    let times: BTreeSet<NaiveTime> = table
        .values()
        .flatten()
        .filter_map(|raw| match parse_clock_time(raw) {
            Some(time) => Some(time),
            None => {
                tracing::warn!("Ignoring invalid best time '{}'", raw);
                None
            }
        })
        .collect();

    times.into_iter().collect()
}

/// Parse `HH:MM` (24h)
pub fn parse_clock_time(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M").ok()
}

/// `9:00 AM` style label for a clock time
pub fn format_12h(time: NaiveTime) -> String {
    let (pm, hour) = time.hour12();
    format!(
        "{}:{:02} {}",
        hour,
        time.minute(),
        if pm { "PM" } else { "AM" }
    )
}

fn invalid(message: impl Into<String>) -> RocketError {
    RocketError::InvalidInput(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn minutes_from_now(result: Result<DateTime<Utc>>) -> i64 {
        (result.unwrap() - Utc::now()).num_minutes()
    }

    #[test]
    fn test_parse_durations() {
        let diff = minutes_from_now(parse_schedule("30m", None));
        assert!((29..=30).contains(&diff), "Expected ~30 minutes, got {}", diff);

        let diff = minutes_from_now(parse_schedule("2h", None));
        assert!((119..=120).contains(&diff), "Expected ~120 minutes, got {}", diff);

        let diff = minutes_from_now(parse_schedule("1 hour", None));
        assert!((59..=60).contains(&diff), "Expected ~60 minutes, got {}", diff);
    }

    #[test]
    fn test_parse_tomorrow() {
        let scheduled = parse_schedule("tomorrow", None).unwrap();
        let hours = (scheduled - Utc::now()).num_hours();
        assert!((0..=48).contains(&hours), "Expected within two days, got {}", hours);
    }

    #[test]
    fn test_parse_random_from_now() {
        let diff = minutes_from_now(parse_schedule("random:10m-20m", None));
        assert!((9..=20).contains(&diff), "Expected 10-20 minutes, got {}", diff);
    }

    #[test]
    fn test_parse_random_from_last_scheduled() {
        let last = Utc::now() + Duration::hours(5);
        let scheduled = parse_schedule("random:1h-2h", Some(last)).unwrap();
        let diff = (scheduled - last).num_minutes();
        assert!((60..=120).contains(&diff), "Expected 60-120 minutes, got {}", diff);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        for input in [
            "",
            "   ",
            "not a time",
            "random:invalid",
            "random:2h-1h",
            "random:1s-10s",
            "random:1d-40d",
            "random:1m-2m-3m",
        ] {
            let result = parse_schedule(input, None);
            assert!(
                matches!(result, Err(RocketError::InvalidInput(_))),
                "'{}' should be rejected",
                input
            );
        }
    }

    fn future_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2099, 3, 10).unwrap()
    }

    fn nine_am() -> NaiveTime {
        NaiveTime::from_hms_opt(9, 0, 0).unwrap()
    }

    #[test]
    fn test_single_slot() {
        let plan = SchedulePlan::single(future_date(), nine_am());
        let slots = plan.expand(Utc::now()).unwrap();

        assert_eq!(slots.len(), 1);
        let local = slots[0].with_timezone(&Local);
        assert_eq!(local.date_naive(), future_date());
        assert_eq!(local.time(), nine_am());
    }

    #[test]
    fn test_grid_expands_days_times_posts() {
        let plan = SchedulePlan {
            days: 3,
            posts_per_day: 2,
            ..SchedulePlan::single(future_date(), nine_am())
        };
        let slots = plan.expand(Utc::now()).unwrap();

        assert_eq!(slots.len(), 6);
        assert!(slots.windows(2).all(|pair| pair[0] <= pair[1]));
        let last = slots[5].with_timezone(&Local).date_naive();
        assert_eq!(last, NaiveDate::from_ymd_opt(2099, 3, 12).unwrap());
    }

    #[test]
    fn test_past_slots_dropped() {
        let start = Local::now().date_naive() - Duration::days(2);
        let plan = SchedulePlan {
            days: 5,
            ..SchedulePlan::single(start, NaiveTime::from_hms_opt(12, 0, 0).unwrap())
        };
        let now = Utc::now();
        let slots = plan.expand(now).unwrap();

        assert!(!slots.is_empty());
        assert!(slots.len() < 5);
        assert!(slots.iter().all(|slot| *slot > now));
    }

    #[test]
    fn test_all_past_is_an_error() {
        let plan = SchedulePlan {
            days: 2,
            ..SchedulePlan::single(NaiveDate::from_ymd_opt(2001, 1, 1).unwrap(), nine_am())
        };
        let err = plan.expand(Utc::now()).unwrap_err();
        assert_eq!(err.to_string(), "Invalid input: All selected times are in the past.");
    }

    #[test]
    fn test_jitter_stays_within_window() {
        let plan = SchedulePlan {
            posts_per_day: 5,
            randomization: Randomization::Jitter,
            ..SchedulePlan::single(future_date(), nine_am())
        };
        let base = local_to_utc(future_date(), nine_am()).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let slots = plan.expand_with(Utc::now(), &mut rng).unwrap();

        assert_eq!(slots.len(), 5);
        for slot in slots {
            let offset = (slot - base).num_minutes().abs();
            assert!(offset <= JITTER_MINUTES, "offset {} out of range", offset);
        }
    }

    #[test]
    fn test_hour_range_randomization() {
        let plan = SchedulePlan {
            posts_per_day: 4,
            randomization: Randomization::HourRange { start: 14, end: 16 },
            ..SchedulePlan::single(future_date(), nine_am())
        };
        let mut rng = StdRng::seed_from_u64(42);
        for slot in plan.expand_with(Utc::now(), &mut rng).unwrap() {
            let local = slot.with_timezone(&Local);
            assert!((14..=16).contains(&local.hour()));
            assert_eq!(local.date_naive(), future_date());
        }
    }

    #[test]
    fn test_best_time_randomization_picks_from_list() {
        let choices = vec![
            NaiveTime::from_hms_opt(7, 30, 0).unwrap(),
            NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
        ];
        let plan = SchedulePlan {
            posts_per_day: 3,
            randomization: Randomization::BestTime(choices.clone()),
            ..SchedulePlan::single(future_date(), nine_am())
        };
        let mut rng = StdRng::seed_from_u64(3);
        for slot in plan.expand_with(Utc::now(), &mut rng).unwrap() {
            assert!(choices.contains(&slot.with_timezone(&Local).time()));
        }
    }

    #[test]
    fn test_plan_validation() {
        let base = SchedulePlan::single(future_date(), nine_am());

        let zero_days = SchedulePlan { days: 0, ..base.clone() };
        assert!(zero_days.validate().is_err());

        let too_many = SchedulePlan { posts_per_day: 6, ..base.clone() };
        assert!(too_many.validate().is_err());

        let reversed = SchedulePlan {
            randomization: Randomization::HourRange { start: 18, end: 9 },
            ..base
        };
        assert!(reversed.validate().is_err());
    }

    #[test]
    fn test_best_times_defaults_and_dedup() {
        let config = Config::default_config();
        let times = best_times(&config);

        assert!(times.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(times.first(), parse_clock_time("06:00").as_ref());
        assert!(times.contains(&parse_clock_time("07:30").unwrap()));

        let mut custom = Config::default_config();
        custom.best_times.clear();
        custom
            .best_times
            .insert("X".to_string(), vec!["18:00".to_string(), "bogus".to_string()]);
        assert_eq!(best_times(&custom), vec![parse_clock_time("18:00").unwrap()]);

        let mut empty = Config::default_config();
        empty.best_times.clear();
        assert_eq!(best_times(&empty), times);
    }

    #[test]
    fn test_format_12h() {
        assert_eq!(format_12h(parse_clock_time("00:05").unwrap()), "12:05 AM");
        assert_eq!(format_12h(parse_clock_time("07:30").unwrap()), "7:30 AM");
        assert_eq!(format_12h(parse_clock_time("17:00").unwrap()), "5:00 PM");
    }
}
