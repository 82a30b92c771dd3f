//! Business-day publication schedule.

use std::future::Future;
use std::sync::Arc;

use chrono::{
    DateTime, Datelike, Days, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Utc, Weekday,
};
use chrono_tz::Tz;
use tracing::{error, info, warn};

use crate::{
    error::{AppError, Result},
    services::Pipeline,
};

/// Default publication times.
pub const DEFAULT_SCHEDULE_TIMES: &str = "09:00,12:00,16:30";

/// Default schedule time zone.
pub const DEFAULT_SCHEDULE_TIMEZONE: &str = "America/New_York";

/// Fixed local times on Monday through Friday.
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    tz: Tz,
    slots: Vec<NaiveTime>,
}

impl Schedule {
    /// Create a schedule. Slots are sorted and deduplicated.
    ///
    /// # Errors
    /// `Config` if `slots` is empty.
    pub fn new(tz: Tz, mut slots: Vec<NaiveTime>) -> Result<Self> {
        if slots.is_empty() {
            return Err(AppError::Config("schedule needs at least one time".into()));
        }
        slots.sort();
        slots.dedup();
        Ok(Self { tz, slots })
    }

    /// Parse a time zone name and comma-separated `HH:MM` times.
    pub fn parse(tz: &str, times: &str) -> Result<Self> {
        let tz: Tz = tz
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid time zone {}: {}", tz, e)))?;

        let slots = times
            .split(',')
            .filter(|t| !t.trim().is_empty())
            .map(|t| {
                NaiveTime::parse_from_str(t.trim(), "%H:%M")
                    .map_err(|e| AppError::Config(format!("Invalid schedule time {}: {}", t, e)))
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(tz, slots)
    }

    /// Time zone slots are interpreted in.
    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// First slot strictly after `now`.
    ///
    /// Weekends roll to Monday's first slot. A slot falling in a DST gap runs
    /// one hour later; an ambiguous one runs at its first occurrence.
    pub fn next_run_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let today = now.with_timezone(&self.tz).date_naive();

        for offset in 0..=7 {
            let date = today.checked_add_days(Days::new(offset))?;
            if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
                continue;
            }

            for slot in &self.slots {
                match self.resolve(date.and_time(*slot)) {
                    Some(at) if at > now => return Some(at),
                    _ => continue,
                }
            }
        }
        None
    }

    fn resolve(&self, local: NaiveDateTime) -> Option<DateTime<Utc>> {
        self.tz
            .from_local_datetime(&local)
            .earliest()
            .or_else(|| self.tz.from_local_datetime(&(local + TimeDelta::hours(1))).earliest())
            .map(|at| at.with_timezone(&Utc))
    }
}

/// Runs the pipeline once at startup, then on every schedule slot.
pub struct Scheduler {
    schedule: Schedule,
    pipeline: Arc<Pipeline>,
}

impl Scheduler {
    /// Create a scheduler.
    pub fn new(schedule: Schedule, pipeline: Arc<Pipeline>) -> Self {
        Self { schedule, pipeline }
    }

    /// Run until Ctrl-C.
    pub async fn run(&self) {
        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        };
        self.run_until(shutdown).await;
    }

    /// Run until `shutdown` completes. The startup cycle always runs.
    pub async fn run_until(&self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);

        self.tick().await;

        loop {
            let now = Utc::now();
            let Some(next) = self.schedule.next_run_after(now) else {
                warn!("Schedule has no upcoming slot, stopping");
                return;
            };
            let wait = (next - now).to_std().unwrap_or_default();

            info!(
                next = %next.with_timezone(&self.schedule.timezone()),
                wait_secs = wait.as_secs(),
                "Next cycle scheduled"
            );

            tokio::select! {
                _ = tokio::time::sleep(wait) => self.tick().await,
                _ = &mut shutdown => {
                    info!("Shutdown signal received, stopping scheduler");
                    return;
                }
            }
        }
    }

    async fn tick(&self) {
        match self.pipeline.run_cycle().await {
            Ok(report) => {
                if let Some(err) = &report.halted {
                    warn!(reason = %err, "Cycle halted");
                }
            }
            Err(AppError::CycleInProgress) => warn!("Previous cycle still running, skipping"),
            Err(err) => error!(reason = %err, "Cycle failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::New_York;

    fn schedule() -> Schedule {
        Schedule::parse(DEFAULT_SCHEDULE_TIMEZONE, DEFAULT_SCHEDULE_TIMES).unwrap()
    }

    fn ny(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        New_York.with_ymd_and_hms(y, m, d, h, min, 0).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_parse_sorts_and_dedups() {
        let s = Schedule::parse("UTC", "16:30, 09:00,09:00,").unwrap();
        assert_eq!(s.slots.len(), 2);
        assert_eq!(s.slots[0], NaiveTime::from_hms_opt(9, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!(Schedule::parse("Mars/Olympus", "09:00"), Err(AppError::Config(_))));
        assert!(matches!(Schedule::parse("UTC", "25:00"), Err(AppError::Config(_))));
        assert!(matches!(Schedule::parse("UTC", ""), Err(AppError::Config(_))));
    }

    #[test]
    fn test_next_slot_same_day() {
        // 2024-03-04 is a Monday.
        assert_eq!(schedule().next_run_after(ny(2024, 3, 4, 8, 0)), Some(ny(2024, 3, 4, 9, 0)));
        assert_eq!(schedule().next_run_after(ny(2024, 3, 4, 10, 0)), Some(ny(2024, 3, 4, 12, 0)));
        assert_eq!(schedule().next_run_after(ny(2024, 3, 4, 12, 0)), Some(ny(2024, 3, 4, 16, 30)));
    }

    #[test]
    fn test_after_last_slot_rolls_to_next_day() {
        assert_eq!(schedule().next_run_after(ny(2024, 3, 4, 17, 0)), Some(ny(2024, 3, 5, 9, 0)));
    }

    #[test]
    fn test_friday_evening_and_weekend_roll_to_monday() {
        let monday = ny(2024, 3, 11, 9, 0);
        assert_eq!(schedule().next_run_after(ny(2024, 3, 8, 17, 0)), Some(monday));
        assert_eq!(schedule().next_run_after(ny(2024, 3, 9, 10, 0)), Some(monday));
        assert_eq!(schedule().next_run_after(ny(2024, 3, 10, 23, 59)), Some(monday));
    }

    #[test]
    fn test_dst_change_keeps_local_time() {
        // DST starts 2024-03-10: EST (UTC-5) on Friday, EDT (UTC-4) on Monday.
        let monday = schedule().next_run_after(ny(2024, 3, 8, 17, 0)).unwrap();
        assert_eq!(monday, Utc.with_ymd_and_hms(2024, 3, 11, 13, 0, 0).unwrap());

        let friday = schedule().next_run_after(ny(2024, 3, 8, 8, 0)).unwrap();
        assert_eq!(friday, Utc.with_ymd_and_hms(2024, 3, 8, 14, 0, 0).unwrap());
    }

    #[test]
    fn test_slot_in_dst_gap_runs_an_hour_later() {
        // 02:30 is skipped when DST starts on 2024-03-10.
        let s = Schedule::parse("America/New_York", "02:30").unwrap();
        let gap =
            chrono::NaiveDate::from_ymd_opt(2024, 3, 10).unwrap().and_hms_opt(2, 30, 0).unwrap();
        assert_eq!(s.resolve(gap), Some(Utc.with_ymd_and_hms(2024, 3, 10, 7, 30, 0).unwrap()));
    }
}
