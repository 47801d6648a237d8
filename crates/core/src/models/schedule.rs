use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::tier::{TierId, Timeframe};

/// 调度的唯一标识：(层级, 周期)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScheduleKey {
    pub tier: TierId,
    pub timeframe: Timeframe,
}

impl std::fmt::Display for ScheduleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tier{}/{}", self.tier, self.timeframe)
    }
}

/// 采集调度
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSchedule {
    pub tier: TierId,
    pub priority: u8,
    pub timeframe: Timeframe,
    pub asset_ids: Vec<String>,
    pub next_run_at: DateTime<Utc>,
    pub interval_seconds: u64,
}

impl CollectionSchedule {
    pub fn new(
        tier: TierId,
        priority: u8,
        timeframe: Timeframe,
        asset_ids: Vec<String>,
        interval_seconds: u64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            tier,
            priority,
            timeframe,
            asset_ids,
            next_run_at: after(now, interval_seconds),
            interval_seconds,
        }
    }

    pub fn key(&self) -> ScheduleKey {
        ScheduleKey {
            tier: self.tier,
            timeframe: self.timeframe,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_run_at <= now
    }

    /// 以实际完成时间为基准推进下次执行时间，不会回退
    pub fn advance(&mut self, completed_at: DateTime<Utc>) {
        let candidate = after(completed_at, self.interval_seconds);
        if candidate > self.next_run_at {
            self.next_run_at = candidate;
        }
    }
}

/// `from + seconds`，超出可表示范围时取最大时间
fn after(from: DateTime<Utc>, seconds: u64) -> DateTime<Utc> {
    i64::try_from(seconds)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|interval| from.checked_add_signed(interval))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule(now: DateTime<Utc>) -> CollectionSchedule {
        CollectionSchedule::new(
            1,
            1,
            Timeframe::OneMinute,
            vec!["BTC".to_string()],
            60,
            now,
        )
    }

    #[test]
    fn test_new_schedule_is_due_after_interval() {
        let now = Utc::now();
        let s = schedule(now);
        assert!(!s.is_due(now));
        assert!(s.is_due(now + Duration::seconds(60)));
    }

    #[test]
    fn test_advance_uses_completion_time() {
        let now = Utc::now();
        let mut s = schedule(now);
        let late = now + Duration::seconds(500);
        s.advance(late);
        assert_eq!(s.next_run_at, late + Duration::seconds(60));
    }

    #[test]
    fn test_unrepresentable_interval_saturates() {
        let now = Utc::now();
        let mut s = CollectionSchedule::new(
            1,
            1,
            Timeframe::OneMinute,
            vec!["BTC".to_string()],
            100_000_000_000_000,
            now,
        );
        assert_eq!(s.next_run_at, DateTime::<Utc>::MAX_UTC);
        assert!(!s.is_due(now));

        s.interval_seconds = u64::MAX;
        s.advance(now);
        assert_eq!(s.next_run_at, DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn test_advance_never_moves_backwards() {
        let now = Utc::now();
        let mut s = schedule(now);
        let before = s.next_run_at;
        s.advance(now - Duration::seconds(3600));
        assert_eq!(s.next_run_at, before);
    }
}
