//! Durable named timers.
//!
//! The registry only records when each alarm should fire; the daemon's tick
//! loop asks for the due ones and hands them to the scheduler. Creating an
//! alarm under an existing name replaces it, so there is never more than
//! one registration per name.

use crate::persistence::{JsonFile, Namespace, StoreError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alarm {
    pub name: String,
    /// Epoch milliseconds of the next fire.
    pub scheduled_time: i64,
    pub period_ms: Option<i64>,
}

impl Alarm {
    /// When a periodic alarm fires next after firing at `now_ms`. Missed
    /// periods are not replayed.
    pub fn next_after(&self, now_ms: i64) -> Option<i64> {
        let period = self.period_ms.filter(|p| *p > 0)?;
        let next = self.scheduled_time + period;
        Some(if next > now_ms { next } else { now_ms + period })
    }
}

pub struct Alarms {
    ns: Box<dyn Namespace>,
}

impl Alarms {
    pub fn new(ns: Box<dyn Namespace>) -> Self {
        Self { ns }
    }

    pub fn open(data_dir: &Path) -> Self {
        Self::new(Box::new(JsonFile::new(data_dir.join("alarms.json"))))
    }

    pub fn create(
        &mut self,
        name: &str,
        scheduled_time: i64,
        period_ms: Option<i64>,
    ) -> Result<Alarm, StoreError> {
        let alarm = Alarm {
            name: name.to_string(),
            scheduled_time,
            period_ms,
        };
        self.ns.set(name, serde_json::to_value(&alarm)?)?;
        Ok(alarm)
    }

    /// A registration that cannot be decoded counts as missing.
    pub fn get(&self, name: &str) -> Result<Option<Alarm>, StoreError> {
        let Some(value) = self.ns.get(name)? else {
            return Ok(None);
        };
        match serde_json::from_value(value) {
            Ok(alarm) => Ok(Some(alarm)),
            Err(e) => {
                warn!(alarm = name, error = %e, "unreadable alarm registration");
                Ok(None)
            }
        }
    }

    /// Returns whether an alarm was registered under `name`.
    pub fn clear(&mut self, name: &str) -> Result<bool, StoreError> {
        let existed = self.ns.get(name)?.is_some();
        if existed {
            self.ns.remove(name)?;
        }
        Ok(existed)
    }

    pub fn all(&self) -> Result<Vec<Alarm>, StoreError> {
        let mut alarms: Vec<Alarm> = self
            .ns
            .entries()?
            .into_iter()
            .filter_map(|(_, v)| serde_json::from_value(v).ok())
            .collect();
        alarms.sort_by_key(|a| a.scheduled_time);
        Ok(alarms)
    }

    /// Alarms whose scheduled time has passed, earliest first.
    pub fn due(&self, now_ms: i64) -> Result<Vec<Alarm>, StoreError> {
        Ok(self
            .all()?
            .into_iter()
            .filter(|a| a.scheduled_time <= now_ms)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::InMemory;

    #[test]
    fn create_replaces_previous_registration() {
        let mut alarms = Alarms::new(Box::new(InMemory::new()));
        alarms.create("reminder", 1_000, Some(60_000)).expect("create");
        alarms.create("reminder", 5_000, Some(120_000)).expect("create");
        let all = alarms.all().expect("all");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].scheduled_time, 5_000);
        assert_eq!(all[0].period_ms, Some(120_000));
    }

    #[test]
    fn due_returns_earliest_first() {
        let mut alarms = Alarms::new(Box::new(InMemory::new()));
        alarms.create("b", 2_000, None).expect("create");
        alarms.create("a", 1_000, None).expect("create");
        alarms.create("later", 9_000, None).expect("create");
        let names: Vec<_> = alarms
            .due(2_000)
            .expect("due")
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn clear_reports_whether_anything_was_removed() {
        let mut alarms = Alarms::new(Box::new(InMemory::new()));
        alarms.create("reminder", 1_000, None).expect("create");
        assert!(alarms.clear("reminder").expect("clear"));
        assert!(!alarms.clear("reminder").expect("clear"));
        assert_eq!(alarms.get("reminder").expect("get"), None);
    }

    #[test]
    fn next_after_skips_missed_periods() {
        let alarm = Alarm {
            name: "reminder".into(),
            scheduled_time: 10_000,
            period_ms: Some(5_000),
        };
        assert_eq!(alarm.next_after(10_200), Some(15_000));
        assert_eq!(alarm.next_after(40_000), Some(45_000));
        let once = Alarm {
            period_ms: None,
            ..alarm
        };
        assert_eq!(once.next_after(10_200), None);
    }
}
