//! The reminder scheduler.
//!
//! State lives in three durable places: the settings record, the paused
//! remainder, and the alarm registry. Every operation reads what it needs
//! from them and takes the current time as an argument, so a restarted
//! daemon continues exactly where the previous one stopped.

use crate::alarms::{Alarm, Alarms};
use crate::catalog::Catalog;
use crate::notify::{Presenter, Reminder};
use crate::persistence::{Storage, StoreError};
use chrono::{DateTime, Local, Timelike};
use posture_ipc::{Ack, Exercise, SchedulerStatus, Settings, TimerState, MAX_INTERVAL_MINUTES};
use tracing::{debug, error, info, warn};

pub const REMINDER_ALARM: &str = "postureReminderAlarm";
pub const KEEP_ALIVE_ALARM: &str = "keepAlive";
pub const SNOOZE_MINUTES: f64 = 5.0;

/// Upper bound for any one-off delay: explicit resume delays and stored
/// paused remainders alike.
const MAX_DELAY_MS: i64 = MAX_INTERVAL_MINUTES as i64 * 60_000;

/// Cadence of the keep-alive wake and how overdue a reminder may get
/// before it counts as lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakePolicy {
    pub keep_alive_ms: i64,
    pub stale_after_ms: i64,
}

impl Default for WakePolicy {
    fn default() -> Self {
        Self {
            keep_alive_ms: 30_000,
            stale_after_ms: 120_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FireOutcome {
    Presented { id: String, exercise: String },
    Suppressed(Suppression),
    PresentFailed,
    Woke { healed: bool },
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suppression {
    /// Fired while stopped or paused; the registration was cancelled.
    Inactive,
    NotificationsDisabled,
    OutsideWorkHours,
}

pub struct Scheduler {
    storage: Storage,
    alarms: Alarms,
    catalog: Catalog,
    presenter: Box<dyn Presenter>,
    policy: WakePolicy,
}

impl Scheduler {
    pub fn new(
        storage: Storage,
        alarms: Alarms,
        catalog: Catalog,
        presenter: Box<dyn Presenter>,
        policy: WakePolicy,
    ) -> Self {
        Self {
            storage,
            alarms,
            catalog,
            presenter,
            policy,
        }
    }

    /// Daemon start: restore whatever the previous process left behind.
    pub fn init(&mut self, now: DateTime<Local>) -> Result<bool, StoreError> {
        if let Some(last) = self.storage.last_active()? {
            info!(idle_ms = now.timestamp_millis() - last, "previous daemon was last active");
        }
        self.touch(now);
        let healed = self.heal(now)?;
        let settings = self.storage.settings()?;
        info!(
            state = ?TimerState::from_flags(settings.timer_started, settings.is_paused),
            interval = settings.interval_minutes,
            healed,
            "scheduler initialised"
        );
        Ok(healed)
    }

    pub fn start(&mut self, now: DateTime<Local>) -> Result<Ack, StoreError> {
        self.touch(now);
        let mut settings = self.storage.settings()?;
        if settings.timer_started && !settings.is_paused {
            if let Some(alarm) = self.alarms.get(REMINDER_ALARM)? {
                return Ok(Ack::scheduled(alarm.scheduled_time, "timer already running"));
            }
        }
        settings.timer_started = true;
        settings.is_paused = false;
        self.storage.save_settings(&settings)?;
        self.storage.clear_paused_time_left()?;
        let interval = settings.interval_ms();
        let next = self.arm(now, interval, interval)?;
        self.arm_keep_alive(now)?;
        info!(interval = settings.interval_minutes, next_fire = next, "timer started");
        Ok(Ack::scheduled(next, "timer started"))
    }

    pub fn stop(&mut self, now: DateTime<Local>) -> Result<Ack, StoreError> {
        self.touch(now);
        let mut settings = self.storage.settings()?;
        settings.timer_started = false;
        settings.is_paused = false;
        self.storage.save_settings(&settings)?;
        self.storage.clear_paused_time_left()?;
        self.cancel_all()?;
        info!("timer stopped");
        Ok(Ack::done("timer stopped"))
    }

    pub fn pause(&mut self, now: DateTime<Local>) -> Result<Ack, StoreError> {
        self.touch(now);
        let mut settings = self.storage.settings()?;
        if !settings.timer_started {
            return Ok(Ack::rejected("timer not started"));
        }
        if settings.is_paused {
            return Ok(Ack::done("already paused"));
        }
        let remaining = self
            .alarms
            .get(REMINDER_ALARM)?
            .map(|alarm| (alarm.scheduled_time - now.timestamp_millis()).max(0));
        settings.is_paused = true;
        self.storage.save_settings(&settings)?;
        match remaining {
            Some(ms) if ms > 0 => self.storage.set_paused_time_left(ms as u64)?,
            _ => self.storage.clear_paused_time_left()?,
        }
        self.cancel_all()?;
        info!(remaining_ms = ?remaining, "timer paused");
        Ok(Ack::done("timer paused"))
    }

    pub fn resume(&mut self, now: DateTime<Local>) -> Result<Ack, StoreError> {
        self.touch(now);
        let settings = self.storage.settings()?;
        if !settings.timer_started {
            return Ok(Ack::rejected("timer not started"));
        }
        if !settings.is_paused {
            self.heal(now)?;
            return Ok(match self.alarms.get(REMINDER_ALARM)? {
                Some(alarm) => Ack::scheduled(alarm.scheduled_time, "timer already running"),
                None => Ack::done("timer already running"),
            });
        }
        let remaining = self.storage.paused_time_left()?;
        let delay = match remaining {
            Some(ms) => i64::try_from(ms).unwrap_or(MAX_DELAY_MS).min(MAX_DELAY_MS),
            None => {
                debug!("no paused remainder, resuming with a full interval");
                settings.interval_ms()
            }
        };
        let next = self.leave_pause(settings, now, delay)?;
        info!(next_fire = next, "timer resumed");
        Ok(Ack::scheduled(next, "timer resumed"))
    }

    /// First fire after `delay_minutes`, then every interval. Used for
    /// snooze and for resuming with an explicit delay.
    pub fn resume_alarm(
        &mut self,
        delay_minutes: f64,
        now: DateTime<Local>,
    ) -> Result<Ack, StoreError> {
        self.touch(now);
        if !delay_minutes.is_finite()
            || delay_minutes <= 0.0
            || delay_minutes > f64::from(MAX_INTERVAL_MINUTES)
        {
            return Ok(Ack::rejected(format!(
                "invalid delay {delay_minutes}, expected 0-{MAX_INTERVAL_MINUTES} minutes"
            )));
        }
        let settings = self.storage.settings()?;
        if !settings.timer_started {
            return Ok(Ack::rejected("timer not started"));
        }
        let delay = (delay_minutes * 60_000.0).round() as i64;
        let next = self.leave_pause(settings, now, delay)?;
        info!(delay_minutes, next_fire = next, "alarm resumed with delay");
        Ok(Ack::scheduled(next, "alarm resumed"))
    }

    /// Restart the countdown at the configured interval.
    pub fn reset_alarm(&mut self, now: DateTime<Local>) -> Result<Ack, StoreError> {
        self.touch(now);
        let settings = self.storage.settings()?;
        match TimerState::from_flags(settings.timer_started, settings.is_paused) {
            TimerState::Stopped => Ok(Ack::rejected("timer stopped")),
            TimerState::Paused => Ok(Ack::done("timer paused; interval applies on resume")),
            TimerState::Running => {
                let interval = settings.interval_ms();
                let next = self.arm(now, interval, interval)?;
                self.arm_keep_alive(now)?;
                info!(interval = settings.interval_minutes, next_fire = next, "alarm reset");
                Ok(Ack::scheduled(next, "alarm reset"))
            }
        }
    }

    /// Store user-editable settings. The lifecycle flags always come from
    /// storage; only start/stop/pause/resume change them.
    pub fn reconfigure(
        &mut self,
        incoming: Settings,
        now: DateTime<Local>,
    ) -> Result<Ack, StoreError> {
        self.touch(now);
        let current = self.storage.settings()?;
        let updated = Settings {
            timer_started: current.timer_started,
            is_paused: current.is_paused,
            ..incoming
        }
        .normalized();
        self.storage.save_settings(&updated)?;

        let interval_changed = updated.interval_minutes != current.interval_minutes;
        if updated.language != current.language {
            info!(from = %current.language, to = %updated.language, "language changed");
        }
        match TimerState::from_flags(updated.timer_started, updated.is_paused) {
            TimerState::Running if interval_changed => {
                let interval = updated.interval_ms();
                let next = self.arm(now, interval, interval)?;
                info!(interval = updated.interval_minutes, next_fire = next, "interval changed, rescheduled");
                Ok(Ack::scheduled(next, "settings saved, timer rescheduled"))
            }
            TimerState::Running => {
                let next = self.alarms.get(REMINDER_ALARM)?.map(|a| a.scheduled_time);
                Ok(Ack {
                    success: true,
                    message: "settings saved".into(),
                    next_fire: next,
                })
            }
            TimerState::Paused => Ok(Ack::done("settings saved, applies on resume")),
            TimerState::Stopped => Ok(Ack::done("settings saved")),
        }
    }

    pub fn settings(&self) -> Result<Settings, StoreError> {
        self.storage.settings()
    }

    pub fn exercises(&mut self) -> Result<Vec<Exercise>, StoreError> {
        let settings = self.storage.settings()?;
        Ok(self.catalog.exercises(settings.language).to_vec())
    }

    /// Status check. Doubles as a self-heal pass.
    pub fn status(&mut self, now: DateTime<Local>) -> Result<SchedulerStatus, StoreError> {
        let healed = self.heal(now)?;
        let settings = self.storage.settings()?;
        let state = TimerState::from_flags(settings.timer_started, settings.is_paused);
        let next_fire = match state {
            TimerState::Running => self.alarms.get(REMINDER_ALARM)?.map(|a| a.scheduled_time),
            _ => None,
        };
        let paused_remaining_ms = match state {
            TimerState::Paused => self.storage.paused_time_left()?,
            _ => None,
        };
        Ok(SchedulerStatus {
            state,
            next_fire,
            paused_remaining_ms,
            interval_minutes: settings.interval_minutes,
            healed,
        })
    }

    pub fn keep_alive(&mut self, now: DateTime<Local>) -> Result<Ack, StoreError> {
        self.touch(now);
        let healed = self.heal(now)?;
        let next = self.alarms.get(REMINDER_ALARM)?.map(|a| a.scheduled_time);
        Ok(Ack {
            success: true,
            message: if healed { "schedule restored" } else { "alive" }.into(),
            next_fire: next,
        })
    }

    /// The "stretch now" button: no scheduling effect.
    pub fn stretch_now(&mut self, exercise: &Exercise, now: DateTime<Local>) -> Result<(), StoreError> {
        self.storage
            .record_stretch_request(now.timestamp_millis(), &exercise.title)?;
        let language = self.storage.settings()?.language;
        if let Err(e) = self.presenter.present_guide(exercise, language) {
            error!(error = %e, "could not show stretching guide");
        }
        Ok(())
    }

    /// Dispatch every alarm that is due. Errors of one alarm do not stop
    /// the others.
    pub fn tick(&mut self, now: DateTime<Local>) -> Result<Vec<FireOutcome>, StoreError> {
        let due = self.alarms.due(now.timestamp_millis())?;
        let mut outcomes = Vec::with_capacity(due.len());
        for alarm in due {
            match self.on_alarm(&alarm, now) {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => error!(alarm = %alarm.name, error = %e, "alarm handling failed"),
            }
        }
        Ok(outcomes)
    }

    pub fn on_alarm(&mut self, alarm: &Alarm, now: DateTime<Local>) -> Result<FireOutcome, StoreError> {
        match alarm.name.as_str() {
            REMINDER_ALARM => self.fire(alarm, now),
            KEEP_ALIVE_ALARM => self.wake(alarm, now),
            other => {
                warn!(alarm = other, "unknown alarm, clearing");
                self.alarms.clear(other)?;
                Ok(FireOutcome::Ignored)
            }
        }
    }

    fn fire(&mut self, alarm: &Alarm, now: DateTime<Local>) -> Result<FireOutcome, StoreError> {
        // Next occurrence goes in before anything that can be slow or fail,
        // unless the registration moved since this alarm came due.
        match self.alarms.get(REMINDER_ALARM) {
            Ok(Some(current)) if current.scheduled_time == alarm.scheduled_time => {
                if let Err(e) = self.rearm(alarm, now) {
                    error!(error = %e, "could not re-arm reminder, self-heal will retry");
                }
            }
            Ok(_) => debug!("reminder registration changed since it came due, keeping it"),
            Err(e) => error!(error = %e, "could not read reminder registration"),
        }
        self.touch(now);

        let settings = self.storage.settings()?;
        if !settings.timer_started || settings.is_paused {
            warn!("reminder fired while inactive, cancelling it");
            self.alarms.clear(REMINDER_ALARM)?;
            return Ok(FireOutcome::Suppressed(Suppression::Inactive));
        }
        if !settings.notifications_enabled {
            debug!("notifications disabled");
            return Ok(FireOutcome::Suppressed(Suppression::NotificationsDisabled));
        }
        if settings.work_hours_only {
            let minute = now.hour() * 60 + now.minute();
            if !settings.work_hours().contains(minute) {
                debug!(minute, "outside work hours");
                return Ok(FireOutcome::Suppressed(Suppression::OutsideWorkHours));
            }
        }

        let exercise = self.catalog.pick(&settings, &mut rand::thread_rng());
        let title = exercise.title.clone();
        let reminder = Reminder::new(exercise, settings.language, settings.interval_minutes);
        match self.presenter.present(&reminder) {
            Ok(id) => {
                info!(id = %id, exercise = %title, "reminder shown");
                Ok(FireOutcome::Presented { id, exercise: title })
            }
            Err(e) => {
                error!(error = %e, "could not show reminder");
                Ok(FireOutcome::PresentFailed)
            }
        }
    }

    fn wake(&mut self, alarm: &Alarm, now: DateTime<Local>) -> Result<FireOutcome, StoreError> {
        if let Err(e) = self.rearm(alarm, now) {
            error!(error = %e, "could not re-arm keep-alive");
        }
        self.touch(now);
        let healed = self.heal(now)?;
        Ok(FireOutcome::Woke { healed })
    }

    /// Put the registry back in line with the persisted state. Returns
    /// true when a lost reminder had to be re-armed.
    fn heal(&mut self, now: DateTime<Local>) -> Result<bool, StoreError> {
        let settings = self.storage.settings()?;
        let now_ms = now.timestamp_millis();
        match TimerState::from_flags(settings.timer_started, settings.is_paused) {
            TimerState::Running => {
                let lost = match self.alarms.get(REMINDER_ALARM)? {
                    None => {
                        warn!("reminder alarm missing while running, re-arming");
                        true
                    }
                    Some(alarm) if now_ms - alarm.scheduled_time > self.policy.stale_after_ms => {
                        warn!(
                            overdue_ms = now_ms - alarm.scheduled_time,
                            "reminder alarm stale, re-arming"
                        );
                        true
                    }
                    Some(_) => false,
                };
                if lost {
                    let interval = settings.interval_ms();
                    self.arm(now, interval, interval)?;
                }
                if self.alarms.get(KEEP_ALIVE_ALARM)?.is_none() {
                    self.arm_keep_alive(now)?;
                }
                Ok(lost)
            }
            TimerState::Paused | TimerState::Stopped => {
                if self.cancel_all()? {
                    warn!("cancelled alarms left over from an inactive timer");
                }
                Ok(false)
            }
        }
    }

    fn leave_pause(
        &mut self,
        mut settings: Settings,
        now: DateTime<Local>,
        delay_ms: i64,
    ) -> Result<i64, StoreError> {
        if settings.is_paused {
            settings.is_paused = false;
            self.storage.save_settings(&settings)?;
        }
        self.storage.clear_paused_time_left()?;
        let next = self.arm(now, delay_ms, settings.interval_ms())?;
        self.arm_keep_alive(now)?;
        Ok(next)
    }

    fn arm(&mut self, now: DateTime<Local>, delay_ms: i64, period_ms: i64) -> Result<i64, StoreError> {
        let when = now
            .timestamp_millis()
            .saturating_add(delay_ms.clamp(0, MAX_DELAY_MS));
        self.alarms.create(REMINDER_ALARM, when, Some(period_ms))?;
        debug!(next_fire = when, period_ms, "reminder armed");
        Ok(when)
    }

    fn arm_keep_alive(&mut self, now: DateTime<Local>) -> Result<(), StoreError> {
        let every = self.policy.keep_alive_ms;
        self.alarms
            .create(KEEP_ALIVE_ALARM, now.timestamp_millis() + every, Some(every))?;
        Ok(())
    }

    fn rearm(&mut self, alarm: &Alarm, now: DateTime<Local>) -> Result<(), StoreError> {
        match alarm.next_after(now.timestamp_millis()) {
            Some(next) => {
                self.alarms.create(&alarm.name, next, alarm.period_ms)?;
            }
            None => {
                self.alarms.clear(&alarm.name)?;
            }
        }
        Ok(())
    }

    fn cancel_all(&mut self) -> Result<bool, StoreError> {
        let reminder = self.alarms.clear(REMINDER_ALARM)?;
        let keep_alive = self.alarms.clear(KEEP_ALIVE_ALARM)?;
        Ok(reminder || keep_alive)
    }

    fn touch(&mut self, now: DateTime<Local>) {
        if let Err(e) = self.storage.touch(now.timestamp_millis()) {
            debug!(error = %e, "could not record liveness");
        }
    }
}
