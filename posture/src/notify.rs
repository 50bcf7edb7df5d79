//! Desktop notifications for reminders.

use crate::i18n;
use posture_ipc::{Exercise, Language};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

const APP_NAME: &str = "posture";
const ACTION_SNOOZE: &str = "snooze";
const ACTION_STRETCH: &str = "stretch";

/// Extra time a reminder stays on screen past one interval.
const DISMISS_GRACE_MS: u32 = 5_000;

#[derive(Error, Debug)]
pub enum PresentError {
    #[error("notification backend error: {0}")]
    Backend(String),
}

/// Button clicks coming back from a shown reminder.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationAction {
    Snooze,
    StretchNow(Exercise),
}

/// Everything needed to show one reminder.
#[derive(Debug, Clone, PartialEq)]
pub struct Reminder {
    pub title: String,
    pub body: String,
    pub buttons: [String; 2],
    pub language: Language,
    pub exercise: Exercise,
    /// How long the host should keep the notification visible.
    pub dismiss_after_ms: u32,
}

impl Reminder {
    pub fn new(exercise: Exercise, language: Language, interval_minutes: u32) -> Self {
        let msg = i18n::messages(language);
        Self {
            title: msg.title.to_string(),
            body: format!("{}: {}", exercise.title, exercise.description),
            buttons: [msg.remind_later.to_string(), msg.stretch_now.to_string()],
            language,
            exercise,
            dismiss_after_ms: interval_minutes
                .saturating_mul(60_000)
                .saturating_add(DISMISS_GRACE_MS),
        }
    }
}

/// Map a notification action identifier to what the daemon should do.
#[cfg_attr(not(all(unix, not(target_os = "macos"))), allow(dead_code))]
fn parse_action(identifier: &str, exercise: Exercise) -> Option<NotificationAction> {
    match identifier {
        ACTION_SNOOZE => Some(NotificationAction::Snooze),
        ACTION_STRETCH => Some(NotificationAction::StretchNow(exercise)),
        _ => None,
    }
}

pub trait Presenter: Send {
    /// Show a reminder and return an identifier for it.
    fn present(&self, reminder: &Reminder) -> Result<String, PresentError>;

    /// Show the full instructions for one exercise.
    fn present_guide(&self, exercise: &Exercise, language: Language) -> Result<(), PresentError>;
}

/// Presenter backed by the desktop notification server.
pub struct DesktopPresenter {
    actions: UnboundedSender<NotificationAction>,
}

impl DesktopPresenter {
    pub fn new(actions: UnboundedSender<NotificationAction>) -> Self {
        Self { actions }
    }
}

impl Presenter for DesktopPresenter {
    fn present(&self, reminder: &Reminder) -> Result<String, PresentError> {
        let id = format!("posture-reminder-{}", chrono::Local::now().timestamp_millis());
        let handle = notify_rust::Notification::new()
            .appname(APP_NAME)
            .summary(&reminder.title)
            .body(&reminder.body)
            .action(ACTION_SNOOZE, &reminder.buttons[0])
            .action(ACTION_STRETCH, &reminder.buttons[1])
            .timeout(notify_rust::Timeout::Milliseconds(reminder.dismiss_after_ms))
            .show()
            .map_err(|e| PresentError::Backend(e.to_string()))?;
        debug!(id = %id, "notification shown");

        #[cfg(all(unix, not(target_os = "macos")))]
        {
            let actions = self.actions.clone();
            let exercise = reminder.exercise.clone();
            // wait_for_action blocks until the notification is closed.
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    runtime.spawn_blocking(move || {
                        handle.wait_for_action(|action| {
                            if let Some(action) = parse_action(action, exercise) {
                                if actions.send(action).is_err() {
                                    warn!("daemon loop gone, dropping notification action");
                                }
                            }
                        });
                    });
                }
                Err(_) => warn!("no async runtime, notification buttons are inactive"),
            }
        }
        #[cfg(not(all(unix, not(target_os = "macos"))))]
        {
            let _ = (handle, &self.actions);
        }

        Ok(id)
    }

    fn present_guide(&self, exercise: &Exercise, language: Language) -> Result<(), PresentError> {
        let msg = i18n::messages(language);
        notify_rust::Notification::new()
            .appname(APP_NAME)
            .summary(&format!("{} - {}", msg.guide_title, exercise.title))
            .body(&exercise.description)
            .show()
            .map_err(|e| PresentError::Backend(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reminder_text_is_localized() {
        let exercise = Exercise::new("Neck Tilt", "Tilt slowly.", "neck");
        let reminder = Reminder::new(exercise, Language::Ko, 1);
        assert_eq!(reminder.title, "자세 알림이");
        assert_eq!(reminder.body, "Neck Tilt: Tilt slowly.");
        assert_eq!(reminder.buttons[0], "5분 후에 알림");
        assert_eq!(reminder.dismiss_after_ms, 65_000);
    }

    #[test]
    fn button_identifiers_map_to_actions() {
        let exercise = Exercise::new("Wrist Circles", "Rotate both wrists.", "wrist");
        assert_eq!(
            parse_action("snooze", exercise.clone()),
            Some(NotificationAction::Snooze)
        );
        assert_eq!(
            parse_action("stretch", exercise.clone()),
            Some(NotificationAction::StretchNow(exercise.clone()))
        );
        // Closing the notification reports "__closed".
        assert_eq!(parse_action("__closed", exercise), None);
    }
}
