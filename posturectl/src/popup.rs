//! Interactive countdown. It only mirrors the daemon: everything shown is
//! polled, and every change goes back as an intent.

use crate::config::Config;
use crate::ui;
use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use posture_ipc::{
    parse_hhmm, send_command, Command, Exercise, Language, Response, SchedulerStatus, Settings,
    TimerState, MAX_INTERVAL_MINUTES, MIN_INTERVAL_MINUTES,
};
use rand::seq::SliceRandom;
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::io;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_secs(1);
const FEEDBACK_TTL: Duration = Duration::from_secs(2);
const WORK_TIME_STEP: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Timer,
    Settings,
}

/// One editable line on the settings tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingRow {
    Interval,
    Notifications,
    Exercises,
    Language,
    WorkHoursOnly,
    WorkStart,
    WorkEnd,
    Category(String),
}

pub struct Popup {
    pub socket: String,
    pub config: Config,
    pub tab: Tab,
    pub status: Option<SchedulerStatus>,
    pub draft: Settings,
    pub dirty: bool,
    pub selected: usize,
    pub tip: Option<Exercise>,
    pub feedback: Option<(String, Instant)>,
    pub connected: bool,
    pub should_quit: bool,
}

impl Popup {
    pub fn new(socket: String, config: Config) -> Self {
        Self {
            socket,
            config,
            tab: Tab::Timer,
            status: None,
            draft: Settings::default(),
            dirty: false,
            selected: 0,
            tip: None,
            feedback: None,
            connected: false,
            should_quit: false,
        }
    }

    pub fn rows(&self) -> Vec<SettingRow> {
        let mut rows = vec![
            SettingRow::Interval,
            SettingRow::Notifications,
            SettingRow::Exercises,
            SettingRow::Language,
            SettingRow::WorkHoursOnly,
            SettingRow::WorkStart,
            SettingRow::WorkEnd,
        ];
        rows.extend(self.draft.categories.keys().cloned().map(SettingRow::Category));
        rows
    }

    pub fn state(&self) -> Option<TimerState> {
        self.status.as_ref().map(|s| s.state)
    }

    /// Milliseconds left on the countdown as of `now_ms`, for display.
    pub fn remaining_ms(&self, now_ms: i64) -> Option<i64> {
        let status = self.status.as_ref()?;
        match status.state {
            TimerState::Running => status.next_fire.map(|t| (t - now_ms).max(0)),
            TimerState::Paused => Some(status.paused_remaining_ms.unwrap_or(0) as i64),
            TimerState::Stopped => None,
        }
    }

    pub fn feedback(&self) -> Option<&str> {
        self.feedback
            .as_ref()
            .filter(|(_, at)| at.elapsed() < FEEDBACK_TTL)
            .map(|(msg, _)| msg.as_str())
    }

    fn say(&mut self, msg: impl Into<String>) {
        self.feedback = Some((msg.into(), Instant::now()));
    }

    async fn request(&mut self, cmd: Command) -> Option<Response> {
        match send_command(&self.socket, &cmd).await {
            Ok(response) => {
                self.connected = true;
                Some(response)
            }
            Err(e) => {
                self.connected = false;
                self.status = None;
                self.say(e.to_string());
                None
            }
        }
    }

    pub async fn poll(&mut self) {
        if let Some(Response::Status(status)) = self.request(Command::Status).await {
            self.status = Some(status);
        }
        if !self.dirty {
            if let Some(Response::Settings(settings)) = self.request(Command::GetSettings).await {
                self.draft = settings;
                self.selected = self.selected.min(self.rows().len().saturating_sub(1));
            }
        }
    }

    pub async fn next_tip(&mut self) {
        if let Some(Response::Exercises(list)) = self.request(Command::GetExercises).await {
            if let Some(tip) = list.choose(&mut rand::thread_rng()) {
                self.tip = Some(tip.clone());
            }
        }
    }

    async fn intent(&mut self, cmd: Command) {
        match self.request(cmd).await {
            Some(Response::Ack(ack)) => self.say(ack.message),
            Some(Response::Error(e)) => self.say(format!("error: {e}")),
            _ => {}
        }
        self.poll().await;
    }

    pub async fn handle_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Tab => {
                self.tab = match self.tab {
                    Tab::Timer => Tab::Settings,
                    Tab::Settings => Tab::Timer,
                }
            }
            _ => match self.tab {
                Tab::Timer => self.handle_timer_key(code).await,
                Tab::Settings => self.handle_settings_key(code).await,
            },
        }
    }

    async fn handle_timer_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char(' ') => match self.state() {
                Some(TimerState::Running) => self.intent(Command::Pause).await,
                Some(TimerState::Paused) => self.intent(Command::Resume).await,
                Some(TimerState::Stopped) => self.intent(Command::StartTimer).await,
                None => {}
            },
            KeyCode::Char('s') => self.intent(Command::StartTimer).await,
            KeyCode::Char('x') => self.intent(Command::StopTimer).await,
            KeyCode::Char('r') => self.intent(Command::ResetAlarm).await,
            KeyCode::Char('z') => {
                self.intent(Command::ResumeAlarm { delay_minutes: 5.0 })
                    .await
            }
            KeyCode::Char('n') => self.next_tip().await,
            _ => {}
        }
    }

    async fn handle_settings_key(&mut self, code: KeyCode) {
        let rows = self.rows();
        match code {
            KeyCode::Up | KeyCode::Char('k') => self.selected = self.selected.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => {
                self.selected = (self.selected + 1).min(rows.len().saturating_sub(1))
            }
            KeyCode::Left | KeyCode::Char('h') => {
                if let Some(row) = rows.get(self.selected) {
                    self.adjust(row, -1);
                }
            }
            KeyCode::Right | KeyCode::Char('l') => {
                if let Some(row) = rows.get(self.selected) {
                    self.adjust(row, 1);
                }
            }
            KeyCode::Enter | KeyCode::Char(' ') => {
                if let Some(row) = rows.get(self.selected) {
                    self.adjust(row, 0);
                }
            }
            KeyCode::Char('s') => self.save().await,
            KeyCode::Char('u') => {
                self.dirty = false;
                self.poll().await;
                self.say("changes discarded");
            }
            _ => {}
        }
    }

    /// `step` is -1/+1 for arrows and 0 for toggle.
    pub fn adjust(&mut self, row: &SettingRow, step: i32) {
        let d = &mut self.draft;
        match row {
            SettingRow::Interval => {
                let next = d.interval_minutes as i64 + i64::from(if step == 0 { 1 } else { step });
                d.interval_minutes = next.clamp(
                    i64::from(MIN_INTERVAL_MINUTES),
                    i64::from(MAX_INTERVAL_MINUTES),
                ) as u32;
            }
            SettingRow::Notifications => d.notifications_enabled = !d.notifications_enabled,
            SettingRow::Exercises => d.exercises_enabled = !d.exercises_enabled,
            SettingRow::Language => d.language = d.language.toggled(),
            SettingRow::WorkHoursOnly => d.work_hours_only = !d.work_hours_only,
            SettingRow::WorkStart => d.work_start = shift_time(&d.work_start, step),
            SettingRow::WorkEnd => d.work_end = shift_time(&d.work_end, step),
            SettingRow::Category(name) => {
                let enabled = d.category_enabled(name);
                d.categories.insert(name.clone(), !enabled);
            }
        }
        self.dirty = true;
    }

    async fn save(&mut self) {
        if !self.dirty {
            self.say("nothing to save");
            return;
        }
        let cmd = Command::UpdateSettings(self.draft.clone());
        self.dirty = false;
        self.intent(cmd).await;
        // Language or categories may have changed the catalog.
        self.next_tip().await;
    }
}

/// Move an "HH:MM" value by one step, wrapping around midnight.
fn shift_time(value: &str, step: i32) -> String {
    let minutes = parse_hhmm(value).unwrap_or(0) as i32;
    let step = if step == 0 { 1 } else { step };
    let shifted = (minutes + step * WORK_TIME_STEP as i32).rem_euclid(24 * 60);
    format!("{:02}:{:02}", shifted / 60, shifted % 60)
}

pub fn language_label(language: Language) -> &'static str {
    match language {
        Language::En => "English",
        Language::Ko => "한국어",
    }
}

pub async fn run(socket: String, config: Config) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut popup = Popup::new(socket, config);
    let res = run_app(&mut terminal, &mut popup).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("Error: {:?}", err);
    }

    Ok(())
}

async fn run_app<B: Backend>(terminal: &mut Terminal<B>, popup: &mut Popup) -> Result<()> {
    popup.poll().await;
    popup.next_tip().await;
    let mut last_poll = Instant::now();

    loop {
        if last_poll.elapsed() >= POLL_INTERVAL {
            popup.poll().await;
            last_poll = Instant::now();
        }

        terminal.draw(|f| ui::draw(f, popup))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    popup.handle_key(key.code).await;
                }
            }
        }

        if popup.should_quit {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn popup_with(status: SchedulerStatus) -> Popup {
        let mut popup = Popup::new("/nonexistent.sock".into(), Config::default());
        popup.status = Some(status);
        popup
    }

    #[test]
    fn countdown_comes_from_daemon_state() {
        let running = popup_with(SchedulerStatus {
            state: TimerState::Running,
            next_fire: Some(90_000),
            paused_remaining_ms: None,
            interval_minutes: 5,
            healed: false,
        });
        assert_eq!(running.remaining_ms(30_000), Some(60_000));
        assert_eq!(running.remaining_ms(120_000), Some(0));

        let paused = popup_with(SchedulerStatus {
            state: TimerState::Paused,
            next_fire: None,
            paused_remaining_ms: Some(42_000),
            interval_minutes: 5,
            healed: false,
        });
        assert_eq!(paused.remaining_ms(1_000_000), Some(42_000));
    }

    #[test]
    fn edits_stay_in_the_draft() {
        let mut popup = Popup::new("/nonexistent.sock".into(), Config::default());
        popup.draft.interval_minutes = MAX_INTERVAL_MINUTES;
        popup.adjust(&SettingRow::Interval, 1);
        assert_eq!(popup.draft.interval_minutes, MAX_INTERVAL_MINUTES);
        popup.adjust(&SettingRow::Category("neck".into()), 0);
        assert!(!popup.draft.category_enabled("neck"));
        popup.adjust(&SettingRow::Language, 0);
        assert_eq!(popup.draft.language, Language::Ko);
        assert!(popup.dirty);
    }

    #[test]
    fn work_time_wraps_midnight() {
        assert_eq!(shift_time("23:45", 1), "00:15");
        assert_eq!(shift_time("00:00", -1), "23:30");
        assert_eq!(shift_time("bogus", 1), "00:30");
    }

    #[test]
    fn category_rows_follow_settings() {
        let popup = Popup::new("/nonexistent.sock".into(), Config::default());
        let rows = popup.rows();
        assert_eq!(rows.len(), 7 + posture_ipc::DEFAULT_CATEGORIES.len());
        assert!(rows.contains(&SettingRow::Category("wrist".into())));
    }
}
