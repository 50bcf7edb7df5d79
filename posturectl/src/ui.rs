use crate::popup::{language_label, Popup, SettingRow, Tab};
use chrono::Local;
use posture_ipc::TimerState;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Gauge, List, ListItem, Paragraph, Tabs, Wrap},
    Frame,
};

pub fn draw(f: &mut Frame, popup: &Popup) {
    let area = f.area();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(area);

    draw_header(f, chunks[0], popup);
    draw_tabs(f, chunks[1], popup);
    match popup.tab {
        Tab::Timer => draw_timer_tab(f, chunks[2], popup),
        Tab::Settings => draw_settings(f, chunks[2], popup),
    }
    draw_status_bar(f, chunks[3], popup);
}

fn draw_header(f: &mut Frame, area: Rect, popup: &Popup) {
    let theme = &popup.config.theme;
    let icons = &popup.config.icons;
    let text = Line::from(vec![
        Span::raw(icons.header_left.clone()),
        Span::styled(
            "POSTURE",
            Style::default().fg(theme.blue).add_modifier(Modifier::BOLD),
        ),
        Span::raw(icons.header_right.clone()),
    ]);
    f.render_widget(
        Paragraph::new(text).alignment(Alignment::Center).block(
            Block::default()
                .borders(Borders::BOTTOM)
                .border_style(Style::default().fg(theme.black)),
        ),
        area,
    );
}

fn draw_tabs(f: &mut Frame, area: Rect, popup: &Popup) {
    let theme = &popup.config.theme;
    let selected = match popup.tab {
        Tab::Timer => 0,
        Tab::Settings => 1,
    };
    f.render_widget(
        Tabs::new(vec![" Timer ", " Settings "])
            .select(selected)
            .style(Style::default().fg(theme.gray))
            .highlight_style(
                Style::default()
                    .fg(theme.selection)
                    .add_modifier(Modifier::BOLD),
            ),
        area,
    );
}

fn draw_timer_tab(f: &mut Frame, area: Rect, popup: &Popup) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(6), Constraint::Min(3)])
        .split(area);
    draw_timer(f, chunks[0], popup);
    draw_tip(f, chunks[1], popup);
}

fn draw_timer(f: &mut Frame, area: Rect, popup: &Popup) {
    let theme = &popup.config.theme;
    let icons = &popup.config.icons;
    let (icon, label, color) = match popup.state() {
        Some(TimerState::Running) => (&icons.running, "Running", theme.green),
        Some(TimerState::Paused) => (&icons.paused, "Paused", theme.yellow),
        Some(TimerState::Stopped) => (&icons.stopped, "Stopped", theme.gray),
        None => (&icons.stopped, "Daemon unreachable", theme.red),
    };
    let block = Block::default()
        .title(Span::styled(
            format!(" {} {} ", icon, label),
            Style::default().fg(theme.gray),
        ))
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(color));
    let inner_area = block.inner(area);
    f.render_widget(block, area);

    let interval_ms = popup
        .status
        .as_ref()
        .map(|s| i64::from(s.interval_minutes) * 60_000)
        .unwrap_or_else(|| i64::from(popup.draft.interval_minutes) * 60_000);
    let now_ms = Local::now().timestamp_millis();
    let remaining = popup.remaining_ms(now_ms).unwrap_or(interval_ms);
    let secs = (remaining + 999) / 1000;
    let time_str = format!("{:02}:{:02}", secs / 60, secs % 60);
    let progress = if interval_ms > 0 {
        1.0 - (remaining as f64 / interval_ms as f64).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let v_chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([Constraint::Length(1), Constraint::Length(1)])
        .split(inner_area);
    f.render_widget(
        Paragraph::new(time_str)
            .style(
                Style::default()
                    .fg(theme.foreground)
                    .add_modifier(Modifier::BOLD),
            )
            .alignment(Alignment::Center),
        v_chunks[0],
    );
    f.render_widget(
        Gauge::default()
            .gauge_style(Style::default().fg(color).bg(theme.black))
            .percent((progress * 100.0) as u16),
        v_chunks[1],
    );
}

fn draw_tip(f: &mut Frame, area: Rect, popup: &Popup) {
    let theme = &popup.config.theme;
    let block = Block::default()
        .title(Span::styled(
            format!(" {} Stretch ", popup.config.icons.tip),
            Style::default().fg(theme.gray),
        ))
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme.blue));
    let text = match &popup.tip {
        Some(tip) => vec![
            Line::from(Span::styled(
                tip.title.clone(),
                Style::default()
                    .fg(theme.foreground)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                format!("[{}]", tip.category),
                Style::default().fg(theme.gray),
            )),
            Line::from(""),
            Line::from(tip.description.clone()),
        ],
        None => vec![Line::from(Span::styled(
            "No exercise loaded. Press 'n'.",
            Style::default().fg(theme.gray),
        ))],
    };
    f.render_widget(
        Paragraph::new(text)
            .style(Style::default().fg(theme.foreground))
            .wrap(Wrap { trim: true })
            .block(block),
        area,
    );
}

fn draw_settings(f: &mut Frame, area: Rect, popup: &Popup) {
    let theme = &popup.config.theme;
    let icons = &popup.config.icons;
    let d = &popup.draft;
    let check = |on: bool| if on { icons.on.clone() } else { icons.off.clone() };

    let items: Vec<ListItem> = popup
        .rows()
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let (label, value) = match row {
                SettingRow::Interval => ("Interval".to_string(), format!("{} min", d.interval_minutes)),
                SettingRow::Notifications => {
                    ("Notifications".to_string(), check(d.notifications_enabled))
                }
                SettingRow::Exercises => ("Exercises".to_string(), check(d.exercises_enabled)),
                SettingRow::Language => {
                    ("Language".to_string(), language_label(d.language).to_string())
                }
                SettingRow::WorkHoursOnly => {
                    ("Work hours only".to_string(), check(d.work_hours_only))
                }
                SettingRow::WorkStart => ("Work start".to_string(), d.work_start.clone()),
                SettingRow::WorkEnd => ("Work end".to_string(), d.work_end.clone()),
                SettingRow::Category(name) => {
                    (format!("  {}", name), check(d.category_enabled(name)))
                }
            };
            let selected = i == popup.selected;
            let marker = if selected {
                Span::styled(icons.select.clone(), Style::default().fg(theme.selection))
            } else {
                Span::raw(" ")
            };
            let style = if selected {
                Style::default().fg(theme.foreground).bg(theme.black)
            } else {
                Style::default().fg(theme.foreground)
            };
            ListItem::new(Line::from(vec![
                marker,
                Span::raw(" "),
                Span::raw(format!("{:<18}", label)),
                Span::styled(value, Style::default().fg(theme.blue)),
            ]))
            .style(style)
        })
        .collect();

    let title = if popup.dirty {
        " Settings (unsaved) "
    } else {
        " Settings "
    };
    f.render_widget(
        List::new(items).block(
            Block::default()
                .title(Span::styled(title, Style::default().fg(theme.gray)))
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(if popup.dirty {
                    theme.yellow
                } else {
                    theme.green
                })),
        ),
        area,
    );
}

fn draw_status_bar(f: &mut Frame, area: Rect, popup: &Popup) {
    let theme = &popup.config.theme;
    let (mode_text, mode_color) = if !popup.connected {
        ("OFFLINE", theme.red)
    } else {
        match popup.tab {
            Tab::Timer => ("TIMER", theme.green),
            Tab::Settings => ("SETTINGS", theme.blue),
        }
    };
    let help = match popup.feedback() {
        Some(msg) => msg.to_string(),
        None => match popup.tab {
            Tab::Timer => {
                "space:pause/resume │ s:start │ x:stop │ r:reset │ z:snooze │ n:tip │ tab │ q:quit"
                    .to_string()
            }
            Tab::Settings => {
                "j/k:move │ h/l:adjust │ enter:toggle │ s:save │ u:undo │ tab │ q:quit".to_string()
            }
        },
    };
    f.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled(
                format!(" {} ", mode_text),
                Style::default()
                    .bg(mode_color)
                    .fg(theme.background)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(" "),
            Span::raw(help),
        ]))
        .block(Block::default().style(Style::default().bg(theme.black).fg(theme.gray))),
        area,
    );
}
