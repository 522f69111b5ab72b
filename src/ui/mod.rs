use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;

pub mod layout;

use crate::app::{App, InputMode, PromptKind};
use crate::domain::{short_address, AttendanceStatus};
use crate::sync::{IdentityStatus, StatusLevel};

pub fn draw(f: &mut Frame, app: &mut App) {
    let areas = layout::areas(f.size());

    draw_header(f, areas.header, app);
    draw_profile(f, areas.profile, app);
    draw_leaderboard(f, areas.leaderboard, app);
    draw_log(f, areas.log, app);
    draw_status_line(f, areas.status_line, app);
    draw_command_line(f, areas.command_line, app);

    if app.help_open {
        draw_help_popup(f, areas.size);
    }
}

fn draw_header(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(area);

    let title = Line::from(vec![
        Span::styled(
            "Rollcall",
            Style::default()
                .fg(Color::LightCyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled("RPC", Style::default().fg(Color::DarkGray)),
        Span::raw(format!(" {} ", app.endpoint)),
        Span::styled("Node", Style::default().fg(Color::DarkGray)),
        Span::raw(format!(" {} ", app.node.as_deref().unwrap_or("--"))),
        Span::styled("Registry", Style::default().fg(Color::DarkGray)),
        Span::raw(format!(" {}", app.contract)),
    ]);

    let left = Paragraph::new(title)
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Left);

    let account = match &app.state.identity {
        IdentityStatus::Unavailable => {
            Span::styled("no wallet provider", Style::default().fg(Color::Red))
        }
        IdentityStatus::Disconnected => {
            Span::styled("not connected", Style::default().fg(Color::Yellow))
        }
        IdentityStatus::Active(account) => {
            Span::styled(short_address(account), Style::default().fg(Color::Green))
        }
    };
    let right_line = Line::from(vec![
        Span::styled("Account ", Style::default().fg(Color::DarkGray)),
        account,
        Span::raw("  "),
        Span::styled("Accounts ", Style::default().fg(Color::DarkGray)),
        Span::raw(app.state.accounts.len().to_string()),
    ]);
    let right = Paragraph::new(right_line)
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Right);

    f.render_widget(left, chunks[0]);
    f.render_widget(right, chunks[1]);
}

fn draw_profile(f: &mut Frame, area: Rect, app: &App) {
    let state = &app.state;
    let dim = Style::default().fg(Color::DarkGray);

    let mut lines = Vec::new();
    match (state.is_connected(), state.student.as_ref()) {
        (false, _) => lines.push(Line::from(Span::styled("Press c to connect", dim))),
        (true, None) => lines.push(Line::from(Span::styled("Loading…", dim))),
        (true, Some(student)) if student.is_registered() => {
            lines.push(Line::from(vec![
                Span::styled("Name ", dim),
                Span::styled(
                    student.name.clone(),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
            ]));
            lines.push(Line::from(vec![
                Span::styled("Attended ", dim),
                Span::raw(format!("{}  ", student.total_attendance)),
                Span::styled("Late/absent ", dim),
                Span::raw(format!("{}  ", student.total_late_or_absent)),
                Span::styled("Checks ", dim),
                Span::raw(student.total_checks.to_string()),
            ]));
        }
        (true, Some(_)) => lines.push(Line::from(Span::styled(
            "Not registered yet",
            Style::default().fg(Color::Yellow),
        ))),
    }
    lines.push(Line::from(""));
    lines.push(action_line(
        "r",
        "Register",
        state.is_connected() && state.is_loaded() && !state.is_registered,
    ));
    lines.push(action_line("s", "Submit attendance", state.can_submit()));
    let can_verify_selected = app
        .selected_entry()
        .is_some_and(|entry| state.can_verify(entry));
    lines.push(action_line("v", "Verify selected", can_verify_selected));
    if let Some(at) = state.refreshed_at {
        lines.push(Line::from(Span::styled(
            format!("Updated {}", at.format("%H:%M:%S")),
            dim,
        )));
    }

    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Student"))
        .wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}

fn action_line(key: &str, label: &str, enabled: bool) -> Line<'static> {
    let style = if enabled {
        Style::default().fg(Color::White)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    Line::from(vec![
        Span::styled(format!("[{key}] "), Style::default().fg(Color::Yellow)),
        Span::styled(label.to_string(), style),
    ])
}

fn draw_leaderboard(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default().borders(Borders::ALL).title("Leaderboard");
    if app.state.leaderboard.is_empty() {
        let empty = Paragraph::new(Span::styled(
            "No students ranked yet",
            Style::default().fg(Color::DarkGray),
        ))
        .block(block);
        f.render_widget(empty, area);
        return;
    }

    let items: Vec<ListItem> = app
        .state
        .leaderboard
        .iter()
        .map(|entry| {
            let style = if entry.rank == 1 {
                Style::default()
                    .fg(Color::LightYellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(Line::from(Span::styled(entry.display(), style)))
        })
        .collect();
    f.render_widget(List::new(items).block(block), area);
}

fn draw_log(f: &mut Frame, area: Rect, app: &App) {
    let title = format!("Attendance log ({})", app.state.log_latest_first.len());
    let block = Block::default().borders(Borders::ALL).title(title);
    if app.state.log_latest_first.is_empty() {
        let empty = Paragraph::new(Span::styled(
            "No attendance submitted yet",
            Style::default().fg(Color::DarkGray),
        ))
        .block(block);
        f.render_widget(empty, area);
        return;
    }

    let items: Vec<ListItem> = app
        .state
        .log_latest_first
        .iter()
        .map(|entry| {
            let status_style = match entry.status {
                AttendanceStatus::OnTime => Style::default().fg(Color::Green),
                AttendanceStatus::LateOrAbsent(_) => Style::default().fg(Color::Red),
            };
            let marker = if app.state.can_verify(entry) {
                Span::styled("✓ ", Style::default().fg(Color::LightCyan))
            } else {
                Span::raw("  ")
            };
            let mut spans = vec![
                marker,
                Span::styled(format!("#{:<4}", entry.index), Style::default().fg(Color::DarkGray)),
                Span::raw(format!("{}  ", entry.recorded_at_display())),
                Span::raw(format!("{}  ", short_address(&entry.student))),
                Span::styled(format!("{:<12}", entry.status.label()), status_style),
                Span::styled(
                    format!("verifiers {}", entry.verifiers_count),
                    Style::default().fg(Color::DarkGray),
                ),
            ];
            if !entry.message.is_empty() {
                spans.push(Span::raw(format!("  {}", entry.message)));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    let mut state = ListState::default();
    state.select(Some(app.selected_log));
    f.render_stateful_widget(list, area, &mut state);
}

fn draw_status_line(f: &mut Frame, area: Rect, app: &App) {
    let line = match app.status_text() {
        Some((text, level)) => {
            let color = match level {
                StatusLevel::Info => Color::White,
                StatusLevel::Warn => Color::Yellow,
                StatusLevel::Error => Color::Red,
            };
            Line::from(Span::styled(text.to_string(), Style::default().fg(color)))
        }
        None => Line::from(Span::styled(
            "?: help  q: quit",
            Style::default().fg(Color::DarkGray),
        )),
    };
    f.render_widget(Paragraph::new(line).alignment(Alignment::Left), area);
}

fn draw_command_line(f: &mut Frame, area: Rect, app: &App) {
    let content = match app.input_mode {
        InputMode::Command => {
            let hint = command_hint(&app.command.input);
            let hint_text = hint.unwrap_or("connect | register <name> | submit | verify <#> | refresh");
            Line::from(vec![
                Span::styled(": ", Style::default().fg(Color::Yellow)),
                Span::raw(&app.command.input),
                Span::styled(
                    format!("  {}", hint_text),
                    Style::default().fg(Color::DarkGray),
                ),
            ])
        }
        InputMode::Prompt(PromptKind::Name) => {
            let hint = if app.can_confirm_name() {
                "Enter=register Esc=cancel"
            } else {
                "enter a name (Esc=cancel)"
            };
            Line::from(vec![
                Span::styled("> name ", Style::default().fg(Color::LightCyan)),
                Span::raw(&app.command.input),
                Span::styled(format!("  {hint}"), Style::default().fg(Color::DarkGray)),
            ])
        }
        InputMode::Normal => Line::from(Span::styled(
            "c connect  r register  s submit  v verify  a account  u refresh  : command",
            Style::default().fg(Color::DarkGray),
        )),
    };
    f.render_widget(Paragraph::new(content), area);
}

/// Get command hint for autocompletion
fn command_hint(input: &str) -> Option<&'static str> {
    let input = input.trim().to_lowercase();
    if input.is_empty() {
        return None;
    }

    let commands = [
        ("connect", "Request wallet access"),
        ("account", "Switch to account <address>"),
        ("register", "Register <name>"),
        ("submit", "Submit attendance"),
        ("verify", "Verify log entry <#>"),
        ("refresh", "Re-fetch registry views"),
        ("quit", "Exit"),
    ];

    for (cmd, desc) in commands {
        if cmd.starts_with(&input) {
            return Some(desc);
        }
    }
    None
}

fn draw_help_popup(f: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 60, area);
    f.render_widget(Clear, popup_area);

    let lines = vec![
        Line::from("Wallet"),
        Line::from("  c          Connect wallet"),
        Line::from("  a          Next wallet account"),
        Line::from(""),
        Line::from("Attendance"),
        Line::from("  r          Register (name prompt)"),
        Line::from("  s          Submit attendance"),
        Line::from("  j / k      Move log selection"),
        Line::from("  v          Verify selected entry"),
        Line::from("  u          Refresh views"),
        Line::from(""),
        Line::from("  :          Command line"),
        Line::from("  ?          Toggle help"),
        Line::from("  q          Quit"),
    ];

    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Help"))
        .wrap(Wrap { trim: false });
    f.render_widget(paragraph, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
