use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use tapper_core::types::RunState;

use crate::App;

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = if app.log_visible {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(f.area())
    } else {
        Layout::default()
            .constraints([Constraint::Percentage(100)])
            .split(f.area())
    };

    let state = app.supervisor.state();
    let stats = app.supervisor.stats();
    let profile = app.supervisor.profile();

    // -- Left panel: banner + targets + sequences --

    let elapsed = app
        .supervisor
        .elapsed()
        .map(|e| {
            let s = e.as_secs();
            format!("{:02}:{:02}:{:02}", s / 3600, (s / 60) % 60, s % 60)
        })
        .unwrap_or_else(|| "--:--:--".to_string());

    let (banner_label, banner_bg) = match state {
        RunState::Running => (
            format!("RUNNING  {} clicks  {}", stats.total(), elapsed),
            Color::Green,
        ),
        RunState::Paused => (
            format!("PAUSED  {} clicks  {}", stats.total(), elapsed),
            Color::Yellow,
        ),
        RunState::Stopped => (
            format!("STOPPED  {} clicks", stats.total()),
            Color::Red,
        ),
    };

    let mut lines: Vec<Line> = Vec::new();
    lines.push(Line::from(vec![
        Span::styled("s", Style::default().fg(Color::Yellow)),
        Span::raw(" start  "),
        Span::styled(app.hotkeys.pause.to_string(), Style::default().fg(Color::Yellow)),
        Span::raw(" pause  "),
        Span::styled(app.hotkeys.stop.to_string(), Style::default().fg(Color::Yellow)),
        Span::raw(" stop  "),
        Span::styled("r", Style::default().fg(Color::Yellow)),
        Span::raw(" reset  "),
        Span::styled("1-9", Style::default().fg(Color::Yellow)),
        Span::raw(" sequences  "),
        Span::styled("space", Style::default().fg(Color::Yellow)),
        Span::raw(" toggle  "),
        Span::styled("c", Style::default().fg(Color::Yellow)),
        Span::raw(" save  "),
        Span::styled("o", Style::default().fg(Color::Yellow)),
        Span::raw(" load"),
    ]));
    lines.push(Line::from(""));

    for (i, target) in profile.targets.iter().enumerate() {
        let is_selected = i == app.selected;
        let prefix = if is_selected { "> " } else { "  " };
        let checkbox = if target.enabled { "[x]" } else { "[ ]" };

        let detail = if target.has_worker() {
            format!("({}, {}) every {:.1}s", target.x, target.y, target.interval_secs)
        } else {
            format!("({}, {}) sequence-only", target.x, target.y)
        };

        lines.push(Line::from(vec![
            Span::raw(prefix),
            Span::styled(checkbox, Style::default().fg(banner_bg)),
            Span::raw(" "),
            Span::styled(
                target.name.clone(),
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            ),
            Span::styled(format!("  {}", detail), Style::default().fg(Color::DarkGray)),
            Span::styled(
                format!("  {} clicks", stats.target_clicks(i)),
                Style::default().fg(Color::Cyan),
            ),
        ]));
    }

    if !profile.sequences.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Sequences",
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        )));
        for (i, seq) in profile.sequences.iter().enumerate() {
            let trigger = if seq.manual_only {
                format!("[{}] manual", i + 1)
            } else {
                format!("[{}] every {:.1}s", i + 1, seq.auto_interval_secs)
            };
            lines.push(Line::from(vec![
                Span::styled(format!("  {}", trigger), Style::default().fg(Color::Yellow)),
                Span::styled(
                    format!("  {}  {} steps", seq.name, seq.steps.len()),
                    Style::default().fg(Color::White),
                ),
                Span::styled(
                    format!("  {} runs", stats.sequence_executions(i)),
                    Style::default().fg(Color::Cyan),
                ),
            ]));
        }
    }

    if let Some(status) = &app.status {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("! {}", status),
            Style::default().fg(Color::Red),
        )));
    }

    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(0)])
        .split(chunks[0]);

    let banner_width = left_chunks[0].width as usize;
    let pad_total = banner_width.saturating_sub(banner_label.len());
    let pad_left = pad_total / 2;
    let centered = format!(
        "{}{}{}",
        " ".repeat(pad_left),
        banner_label,
        " ".repeat(pad_total - pad_left)
    );
    let banner = Paragraph::new(Line::from(Span::styled(
        centered,
        Style::default().fg(Color::Black).bg(banner_bg).add_modifier(Modifier::BOLD),
    )));
    f.render_widget(banner, left_chunks[0]);

    let target_list = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::LEFT | Borders::RIGHT | Borders::BOTTOM)
            .border_style(Style::default().fg(Color::Cyan)),
    );
    f.render_widget(target_list, left_chunks[1]);

    // -- Right panel: logs --
    if app.log_visible && chunks.len() > 1 {
        let visible_height = chunks[1].height.saturating_sub(2) as usize;
        let total = app.log_messages.len();
        let max_scroll = total.saturating_sub(visible_height);
        let scroll = app.log_scroll.min(max_scroll);
        let start = total.saturating_sub(visible_height + scroll);
        let end = total.saturating_sub(scroll);
        let log_lines: Vec<Line> = app.log_messages[start..end]
            .iter()
            .map(|m| parse_log_line(m))
            .collect();

        let log_panel = Paragraph::new(log_lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" Logs ")
                    .border_style(Style::default().fg(Color::Yellow)),
            )
            .wrap(Wrap { trim: false });
        f.render_widget(log_panel, chunks[1]);
    }
}

/// Parse a structured log record (level\x1fprefix\x1fcolor\x1ftimestamp\x1f
/// message) into a colored line.
fn parse_log_line(raw: &str) -> Line<'_> {
    let parts: Vec<&str> = raw.splitn(5, '\x1f').collect();
    if parts.len() < 5 {
        return Line::from(raw);
    }

    let level = parts[0];
    let prefix = parts[1];
    let color_idx: u8 = parts[2].parse().unwrap_or(0);
    let timestamp = parts[3];
    let message = parts[4];

    let prefix_color = match color_idx {
        1 => Color::DarkGray,
        2 => Color::LightBlue,
        3 => Color::LightGreen,
        _ => Color::White,
    };

    let mut spans = Vec::new();
    spans.push(Span::styled(timestamp, Style::default().fg(Color::DarkGray)));
    spans.push(Span::raw(" "));
    match level {
        "ERROR" => spans.push(Span::styled("error ", Style::default().fg(Color::Red))),
        "WARN" => spans.push(Span::styled("warn ", Style::default().fg(Color::Yellow))),
        _ => {}
    }
    if !prefix.is_empty() {
        spans.push(Span::styled(
            prefix,
            Style::default().fg(prefix_color).add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::raw(" "));
    }
    spans.push(Span::styled(message, Style::default().fg(prefix_color)));

    Line::from(spans)
}
