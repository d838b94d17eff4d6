pub mod art;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, LineGauge, Paragraph, Widget, Wrap},
};

use crate::{
    app::{App, AudioState},
    session::{format_clock, Phase},
};

const HORIZONTAL_MARGIN: u16 = 2;
const VERSION_FOOTER: &str = "Rutinitas App v0.1";

/// Primary colour while working, green while resting, like the original bars.
fn phase_color(phase: Phase) -> Color {
    match phase {
        Phase::Working => Color::Blue,
        Phase::Resting => Color::Green,
        Phase::Idle => Color::Gray,
    }
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0)])
            .split(area);

        render_app_bar(chunks[0], buf);

        match &self.audio {
            AudioState::Loading => {
                Paragraph::new("Loading Audio . . .")
                    .alignment(Alignment::Center)
                    .render(padded(chunks[1], 2), buf);
            }
            AudioState::Failed(reason) => {
                let text = vec![
                    Line::from(Span::styled(
                        "Could not load audio",
                        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                    )),
                    Line::from(reason.as_str()),
                    Line::from(""),
                    Line::from(Span::styled(
                        "check work_track / rest_track in your config, or run with --no-sound",
                        Style::default().add_modifier(Modifier::ITALIC),
                    )),
                    Line::from("(q)uit"),
                ];
                Paragraph::new(text)
                    .alignment(Alignment::Center)
                    .wrap(Wrap { trim: true })
                    .render(padded(chunks[1], 2), buf);
            }
            AudioState::Ready => render_main(self, chunks[1], buf),
        }
    }
}

fn padded(area: Rect, top: u16) -> Rect {
    Rect {
        y: area.y.saturating_add(top),
        height: area.height.saturating_sub(top),
        ..area
    }
}

fn render_app_bar(area: Rect, buf: &mut Buffer) {
    let bar = Paragraph::new(Span::styled(
        " rutinitas",
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    ))
    .block(Block::default().borders(Borders::BOTTOM))
    .style(Style::default().bg(Color::Rgb(0x62, 0x00, 0xee)));
    bar.render(area, buf);
}

fn render_main(app: &App, area: Rect, buf: &mut Buffer) {
    let controller = &app.controller;
    let session = controller.session();
    let phase = controller.phase();
    let now = app.now;
    let active = phase.is_active();

    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let dim_style = Style::default().add_modifier(Modifier::DIM);
    let italic_style = Style::default().add_modifier(Modifier::ITALIC);

    let art = art::for_phase(phase);
    let art_height = art.len() as u16;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints([
            Constraint::Length(1),          // work / rest labels
            Constraint::Length(1),          // slider
            Constraint::Length(1),          // padding
            Constraint::Length(1),          // start / stop
            Constraint::Length(3),          // confirmation
            Constraint::Length(art_height), // image
            Constraint::Length(1),          // progress
            Constraint::Length(1),          // remaining
            Constraint::Min(0),
            Constraint::Length(1), // audio error
            Constraint::Length(1), // legend
            Constraint::Length(1), // footer
        ])
        .split(area);

    let labels = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[0]);
    Paragraph::new(format!("Work {}m", session.work_minutes()))
        .style(bold_style)
        .render(labels[0], buf);
    Paragraph::new(format!("Rest {}m", session.rest_minutes()))
        .style(bold_style)
        .alignment(Alignment::Right)
        .render(labels[1], buf);

    let split = session.work_minutes() as f64 / session.cycle_minutes() as f64;
    let slider_style = if active {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::Magenta)
    };
    LineGauge::default()
        .filled_style(slider_style)
        .unfilled_style(dim_style)
        .label(format!("cycle {}m", session.cycle_minutes()))
        .ratio(split.clamp(0.0, 1.0))
        .render(chunks[1], buf);

    let toggle = if active {
        "[s] STOP WORK"
    } else {
        "[s] START WORK"
    };
    Paragraph::new(Span::styled(
        toggle,
        bold_style.fg(if active { Color::Red } else { Color::Cyan }),
    ))
    .alignment(Alignment::Center)
    .render(chunks[3], buf);

    let confirmation = match (phase, controller.is_confirmed()) {
        (Phase::Idle, _) => vec![Line::from(Span::styled(
            "START YOUR WORK FIRST",
            bold_style,
        ))],
        (_, true) => vec![
            Line::from("Great!!!"),
            Line::from(Span::styled("KEEP YOUR SPIRIT!!! :D", bold_style)),
        ],
        (_, false) => vec![
            Line::from("Are you working/rest?"),
            Line::from(Span::styled(
                "[y] YES",
                bold_style.fg(Color::Yellow),
            )),
        ],
    };
    Paragraph::new(confirmation)
        .alignment(Alignment::Center)
        .render(chunks[4], buf);

    Paragraph::new(art.iter().map(|l| Line::from(*l)).collect::<Vec<_>>())
        .style(Style::default().fg(phase_color(phase)))
        .alignment(Alignment::Center)
        .render(chunks[5], buf);

    Gauge::default()
        .gauge_style(Style::default().fg(phase_color(phase)))
        .ratio(controller.progress(now))
        .label(format_clock(controller.position_in_cycle(now)))
        .render(chunks[6], buf);

    if active {
        let remaining = format!(
            "{} · {} left · cycle {}",
            phase,
            format_clock(controller.remaining_in_phase(now)),
            controller.cycles_completed(now) + 1
        );
        Paragraph::new(Span::styled(remaining, dim_style))
            .alignment(Alignment::Center)
            .render(chunks[7], buf);
    }

    if let Some(err) = controller.last_audio_error() {
        Paragraph::new(Span::styled(
            format!("audio: {}", err),
            Style::default().fg(Color::Red),
        ))
        .render(chunks[9], buf);
    }

    let legend = if active {
        "(s)top / (y)es / (q)uit"
    } else {
        "(s)tart / ←→ work / [ ] cycle / (q)uit"
    };
    Paragraph::new(Span::styled(legend, italic_style)).render(chunks[10], buf);

    Paragraph::new(VERSION_FOOTER)
        .alignment(Alignment::Center)
        .style(dim_style)
        .render(chunks[11], buf);
}
