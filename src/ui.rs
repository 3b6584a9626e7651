// src/ui.rs
use crate::app::{App, FocusedPanel};
use crate::progress::format_time;
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Gauge, List, ListItem, Paragraph, Wrap},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const DESCRIPTION_TEXT_WIDTH: usize = 80;

pub struct LayoutChunks {
    pub player_chunk: Rect,
    pub stations_chunk: Rect,
    pub episodes_chunk: Rect,
    pub playlist_chunk: Rect,
    pub show_notes_chunk: Rect,
    pub hint_chunk: Rect,
    pub status_chunk: Rect,
}

pub fn compute_layout(frame_size: Rect) -> LayoutChunks {
    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // Player bar
            Constraint::Min(0),    // Content panels
            Constraint::Length(1), // Key hints
            Constraint::Length(1), // Status line
        ])
        .split(frame_size);

    let content_columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(28),
            Constraint::Percentage(36),
            Constraint::Percentage(36),
        ])
        .split(main_chunks[1]);

    let right_rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(content_columns[2]);

    LayoutChunks {
        player_chunk: main_chunks[0],
        stations_chunk: content_columns[0],
        episodes_chunk: content_columns[1],
        playlist_chunk: right_rows[0],
        show_notes_chunk: right_rows[1],
        hint_chunk: main_chunks[2],
        status_chunk: main_chunks[3],
    }
}

/// Feed the show-notes pane its inner size before drawing, so its scroll
/// state can cap at the last page. Runs outside the draw closure because
/// it mutates app state.
pub fn prepare_layout(app: &mut App, frame_size: Rect) {
    let chunks = compute_layout(frame_size);
    let block = Block::default().borders(Borders::ALL);
    let inner = block.inner(chunks.show_notes_chunk);
    app.show_notes_state.set_dimensions(inner.width, inner.height);
}

pub fn render(f: &mut Frame, app: &App) {
    let chunks = compute_layout(f.size());

    let default_style = Style::default().fg(Color::White);
    let focused_style = Style::default().fg(Color::Cyan);
    let selected_style = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);
    let unfocused_selected_style = Style::default().fg(Color::LightCyan);

    render_player_bar(f, app, chunks.player_chunk);

    // === Stations Panel (Left) ===
    let stations_focused = app.focused_panel == FocusedPanel::Stations;
    let station_width = chunks.stations_chunk.width.saturating_sub(4) as usize;
    let station_items: Vec<ListItem> = if app.station_list.is_empty() {
        vec![ListItem::new("No stations yet - add one with 'rustcast add'").style(default_style)]
    } else {
        app.station_list
            .iter()
            .enumerate()
            .map(|(i, station)| {
                let style = if Some(i) == app.selected_station_index {
                    if stations_focused { selected_style } else { unfocused_selected_style }
                } else {
                    default_style
                };
                ListItem::new(truncate_to_width(&station.name, station_width)).style(style)
            })
            .collect()
    };
    let stations_widget = List::new(station_items)
        .block(
            Block::default()
                .title(format!("Stations ({})", app.station_list.len()))
                .borders(Borders::ALL)
                .border_style(if stations_focused { focused_style } else { default_style }),
        )
        .highlight_symbol(">> ");
    f.render_widget(stations_widget, chunks.stations_chunk);

    // === Episodes Panel (Middle) ===
    let episodes_focused = app.focused_panel == FocusedPanel::Episodes;
    let episode_width = chunks.episodes_chunk.width.saturating_sub(4) as usize;
    let (episodes_title, episode_items): (String, Vec<ListItem>) = match &app.podcast {
        Some(podcast) => {
            let items = podcast
                .episodes()
                .iter()
                .enumerate()
                .map(|(i, episode)| {
                    let style = if Some(i) == app.selected_episode_index {
                        if episodes_focused { selected_style } else { unfocused_selected_style }
                    } else {
                        default_style
                    };
                    ListItem::new(truncate_to_width(episode.title(), episode_width)).style(style)
                })
                .collect();
            (format!("Episodes - {}", podcast.title()), items)
        }
        None => {
            let placeholder = if app.fetching { "Fetching feed..." } else { "Fetch a station to list episodes" };
            ("Episodes".to_string(), vec![ListItem::new(placeholder).style(default_style)])
        }
    };
    let episodes_widget = List::new(episode_items)
        .block(
            Block::default()
                .title(truncate_to_width(&episodes_title, episode_width + 2))
                .borders(Borders::ALL)
                .border_style(if episodes_focused { focused_style } else { default_style }),
        )
        .highlight_symbol(">> ");
    f.render_widget(episodes_widget, chunks.episodes_chunk);

    // === Playlist Panel (Top Right) ===
    let playlist_focused = app.focused_panel == FocusedPanel::Playlist;
    let track_width = chunks.playlist_chunk.width.saturating_sub(6) as usize;
    let track_items: Vec<ListItem> = if app.playlist.is_empty() {
        vec![ListItem::new("Playlist is empty").style(default_style)]
    } else {
        app.playlist
            .tracks()
            .iter()
            .enumerate()
            .map(|(i, track)| {
                let marker = if i == app.playlist.current_index() { "▶ " } else { "  " };
                let style = if Some(i) == app.selected_track_index {
                    if playlist_focused { selected_style } else { unfocused_selected_style }
                } else if i == app.playlist.current_index() {
                    Style::default().fg(Color::LightGreen)
                } else {
                    default_style
                };
                ListItem::new(format!("{}{}", marker, truncate_to_width(&track.title, track_width)))
                    .style(style)
            })
            .collect()
    };
    let playlist_widget = List::new(track_items)
        .block(
            Block::default()
                .title(format!("Playlist ({})", app.playlist.len()))
                .borders(Borders::ALL)
                .border_style(if playlist_focused { focused_style } else { default_style }),
        )
        .highlight_symbol(">> ");
    f.render_widget(playlist_widget, chunks.playlist_chunk);

    // === Show Notes Panel (Bottom Right) ===
    let show_notes_focused = app.focused_panel == FocusedPanel::ShowNotes;
    let show_notes_widget = Paragraph::new(app.show_notes_state.content.clone())
        .wrap(Wrap { trim: true })
        .style(default_style)
        .block(
            Block::default()
                .title("Show Notes")
                .borders(Borders::ALL)
                .border_style(if show_notes_focused { focused_style } else { default_style }),
        )
        .scroll((app.show_notes_state.scroll_offset, 0));
    f.render_widget(show_notes_widget, chunks.show_notes_chunk);

    // === Hint Bar ===
    let hint = "[Tab] Panel | [↑/↓] Navigate | [Enter] Fetch/Play | [Space] Pause | [n/p] Next/Prev | [+/-] Volume | [x] Speed | [q] Quit";
    let hint_widget =
        Paragraph::new(hint).style(Style::default().fg(Color::DarkGray)).alignment(Alignment::Center);
    f.render_widget(hint_widget, chunks.hint_chunk);

    // === Status Line ===
    let status_text = if app.fetching {
        format!("{} (fetching...)", app.status_message)
    } else {
        app.status_message.clone()
    };
    let status_widget = Paragraph::new(status_text).style(Style::default().fg(Color::Gray));
    f.render_widget(status_widget, chunks.status_chunk);
}

fn render_player_bar(f: &mut Frame, app: &App, area: Rect) {
    let (title, line) = match &app.playing_track {
        Some(track) => {
            let state = if app.status.loading {
                "..."
            } else if app.status.paused {
                "⏸"
            } else {
                "▶"
            };
            (
                "Now Playing",
                format!(
                    "{} {}   [vol {:>3}%  speed {}x]",
                    state,
                    track.title,
                    (app.status.volume * 100.0).round() as u32,
                    app.status.speed
                ),
            )
        }
        None => ("Not Playing", String::from(" ")),
    };

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .style(Style::default().fg(Color::Green));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1)])
        .split(inner);

    let text_widget =
        Paragraph::new(line).style(Style::default().fg(Color::LightGreen)).wrap(Wrap { trim: true });
    f.render_widget(text_widget, rows[0]);

    let ratio = if app.status.duration > 0 {
        (app.status.position as f64 / app.status.duration as f64).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(Color::Green).bg(Color::DarkGray))
        .ratio(ratio)
        .label(format!(
            "{} / {}",
            format_time(app.status.position),
            format_time(app.status.duration)
        ));
    f.render_widget(gauge, rows[1]);
}

/// Show notes arrive as HTML more often than not; convert them to plain
/// text for the terminal.
pub fn format_description(description: Option<&str>) -> String {
    match description {
        Some(desc) => {
            let looks_like_html = desc.contains('<') && desc.contains('>') && desc.contains("</");
            if looks_like_html {
                match html2text::from_read(desc.as_bytes(), DESCRIPTION_TEXT_WIDTH) {
                    Ok(text) => text
                        .lines()
                        .map(|line| line.trim_end())
                        .filter(|line| !line.is_empty())
                        .collect::<Vec<&str>>()
                        .join("\n"),
                    Err(_) => desc.to_string(),
                }
            } else {
                desc.to_string()
            }
        }
        None => "No show notes available for this episode.".to_string(),
    }
    .trim()
    .to_string()
}

fn truncate_to_width(s: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(s) <= max_width {
        return s.to_string();
    }
    let mut out = String::new();
    let mut width = 0;
    for ch in s.chars() {
        let ch_width = UnicodeWidthChar::width(ch).unwrap_or(0);
        if width + ch_width > max_width.saturating_sub(1) {
            break;
        }
        out.push(ch);
        width += ch_width;
    }
    out.push('…');
    out
}
