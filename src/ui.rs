use crate::journal_entry::{JournalEntry, StoredEntry};
use crate::journal_store::{filter_entries, stats, SortOrder};
use color_eyre::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Terminal,
};
use std::io::{stdout, Stdout};
use unicode_width::UnicodeWidthChar;

/// Read-only terminal view over the journal.
pub struct UI {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl UI {
    pub fn new() -> Result<Self> {
        enable_raw_mode()?;
        stdout().execute(EnterAlternateScreen)?;

        let backend = CrosstermBackend::new(stdout());
        let terminal = Terminal::new(backend)?;

        Ok(UI { terminal })
    }

    pub fn browse(&mut self, entries: &[StoredEntry]) -> Result<()> {
        let mut query = String::new();
        let mut order = SortOrder::default();
        let mut selected_index = 0;
        let mut visible = filter_entries(entries, &query, order);

        loop {
            let summary = stats(visible.iter().map(|e| e.word_count));
            self.terminal.draw(|f| {
                let chunks = Layout::default()
                    .direction(Direction::Vertical)
                    .margin(1)
                    .constraints([
                        Constraint::Length(3),
                        Constraint::Min(10),
                        Constraint::Length(1),
                        Constraint::Length(3),
                    ])
                    .split(f.area());

                let title = Paragraph::new(format!(
                    "Learning Journal (search: \"{}\", sort: {})",
                    query,
                    order.label()
                ))
                .style(
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                )
                .alignment(Alignment::Center);
                f.render_widget(title, chunks[0]);

                let width = usize::from(chunks[1].width.saturating_sub(6));
                let items: Vec<ListItem> = visible
                    .iter()
                    .map(|e| {
                        ListItem::new(vec![
                            Line::from(Span::styled(
                                truncate_to_width(&e.title, width),
                                Style::default().add_modifier(Modifier::BOLD),
                            )),
                            Line::from(Span::raw(format!(
                                "{} | {} words | {} | ID: {}",
                                e.display_date(),
                                e.word_count
                                    .map_or_else(|| "N/A".to_string(), |n| n.to_string()),
                                e.source.as_deref().unwrap_or("unknown"),
                                e.id
                            ))),
                        ])
                    })
                    .collect();

                let entries_list = List::new(items)
                    .block(Block::default().borders(Borders::ALL).title("Reflections"))
                    .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
                    .highlight_symbol("> ");

                let selection = (!visible.is_empty()).then_some(selected_index);
                f.render_stateful_widget(
                    entries_list,
                    chunks[1],
                    &mut ListState::default().with_selected(selection),
                );

                let totals = Paragraph::new(format!(
                    "Entries: {}  Words: {}  Avg words: {:.1}",
                    summary.total_entries, summary.total_words, summary.average_words
                ))
                .alignment(Alignment::Center);
                f.render_widget(totals, chunks[2]);

                let controls = Line::from(vec![
                    Span::styled("Up/Down", Style::default().add_modifier(Modifier::BOLD)),
                    Span::raw(" navigate, "),
                    Span::styled("Enter", Style::default().add_modifier(Modifier::BOLD)),
                    Span::raw(" read, "),
                    Span::styled("/", Style::default().add_modifier(Modifier::BOLD)),
                    Span::raw(" search, "),
                    Span::styled("s", Style::default().add_modifier(Modifier::BOLD)),
                    Span::raw(" sort, "),
                    Span::styled("c", Style::default().add_modifier(Modifier::BOLD)),
                    Span::raw(" clear, "),
                    Span::styled("q", Style::default().add_modifier(Modifier::BOLD)),
                    Span::raw(" quit"),
                ]);
                let controls_paragraph = Paragraph::new(controls)
                    .style(Style::default().fg(Color::Yellow))
                    .alignment(Alignment::Center);
                f.render_widget(controls_paragraph, chunks[3]);
            })?;

            let Event::Key(key) = event::read()? else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Up => selected_index = selected_index.saturating_sub(1),
                KeyCode::Down => {
                    if selected_index + 1 < visible.len() {
                        selected_index += 1;
                    }
                }
                KeyCode::Enter => {
                    if let Some(entry) = visible.get(selected_index) {
                        self.view_full_entry(entry)?;
                    }
                }
                KeyCode::Char('/') => {
                    if let Some(new_query) = self.get_search_query(&query)? {
                        query = new_query;
                        selected_index = 0;
                        visible = filter_entries(entries, &query, order);
                    }
                }
                KeyCode::Char('s') => {
                    order = order.next();
                    selected_index = 0;
                    visible = filter_entries(entries, &query, order);
                }
                KeyCode::Char('c') => {
                    query.clear();
                    order = SortOrder::default();
                    selected_index = 0;
                    visible = filter_entries(entries, &query, order);
                }
                KeyCode::Char('q') | KeyCode::Esc => break,
                _ => {}
            }
        }

        Ok(())
    }

    fn view_full_entry(&mut self, entry: &JournalEntry) -> Result<()> {
        loop {
            self.terminal.draw(|f| {
                let chunks = Layout::default()
                    .direction(Direction::Vertical)
                    .margin(1)
                    .constraints([
                        Constraint::Length(3),
                        Constraint::Min(10),
                        Constraint::Length(3),
                    ])
                    .split(f.area());

                let title = Paragraph::new(format!("{} ({})", entry.title, entry.display_date()))
                    .style(
                        Style::default()
                            .fg(Color::Cyan)
                            .add_modifier(Modifier::BOLD),
                    )
                    .alignment(Alignment::Center);
                f.render_widget(title, chunks[0]);

                let content = Paragraph::new(entry.content.clone())
                    .wrap(Wrap { trim: false })
                    .block(Block::default().borders(Borders::ALL).title("Reflection"));
                f.render_widget(content, chunks[1]);

                let instructions = Paragraph::new("Any key: Back")
                    .style(Style::default().fg(Color::Yellow))
                    .alignment(Alignment::Center);
                f.render_widget(instructions, chunks[2]);
            })?;

            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    break;
                }
            }
        }

        Ok(())
    }

    /// Returns `None` when the search is cancelled.
    fn get_search_query(&mut self, current: &str) -> Result<Option<String>> {
        let mut query = current.to_string();

        loop {
            self.terminal.draw(|f| {
                let chunks = Layout::default()
                    .direction(Direction::Vertical)
                    .margin(1)
                    .constraints([
                        Constraint::Length(3),
                        Constraint::Length(3),
                        Constraint::Min(1),
                    ])
                    .split(f.area());

                let title = Paragraph::new("Search Reflections")
                    .style(
                        Style::default()
                            .fg(Color::Cyan)
                            .add_modifier(Modifier::BOLD),
                    )
                    .alignment(Alignment::Center);
                f.render_widget(title, chunks[0]);

                let search_input = Paragraph::new(query.clone())
                    .block(Block::default().borders(Borders::ALL).title("Title or content"));
                f.render_widget(search_input, chunks[1]);

                let instructions = Paragraph::new("Enter: Apply, Esc: Cancel")
                    .style(Style::default().fg(Color::Yellow))
                    .alignment(Alignment::Center);
                f.render_widget(instructions, chunks[2]);
            })?;

            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    KeyCode::Enter => return Ok(Some(query)),
                    KeyCode::Char(c) => query.push(c),
                    KeyCode::Backspace => {
                        query.pop();
                    }
                    KeyCode::Esc => return Ok(None),
                    _ => {}
                }
            }
        }
    }
}

impl Drop for UI {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = stdout().execute(LeaveAlternateScreen);
    }
}

/// Cuts `text` to at most `width` terminal columns, marking the cut with `…`.
pub fn truncate_to_width(text: &str, width: usize) -> String {
    let line = text.lines().next().unwrap_or("");
    let full: usize = line.chars().map(|c| c.width().unwrap_or(0)).sum();
    if full <= width {
        return line.to_string();
    }
    if width == 0 {
        return String::new();
    }

    let mut used = 0;
    let mut out = String::new();
    for c in line.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > width - 1 {
            break;
        }
        used += w;
        out.push(c);
    }
    out.push('…');
    out
}
