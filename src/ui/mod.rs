mod components;
mod renderfns;
mod views;

use crate::app::App;
use components::pull_indicator::{draw_pull_indicator, indicator_height};
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Main draw function
pub fn draw(frame: &mut Frame, app: &mut App) {
  let indicator = indicator_height(app.pull(), app.pixels_per_row());

  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(indicator), // Pull indicator
      Constraint::Min(1),            // Main content
      Constraint::Length(1),         // Status bar
    ])
    .split(frame.area());

  draw_pull_indicator(frame, chunks[0], app.pull());

  let (entries, list_state, store_name) = app.list_view();
  views::entries::draw_entry_list(frame, chunks[1], entries, list_state, store_name);

  draw_status_bar(frame, chunks[2], app);
}

fn draw_status_bar(frame: &mut Frame, area: Rect, app: &App) {
  let (content, style) = match app.status() {
    Some(status) => (format!(" {}", status), Style::default().fg(Color::Yellow)),
    None => (
      " drag down:refresh  r:refresh  p:toggle pull  j/k:nav  q:quit".to_string(),
      Style::default().fg(Color::DarkGray),
    ),
  };

  let paragraph = Paragraph::new(content).style(style);
  frame.render_widget(paragraph, area);
}
