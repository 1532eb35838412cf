use crate::ui::renderfns::utils::{format_size, status_color, truncate};
use liftlegends_sw::cache::CacheEntry;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

pub fn draw_entry_list(
  frame: &mut Frame,
  area: Rect,
  entries: &[CacheEntry],
  state: &mut ListState,
  store_name: &str,
) {
  let total: usize = entries.iter().map(|e| e.size).sum();
  let title = format!(
    " {} ({} entries, {}) ",
    store_name,
    entries.len(),
    format_size(total)
  );

  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  if entries.is_empty() {
    let paragraph = Paragraph::new("Store is empty. Pull down or press r to precache.")
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
    return;
  }

  let url_width = usize::from(area.width).saturating_sub(40).max(20);

  let items: Vec<ListItem> = entries
    .iter()
    .map(|entry| {
      let line = Line::from(vec![
        Span::styled(
          format!("{:<7}", entry.key.method),
          Style::default().fg(Color::Cyan),
        ),
        Span::styled(
          format!("{:<4}", entry.status),
          Style::default().fg(status_color(entry.status)),
        ),
        Span::raw(format!("{:>10} ", format_size(entry.size))),
        Span::raw(truncate(&entry.key.url, url_width)),
        Span::raw(" "),
        Span::styled(
          entry.digest.chars().take(8).collect::<String>(),
          Style::default().fg(Color::DarkGray),
        ),
      ]);
      ListItem::new(line)
    })
    .collect();

  let list = List::new(items)
    .block(block)
    .highlight_style(
      Style::default()
        .bg(Color::DarkGray)
        .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("> ");

  frame.render_stateful_widget(list, area, state);
}
