use liftlegends_sw::gesture::PullToRefresh;
use ratatui::prelude::*;
use ratatui::widgets::{Gauge, Paragraph};

/// Rows reserved above the list for the indicator.
pub fn indicator_height(pull: &PullToRefresh, pixels_per_row: f64) -> u16 {
  if pull.is_refreshing() {
    return 1;
  }
  if !pull.should_show_refresh_indicator() && !pull.is_animating() {
    return 0;
  }

  let rows = (pull.pull_distance() / pixels_per_row).ceil() as u16;
  rows.clamp(1, 3)
}

/// Draw the pull progress, or a refreshing notice while a refresh runs
pub fn draw_pull_indicator(frame: &mut Frame, area: Rect, pull: &PullToRefresh) {
  if area.height == 0 {
    return;
  }

  if pull.is_refreshing() {
    let paragraph = Paragraph::new(" Refreshing cache...")
      .style(Style::default().fg(Color::Yellow).bold());
    frame.render_widget(paragraph, area);
    return;
  }

  let (label, color) = if pull.threshold_reached() {
    ("Release to refresh", Color::Green)
  } else {
    ("Pull to refresh", Color::Blue)
  };

  let gauge = Gauge::default()
    .gauge_style(Style::default().fg(color))
    .ratio(pull.progress())
    .label(label);

  // Keep the gauge a single row, anchored to the bottom of the stretched area
  let row = Rect {
    y: area.y + area.height - 1,
    height: 1,
    ..area
  };
  frame.render_widget(gauge, row);
}
