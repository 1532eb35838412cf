use crate::event::{Event, EventHandler};
use crate::ui;
use color_eyre::{eyre::eyre, Result};
use crossterm::event::{
  DisableMouseCapture, EnableMouseCapture, KeyCode, KeyEvent, KeyModifiers, MouseButton,
  MouseEvent, MouseEventKind,
};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use liftlegends_sw::cache::{CacheEntry, SqliteStorage};
use liftlegends_sw::config::Config;
use liftlegends_sw::gesture::{
  run_guarded, GestureAction, PullConfig, PullToRefresh, Release, TouchEvent,
};
use liftlegends_sw::net::HttpFetcher;
use liftlegends_sw::worker::OfflineCacheController;
use ratatui::prelude::*;
use ratatui::widgets::ListState;
use std::io::stdout;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

pub type Controller = OfflineCacheController<SqliteStorage, HttpFetcher>;

/// Roughly one animation frame
const TICK_RATE: Duration = Duration::from_millis(33);

/// Cache inspector state
pub struct App {
  controller: Arc<Controller>,

  /// Entries of the current store
  entries: Vec<CacheEntry>,

  list_state: ListState,

  /// Mouse drags at the top of the list feed this
  pull: PullToRefresh,

  pixels_per_row: f64,

  /// Last refresh result or error for the status bar
  status: Option<String>,

  /// Event sender for async tasks
  event_tx: mpsc::UnboundedSender<Event>,

  should_quit: bool,
}

impl App {
  pub fn new(config: &Config, controller: Controller) -> Self {
    let (tx, _rx) = mpsc::unbounded_channel();

    let mut app = Self {
      controller: Arc::new(controller),
      entries: Vec::new(),
      list_state: ListState::default(),
      pull: PullToRefresh::new(PullConfig::from(&config.pull)),
      pixels_per_row: config.pull.pixels_per_row,
      status: None,
      event_tx: tx,
      should_quit: false,
    };
    app.reload_entries();
    app
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    stdout().execute(EnableMouseCapture)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut events = EventHandler::new(TICK_RATE);
    self.event_tx = events.sender();

    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      if let Some(event) = events.next().await {
        self.handle_event(event);
      }
    }

    // Cleanup terminal
    stdout().execute(DisableMouseCapture)?;
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Mouse(mouse) => self.handle_mouse(mouse),
      Event::Tick => {
        self.pull.tick();
      }
      Event::Refreshed(result) => {
        self.status = Some(match &result {
          Ok(count) => format!("Refreshed {} entries", count),
          Err(e) => format!("Refresh failed: {}", e),
        });
        self.pull.finish_refresh(result.map(|_| ()).map_err(|e| eyre!(e)));
        self.reload_entries();
      }
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    match key.code {
      KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
      KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
        self.should_quit = true;
      }
      KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
      KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
      KeyCode::Home | KeyCode::Char('g') => self.list_state.select_first(),
      KeyCode::Char('r') => {
        if self.pull.request_refresh() {
          self.spawn_refresh();
        }
      }
      KeyCode::Char('p') => {
        let enabled = !self.pull.config().enabled;
        self.pull.set_enabled(enabled);
        self.status = Some(format!(
          "Pull to refresh {}",
          if enabled { "enabled" } else { "disabled" }
        ));
      }
      _ => {}
    }
  }

  fn handle_mouse(&mut self, mouse: MouseEvent) {
    let y = f64::from(mouse.row) * self.pixels_per_row;
    let touch = match mouse.kind {
      MouseEventKind::Down(MouseButton::Left) => TouchEvent::Start {
        y,
        scroll_top: self.list_state.offset() as f64 * self.pixels_per_row,
      },
      MouseEventKind::Drag(MouseButton::Left) => TouchEvent::Move { y },
      MouseEventKind::Up(MouseButton::Left) => TouchEvent::End,
      MouseEventKind::ScrollDown => return self.move_selection(1),
      MouseEventKind::ScrollUp => return self.move_selection(-1),
      _ => return,
    };

    if let GestureAction::Released(Release::Refresh) = self.pull.handle(touch) {
      self.spawn_refresh();
    }
  }

  /// Re-run the precache into the current store in the background.
  fn spawn_refresh(&self) {
    let controller = Arc::clone(&self.controller);
    let tx = self.event_tx.clone();
    let timeout = self.pull.config().refresh_timeout;
    info!("Refreshing precached assets");

    tokio::spawn(async move {
      let result = run_guarded(timeout, async {
        controller.precache().await.map(|report| report.cached.len())
      })
      .await;
      let _ = tx.send(Event::Refreshed(result.map_err(|e| e.to_string())));
    });
  }

  fn reload_entries(&mut self) {
    match self.controller.current_store().entries() {
      Ok(entries) => {
        self.entries = entries;
        if self.entries.is_empty() {
          self.list_state.select(None);
        } else {
          let selected = self.list_state.selected().unwrap_or(0);
          self
            .list_state
            .select(Some(selected.min(self.entries.len() - 1)));
        }
      }
      Err(e) => self.status = Some(format!("Failed to read store: {}", e)),
    }
  }

  fn move_selection(&mut self, delta: i32) {
    let len = self.entries.len();
    if len > 0 {
      let selected = self.list_state.selected().unwrap_or(0);
      let next = (selected as i32 + delta).rem_euclid(len as i32) as usize;
      self.list_state.select(Some(next));
    }
  }

  // Accessors for UI rendering

  /// Entries, list state and store name, borrowed together for rendering
  pub fn list_view(&mut self) -> (&[CacheEntry], &mut ListState, &str) {
    (
      &self.entries,
      &mut self.list_state,
      self.controller.current_store().name(),
    )
  }

  pub fn pull(&self) -> &PullToRefresh {
    &self.pull
  }

  pub fn pixels_per_row(&self) -> f64 {
    self.pixels_per_row
  }

  pub fn status(&self) -> Option<&str> {
    self.status.as_deref()
  }
}
