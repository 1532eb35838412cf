//! Pull-to-refresh gesture recognizer.
//!
//! Touch handlers are plain methods fed with [`TouchEvent`]s, so any event
//! source (DOM, terminal mouse, tests) can drive them. The refresh itself is
//! either awaited through [`PullToRefresh::refresh`] or run elsewhere and
//! reported back with [`PullToRefresh::finish_refresh`].

use color_eyre::{eyre::eyre, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use super::spring::SpringBack;
use crate::config::PullSettings;

/// Raw movement ignored before a pull counts as a drag.
pub const DEAD_ZONE: f64 = 10.0;

/// Damped distance past which the indicator is considered visible.
pub const VISIBLE_MIN: f64 = 10.0;

/// Ceiling on the damped distance, as a multiple of the threshold.
pub const MAX_PULL_FACTOR: f64 = 1.5;

#[derive(Debug, Clone, PartialEq)]
pub struct PullConfig {
  pub threshold: f64,
  pub resistance: f64,
  pub enabled: bool,
  pub refresh_timeout: Option<Duration>,
}

impl Default for PullConfig {
  fn default() -> Self {
    Self {
      threshold: 80.0,
      resistance: 2.5,
      enabled: true,
      refresh_timeout: None,
    }
  }
}

impl From<&PullSettings> for PullConfig {
  fn from(settings: &PullSettings) -> Self {
    Self {
      threshold: settings.threshold,
      resistance: settings.resistance,
      enabled: settings.enabled,
      refresh_timeout: settings.refresh_timeout_ms.map(Duration::from_millis),
    }
  }
}

impl PullConfig {
  pub fn max_distance(&self) -> f64 {
    self.threshold * MAX_PULL_FACTOR
  }

  /// Damped, capped distance for a raw downward movement.
  pub fn damp(&self, delta_y: f64) -> f64 {
    (delta_y / self.resistance).min(self.max_distance())
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TouchEvent {
  /// `scroll_top` is the container's scroll offset when the finger landed
  Start { y: f64, scroll_top: f64 },
  Move { y: f64 },
  End,
}

/// What the event source should do after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureAction {
  /// Not part of a recognized pull
  Ignored,
  Tracking,
  /// Actively dragging; suppress native scroll and overscroll
  PreventDefault,
  Released(Release),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
  /// Never became a drag
  Idle,
  /// Threshold reached; the caller must run the refresh
  Refresh,
  /// Below threshold (or a refresh already running); animating back
  SpringBack,
}

#[derive(Debug, Clone, Copy)]
struct Touch {
  start_y: f64,
  current_y: f64,
  is_dragging: bool,
}

#[derive(Debug)]
pub struct PullToRefresh {
  config: PullConfig,
  touch: Option<Touch>,
  pull_distance: f64,
  is_pulling: bool,
  is_refreshing: bool,
  spring: Option<SpringBack>,
}

impl PullToRefresh {
  pub fn new(config: PullConfig) -> Self {
    Self {
      config,
      touch: None,
      pull_distance: 0.0,
      is_pulling: false,
      is_refreshing: false,
      spring: None,
    }
  }

  pub fn config(&self) -> &PullConfig {
    &self.config
  }

  pub fn set_enabled(&mut self, enabled: bool) {
    self.config.enabled = enabled;
    if !enabled && !self.is_refreshing {
      self.touch = None;
      self.reset();
    }
  }

  pub fn pull_distance(&self) -> f64 {
    self.pull_distance
  }

  pub fn is_pulling(&self) -> bool {
    self.is_pulling
  }

  pub fn is_refreshing(&self) -> bool {
    self.is_refreshing
  }

  pub fn should_show_refresh_indicator(&self) -> bool {
    self.is_pulling || self.is_refreshing
  }

  pub fn threshold_reached(&self) -> bool {
    self.pull_distance >= self.config.threshold
  }

  /// Pull progress towards the threshold in `[0, 1]`.
  pub fn progress(&self) -> f64 {
    (self.pull_distance / self.config.threshold).clamp(0.0, 1.0)
  }

  pub fn is_animating(&self) -> bool {
    self.spring.is_some()
  }

  pub fn handle(&mut self, event: TouchEvent) -> GestureAction {
    match event {
      TouchEvent::Start { y, scroll_top } => {
        if self.touch_start(y, scroll_top) {
          GestureAction::Tracking
        } else {
          GestureAction::Ignored
        }
      }
      TouchEvent::Move { y } => {
        if self.touch_move(y) {
          GestureAction::PreventDefault
        } else if self.touch.is_some() {
          GestureAction::Tracking
        } else {
          GestureAction::Ignored
        }
      }
      TouchEvent::End => {
        if self.touch.is_some() {
          GestureAction::Released(self.touch_end())
        } else {
          GestureAction::Ignored
        }
      }
    }
  }

  /// Start tracking if the container is scrolled exactly to the top.
  pub fn touch_start(&mut self, y: f64, scroll_top: f64) -> bool {
    if !self.config.enabled || scroll_top != 0.0 {
      self.touch = None;
      return false;
    }

    if !self.is_refreshing {
      self.spring = None;
      self.reset();
    }
    self.touch = Some(Touch {
      start_y: y,
      current_y: y,
      is_dragging: false,
    });
    true
  }

  /// Update the pull for a finger at `y`. Returns whether native scrolling
  /// must be suppressed for this move.
  pub fn touch_move(&mut self, y: f64) -> bool {
    let Some(touch) = self.touch.as_mut() else {
      return false;
    };

    touch.current_y = y;
    let delta_y = touch.current_y - touch.start_y;

    if delta_y <= 0.0 {
      touch.is_dragging = false;
      self.is_pulling = false;
      self.pull_distance = 0.0;
      return false;
    }

    if delta_y <= DEAD_ZONE {
      return false;
    }

    touch.is_dragging = true;
    self.pull_distance = self.config.damp(delta_y);
    self.is_pulling = self.pull_distance > VISIBLE_MIN;
    true
  }

  /// Resolve the gesture. On [`Release::Refresh`] the state is already
  /// marked refreshing and the caller owns running the refresh.
  pub fn touch_end(&mut self) -> Release {
    let Some(touch) = self.touch.take() else {
      return Release::Idle;
    };

    if !touch.is_dragging {
      if !self.is_refreshing {
        self.reset();
      }
      return Release::Idle;
    }

    if self.threshold_reached() && !self.is_refreshing {
      debug!(distance = self.pull_distance, "Pull released past threshold");
      self.is_refreshing = true;
      return Release::Refresh;
    }

    self.spring = Some(SpringBack::new(self.pull_distance));
    Release::SpringBack
  }

  /// Advance the spring-back by one frame. Returns whether it is still running.
  pub fn tick(&mut self) -> bool {
    let Some(spring) = self.spring.as_mut() else {
      return false;
    };

    self.pull_distance = spring.step();
    if spring.is_settled() {
      self.spring = None;
      self.is_pulling = false;
      return false;
    }
    true
  }

  /// Enter the refreshing state without a gesture (e.g. a key binding).
  /// Returns false if a refresh is already running.
  pub fn request_refresh(&mut self) -> bool {
    if self.is_refreshing {
      return false;
    }
    self.spring = None;
    self.is_refreshing = true;
    true
  }

  /// Await `on_refresh` and return to idle whatever it yields.
  pub async fn refresh<F, Fut>(&mut self, on_refresh: F)
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<()>>,
  {
    let outcome = run_guarded(self.config.refresh_timeout, on_refresh()).await;
    self.finish_refresh(outcome);
  }

  /// [`Self::touch_end`] followed by the refresh when the threshold was reached.
  pub async fn touch_end_with<F, Fut>(&mut self, on_refresh: F) -> Release
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<()>>,
  {
    let release = self.touch_end();
    if release == Release::Refresh {
      self.refresh(on_refresh).await;
    }
    release
  }

  /// Report the end of a refresh run elsewhere. Errors are logged, never
  /// propagated.
  pub fn finish_refresh(&mut self, outcome: Result<()>) {
    if let Err(e) = outcome {
      warn!("Refresh failed: {:#}", e);
    }
    self.is_refreshing = false;
    self.spring = None;
    self.reset();
  }

  fn reset(&mut self) {
    self.is_pulling = false;
    self.pull_distance = 0.0;
  }
}

/// Await a refresh future, failing it if it outlives `timeout`.
pub async fn run_guarded<T, Fut>(timeout: Option<Duration>, refresh: Fut) -> Result<T>
where
  Fut: Future<Output = Result<T>>,
{
  match timeout {
    Some(limit) => tokio::time::timeout(limit, refresh)
      .await
      .map_err(|_| eyre!("Refresh timed out after {:?}", limit))?,
    None => refresh.await,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Arc;

  fn pull(distance_px: f64) -> PullToRefresh {
    let mut ptr = PullToRefresh::new(PullConfig::default());
    assert!(ptr.touch_start(100.0, 0.0));
    ptr.touch_move(100.0 + distance_px);
    ptr
  }

  #[test]
  fn test_ignores_gesture_when_not_at_top() {
    let mut ptr = PullToRefresh::new(PullConfig::default());
    assert_eq!(
      ptr.handle(TouchEvent::Start {
        y: 0.0,
        scroll_top: 4.0
      }),
      GestureAction::Ignored
    );
    assert_eq!(ptr.handle(TouchEvent::Move { y: 300.0 }), GestureAction::Ignored);
    assert_eq!(ptr.pull_distance(), 0.0);
    assert_eq!(ptr.handle(TouchEvent::End), GestureAction::Ignored);
  }

  #[test]
  fn test_disabled_ignores_everything() {
    let mut ptr = PullToRefresh::new(PullConfig {
      enabled: false,
      ..PullConfig::default()
    });
    assert!(!ptr.touch_start(0.0, 0.0));
    assert!(!ptr.touch_move(300.0));
    assert_eq!(ptr.touch_end(), Release::Idle);
  }

  #[test]
  fn test_dead_zone_does_not_drag() {
    let mut ptr = pull(10.0);
    assert_eq!(ptr.pull_distance(), 0.0);
    assert!(!ptr.is_pulling());
    assert_eq!(ptr.touch_end(), Release::Idle);
  }

  #[test]
  fn test_drag_prevents_default() {
    let mut ptr = PullToRefresh::new(PullConfig::default());
    ptr.handle(TouchEvent::Start {
      y: 0.0,
      scroll_top: 0.0,
    });
    assert_eq!(ptr.handle(TouchEvent::Move { y: 5.0 }), GestureAction::Tracking);
    assert_eq!(
      ptr.handle(TouchEvent::Move { y: 11.0 }),
      GestureAction::PreventDefault
    );
  }

  #[test]
  fn test_pulling_needs_visible_distance() {
    // 20px raw -> 8px damped, dragging but not yet visible
    let ptr = pull(20.0);
    assert!((ptr.pull_distance() - 8.0).abs() < 1e-9);
    assert!(!ptr.is_pulling());

    let ptr = pull(30.0);
    assert!(ptr.is_pulling());
  }

  #[test]
  fn test_moving_back_up_resets_to_idle() {
    let mut ptr = pull(150.0);
    assert!(ptr.is_pulling());

    ptr.touch_move(100.0);
    assert!(!ptr.is_pulling());
    assert_eq!(ptr.pull_distance(), 0.0);

    ptr.touch_move(40.0);
    assert!(!ptr.is_pulling());
    assert_eq!(ptr.pull_distance(), 0.0);
    assert_eq!(ptr.touch_end(), Release::Idle);
  }

  #[test]
  fn test_distance_is_capped() {
    let mut ptr = pull(10_000.0);
    assert_eq!(ptr.pull_distance(), 120.0);
    ptr.touch_move(1_000_000.0);
    assert_eq!(ptr.pull_distance(), 120.0);
    assert_eq!(ptr.progress(), 1.0);
  }

  #[test]
  fn test_200px_pull_reaches_threshold() {
    let mut ptr = pull(200.0);
    assert_eq!(ptr.pull_distance(), 80.0);
    assert!(ptr.threshold_reached());

    assert_eq!(ptr.touch_end(), Release::Refresh);
    assert!(ptr.is_refreshing());
    assert!(ptr.should_show_refresh_indicator());
  }

  #[test]
  fn test_50px_pull_springs_back_to_zero() {
    let mut ptr = pull(50.0);
    assert_eq!(ptr.pull_distance(), 20.0);
    assert_eq!(ptr.touch_end(), Release::SpringBack);
    assert!(!ptr.is_refreshing());

    let mut frames = 0;
    while ptr.tick() {
      frames += 1;
      assert!(frames < 100);
    }
    assert_eq!(ptr.pull_distance(), 0.0);
    assert!(!ptr.is_pulling());
    assert!(!ptr.is_animating());
  }

  #[tokio::test]
  async fn test_refresh_runs_once_and_clears_state() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut ptr = pull(200.0);

    assert_eq!(ptr.touch_end(), Release::Refresh);
    assert!(ptr.is_refreshing());

    let counter = Arc::clone(&calls);
    ptr
      .refresh(|| async move {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
      })
      .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!ptr.is_refreshing());
    assert!(!ptr.is_pulling());
    assert_eq!(ptr.pull_distance(), 0.0);
  }

  #[tokio::test]
  async fn test_below_threshold_never_refreshes() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut ptr = pull(50.0);

    let counter = Arc::clone(&calls);
    let release = ptr
      .touch_end_with(|| async move {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
      })
      .await;

    assert_eq!(release, Release::SpringBack);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn test_failed_refresh_does_not_wedge() {
    let mut ptr = pull(300.0);
    let release = ptr
      .touch_end_with(|| async { Err(eyre!("backend unavailable")) })
      .await;

    assert_eq!(release, Release::Refresh);
    assert!(!ptr.is_refreshing());
    assert!(!ptr.should_show_refresh_indicator());
    assert_eq!(ptr.pull_distance(), 0.0);
  }

  #[tokio::test]
  async fn test_hung_refresh_times_out() {
    let mut ptr = PullToRefresh::new(PullConfig {
      refresh_timeout: Some(Duration::from_millis(20)),
      ..PullConfig::default()
    });
    ptr.touch_start(0.0, 0.0);
    ptr.touch_move(250.0);

    ptr
      .touch_end_with(|| async {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(())
      })
      .await;

    assert!(!ptr.is_refreshing());
  }

  #[test]
  fn test_gesture_during_refresh_cannot_trigger() {
    let mut ptr = pull(200.0);
    assert_eq!(ptr.touch_end(), Release::Refresh);

    assert!(ptr.touch_start(0.0, 0.0));
    assert!(ptr.touch_move(400.0));
    assert!(ptr.threshold_reached());
    assert_eq!(ptr.touch_end(), Release::SpringBack);
    assert!(ptr.is_refreshing());

    ptr.finish_refresh(Ok(()));
    assert!(!ptr.is_refreshing());
    assert!(!ptr.is_animating());
    assert_eq!(ptr.pull_distance(), 0.0);
  }

  #[test]
  fn test_request_refresh_is_exclusive() {
    let mut ptr = PullToRefresh::new(PullConfig::default());
    assert!(ptr.request_refresh());
    assert!(!ptr.request_refresh());
    ptr.finish_refresh(Err(eyre!("boom")));
    assert!(ptr.request_refresh());
  }

  #[test]
  fn test_config_from_settings() {
    let settings = PullSettings {
      threshold: 60.0,
      refresh_timeout_ms: Some(1500),
      ..PullSettings::default()
    };
    let config = PullConfig::from(&settings);
    assert_eq!(config.threshold, 60.0);
    assert_eq!(config.max_distance(), 90.0);
    assert_eq!(config.refresh_timeout, Some(Duration::from_millis(1500)));
  }
}
