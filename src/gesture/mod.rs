//! Pull-to-refresh for scrollable lists.

mod pull;
mod spring;

pub use pull::{
  run_guarded, GestureAction, PullConfig, PullToRefresh, Release, TouchEvent, DEAD_ZONE,
  MAX_PULL_FACTOR, VISIBLE_MIN,
};
pub use spring::{next_distance, SpringBack};
