//! Offline support for the LiftLegends storefront.
//!
//! Two independent pieces:
//! - [`worker`]: a service-worker style controller that precaches the site
//!   shell, retires old cache versions and answers fetches network-first for
//!   navigations and cache-first for static assets.
//! - [`gesture`]: a pull-to-refresh recognizer with damped distance, a
//!   threshold-triggered refresh and a geometric spring-back.

pub mod cache;
pub mod config;
pub mod gesture;
pub mod http;
pub mod net;
pub mod worker;
