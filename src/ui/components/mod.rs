pub mod pull_indicator;
