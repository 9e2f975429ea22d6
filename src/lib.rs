//! convobot - a transcript-polling chat bot: identity resolution, message
//! grouping, seen tracking and command dispatch over a pluggable transport.

pub mod bot;
pub mod commands;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod matcher;
pub mod model;
pub mod reconstruct;
pub mod runner;
pub mod seen;
pub mod subprocess;
pub mod telemetry;
pub mod transport;
