//! gamecms plugin core
//!
//! Discovers plugin main classes from a class map, keeps them in a lazily
//! populated registry, boots the enabled ones and lets them talk over a
//! priority-ordered event bus.

pub mod app;
pub mod cli;
pub mod config;
pub mod events;
pub mod logging;
pub mod plugin;
