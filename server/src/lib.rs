//! noteshare library
//!
//! Note-taking backend: per-note sharing with view/edit grants, public
//! read-only links, favorites, trash and file attachments. Every request
//! is authorized by [`access::AccessResolver`] before it reads or writes.

pub mod access;
pub mod app;
pub mod commands;
pub mod config;
pub mod database;
pub mod error;
pub mod services;
pub mod storage;
pub mod telemetry;
