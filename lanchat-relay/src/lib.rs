//! `LanChat` relay server library.
//!
//! Exposes the relay core for use in tests and embedding. The relay keeps
//! a registry of connected participants and routes private, group and
//! broadcast packets between them over any [`transport::Transport`].

pub mod config;
pub mod dispatch;
pub mod registry;
pub mod service;
pub mod transport;
