//! Slack integration for Gemification
//!
//! This crate connects the gem ledger to Slack workspaces:
//! - **Web API** (`api`) - outbound chat calls behind the `SlackApi` trait
//! - **Events** (`events`) - Socket Mode frame decoding and the event dispatcher
//! - **Socket Mode** (`socket`) - envelope pump with reconnection logic
//! - **Bots** (`tracker`) - one live connection per installed team
//! - **Commands** (`commands`, `service`) - message classification and execution
//! - **Dialogues** (`configurator`) - team bootstrap, admin and group management conversations
//!
//! # Architecture
//!
//! ```text
//! Socket Mode → EventDispatcher → BotRuntime → GemBot → commands / Configurator / awards
//!                                                  ↓
//!                                   Repositories + DirectoryCache + SlackApi
//! ```

pub mod api;
pub mod awards;
pub mod blocks;
pub mod commands;
pub mod configurator;
pub mod context;
pub mod directory;
pub mod events;
pub mod guard;
pub mod reports;
pub mod service;
pub mod socket;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod tracker;
