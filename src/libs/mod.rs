//! Core library modules of the updater.
//!
//! Leaf-first: [`paths`], [`hasher`] and [`version`] have no dependencies on
//! the rest; [`manifest`] and [`diff`] describe and compare file trees;
//! [`fetch`] and [`extract`] bring a release onto disk; [`apply`] and
//! [`handoff`] commit it; [`update`] sequences one cycle. [`config`],
//! [`state`], [`process`] and [`messages`] belong to the host side.

pub mod apply;
pub mod cancel;
pub mod config;
pub mod data_storage;
pub mod diff;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod handoff;
pub mod hasher;
pub mod manifest;
pub mod messages;
pub mod paths;
pub mod process;
pub mod progress;
pub mod release;
pub mod state;
pub mod update;
pub mod version;
pub mod view;
