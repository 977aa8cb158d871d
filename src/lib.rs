//! Likesort library - shared modules for the categorization pipeline.

pub mod categorize;
pub mod config;
pub mod ledger;
pub mod llm;
pub mod models;
pub mod parse;
pub mod playlists;
pub mod progress;
pub mod spotify;
pub mod store;
pub mod summary;
