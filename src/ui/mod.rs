//! Terminal UI components for the chat widget

pub mod commands;
pub mod composer;
pub mod history;

pub use commands::{ParsedCommand, SlashCommand, get_help_text};
pub use composer::{Composer, ComposerResult};
pub use history::HistoryView;
