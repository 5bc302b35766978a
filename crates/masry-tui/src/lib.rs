//! masry-tui: Terminal UI components
//!
//! Widgets and terminal plumbing for the masry chat client, built on
//! ratatui and crossterm. Nothing here knows about conversations; the
//! binary maps its state into the view types these widgets take.

pub mod input;
pub mod terminal;
pub mod theme;
pub mod widgets;

pub use terminal::TerminalGuard;
pub use theme::Theme;
