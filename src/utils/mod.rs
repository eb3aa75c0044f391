//! Utility functions.
//!
//! Text escaping, user mentions and the duration grammar shared by the
//! moderation commands.

pub mod duration;
pub mod text;

pub use duration::{format_duration, parse_duration};
pub use text::{fill_greeting, html_escape, mention_html};
