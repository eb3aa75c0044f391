//! Permission system.
//!
//! Two sources of authority compose here:
//!
//! - Global ranks (developer/sudo/support/whitelist/pro) stored in the
//!   database and served by [`PrivilegeStore`] with a read-through cache.
//! - Chat-scoped admin rights fetched from Telegram and cached for ten
//!   minutes by [`AdminChecker`].
//!
//! [`Gate`] resolves the two into an effective privilege level and answers
//! the per-command access checks the dispatch pipeline runs.

mod checker;
mod gate;
mod ranks;

pub use checker::{AdminChecker, AdminInfo, AdminRight, BotRight};
pub use gate::{Access, Gate, PrivilegeLevel};
pub use ranks::{PrivilegeStore, Rank};
