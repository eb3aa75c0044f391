//! Database models.

mod greet;
mod guard;
mod policy;

pub use greet::{GreetSettings, PendingVerification, VerifiedHuman, VerifyMode};
pub use guard::{FloodAction, FloodConfig, GuardSettings, RaidSettings};
pub use policy::{ChatPolicy, GlobalPolicy};
