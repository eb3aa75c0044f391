//! Repositories: cached data access, one per feature.
//!
//! Every repository that stores per-chat state exposes `migrate_chat` so the
//! group -> supergroup migration event can relabel its rows.

mod greet_repo;
mod guard_repo;
mod policy_repo;
mod rank_repo;

pub use greet_repo::GreetRepo;
pub use guard_repo::GuardRepo;
pub use policy_repo::PolicyRepo;
pub use rank_repo::RankRepo;
