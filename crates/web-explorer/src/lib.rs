//! Web Explorer — autonomous discovery of the states of a web application.
//!
//! The core keeps the graph of discovered web states, decides which action
//! to try next, finds its way back to unexplored states, and replays
//! recorded operations. Browser and model access come in through the
//! traits in [`collaborators`].

pub mod collaborators;
pub mod config;
pub mod controller;
pub mod domain;
pub mod export;
pub mod replay;
pub mod search;
pub mod selection;
pub mod similarity;
pub mod storage;
pub mod store;
pub mod types;

pub use collaborators::{Collaborators, Describer, Executor, Navigator};
pub use config::ExplorerConfig;
pub use controller::{Explorer, Phase, StopReason};
pub use domain::in_domain;
pub use export::{to_dot, to_graph};
pub use replay::replay;
pub use search::{find_next_action, path_to, search, Frontier};
pub use selection::{select_action, select_action_with};
pub use similarity::{cosine_similarity, first_match};
pub use storage::{write_simple, SnapshotReader, SnapshotWriter};
pub use store::{Resolved, StateStore};
pub use types::*;
