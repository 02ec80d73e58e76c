//! Tree traversal and cursor resolution over parse snapshots.

pub mod cursor;
pub mod end_position;
pub mod walker;

pub use cursor::{called_feature_at, completions_at, feature_at, in_feature, ResolvedDecl};
pub use end_position::EndPositionResolver;
pub use walker::{traverse, NodeRef, WalkedPair};
