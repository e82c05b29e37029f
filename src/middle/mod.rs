//! Middle-end module - constant folding

pub mod fold;

pub use fold::{fold, ConstantFolding, FoldStats};
