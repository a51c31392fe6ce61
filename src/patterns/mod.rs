//! Pattern representations and search algorithms.

pub mod pattern;
pub mod scanner;

pub use pattern::Pattern;
pub use scanner::{BoyerMooreHorspool, Naive, Raita, Scanner, TurboBoyerMoore, default_scanner};
