pub mod greedy;
pub mod types;

pub use greedy::*;
pub use types::*;
