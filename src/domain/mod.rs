pub mod battery;
pub mod establishment;
pub mod types;

pub use battery::*;
pub use establishment::*;
pub use types::*;
