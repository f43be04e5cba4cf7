pub mod consumption;
pub mod production;
pub mod weather;

pub use consumption::*;
pub use production::*;
pub use weather::*;
