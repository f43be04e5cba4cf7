//! External predictor integration.
//!
//! - `gateway`: the capability contract and its offline implementation
//! - `client`: HTTP implementation against the predictor service
//! - `validator`: plausibility checks applied before a prediction is trusted

pub mod client;
pub mod gateway;
pub mod validator;

pub use client::*;
pub use gateway::*;
pub use validator::*;
