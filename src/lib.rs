pub mod cli;
pub mod config;
pub mod fetch;
pub mod git;
pub mod model;
pub mod report;
pub mod resolver;
pub mod verify;

mod api;
mod flock;
mod worker;

pub use api::{Error, VendorVerify, VendorVerifyBuilder, VerifyOptions};
pub use report::Outcome;
