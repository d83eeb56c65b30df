pub mod config;
pub mod error;
pub mod filter;
pub mod locate;
pub mod notify;
pub mod process;
pub mod records;
pub mod snapshot;
pub mod telemetry;
pub mod view;
