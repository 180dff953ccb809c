// Common library shared by the api, worker and cli binaries

pub mod approve;
pub mod bootstrap;
pub mod chain;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod models;
pub mod queue;
pub mod retry;
pub mod telemetry;
pub mod worker;
