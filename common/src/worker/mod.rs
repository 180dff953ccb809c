// Worker module for job consumption and execution

pub mod consumer;
pub mod runner;

pub use consumer::WorkerJobConsumer;
pub use runner::JobRunner;
