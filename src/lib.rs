pub mod aggregate;
pub mod alert;
pub mod classify;
pub mod config;
pub mod error;
pub mod feed;
pub mod pipeline;
pub mod scheduler;
pub mod shutdown;
pub mod sink;
pub mod storage;
