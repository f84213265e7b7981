pub mod config;
pub mod notebook;
pub mod pipeline;
pub mod storage;
