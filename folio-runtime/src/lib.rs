pub mod call;
pub mod chat;
pub mod config_store;
pub mod runtime_engine;
