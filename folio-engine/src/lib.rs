pub mod chat;
pub mod engine;
pub mod error;
pub mod mode;
pub mod navigation;
pub mod reconciler;
pub mod session;
pub mod traits;
