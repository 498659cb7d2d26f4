pub mod call_socket;
pub mod chat;
pub mod create_call;
pub mod frames;
pub mod parse;
pub mod request;
pub mod runtime;
