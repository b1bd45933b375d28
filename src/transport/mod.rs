//! Transport layer: terminal chat and the local echo backend

pub mod cli;
pub mod echo_server;

pub use echo_server::run_echo_server;
