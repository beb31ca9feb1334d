pub mod cdn;
pub mod cleanup;
pub mod connection;
pub mod ftp;
pub mod notifications;
pub mod orchestrator;
pub mod replace;
pub mod transfer;
pub mod verifier;
