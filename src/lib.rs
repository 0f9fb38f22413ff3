pub mod browser;
pub mod capture;
pub mod clock;
pub mod config;
pub mod error;
pub mod job;
pub mod login;
pub mod navigator;
pub mod orchestrator;
pub mod publish;
pub mod session;
