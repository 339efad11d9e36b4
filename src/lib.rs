pub mod client;
pub mod config;
pub mod dns;
pub mod engine;
pub mod error;
pub mod model;
pub mod output;
pub mod resolver;
pub mod scheduler;
pub mod sources;
pub mod sweep;

pub use dns::DNSPacket;
