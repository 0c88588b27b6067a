pub mod config;

pub use config::DumpConfig;
