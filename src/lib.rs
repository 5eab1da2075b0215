pub mod config;
pub mod mapping;
pub mod orchestrator;
pub mod osc;
#[cfg(feature = "desktop")]
pub mod render;
pub mod sensor;
pub mod skeleton;
pub mod trail;
pub mod transport;
