pub mod adb;
pub mod config;
pub mod engine;
pub mod limits;
pub mod telemetry;

pub use config::{ConfigError, GeneratorConfig};
pub use engine::{run_generation, EngineError};
