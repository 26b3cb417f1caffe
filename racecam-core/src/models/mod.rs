pub mod available;
pub mod config;
pub mod device_config;
pub mod device_key;
pub mod error;
pub mod frame;
pub mod recording_metadata;
pub mod state;
