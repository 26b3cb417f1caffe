pub mod capture_device;
pub mod delegate;
pub mod framework;
