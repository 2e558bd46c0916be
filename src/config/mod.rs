//! Configuration loading.

mod settings;

pub use settings::Settings;
