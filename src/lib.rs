pub mod cli;
pub mod config;
pub mod dataset;
pub mod error;
pub mod presets;
pub mod services;
pub mod time;

#[cfg(test)]
pub mod test_support;
