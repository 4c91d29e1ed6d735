pub mod catalog;
pub mod engine;
pub mod epub;
pub mod error;
pub mod reader;
pub mod settings;
pub mod store;
pub mod util;

#[cfg(test)]
mod test_support;
