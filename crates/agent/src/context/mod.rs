//! Context assembly for model requests.

pub mod builder;

pub use builder::ContextBuilder;
