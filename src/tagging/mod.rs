pub mod batch;
pub mod client;
pub mod db;
pub mod entry;
pub mod framework;
pub mod graphql;
pub mod lead;
pub mod reconcile;
pub mod serialization;

pub use client::{ClientConfig, DeepClient};
pub use framework::Framework;
