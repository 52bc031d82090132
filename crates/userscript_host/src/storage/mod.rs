//! Persisted value channel contracts and adapters.

pub mod value_store;
