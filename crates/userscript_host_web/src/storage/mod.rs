//! Persisted value channel adapters.

pub mod gm_value_store;
