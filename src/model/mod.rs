//! Data model module which contains the crime dataset, its district level aggregation and the in-memory dataset store.

pub mod dataset;
pub mod district;
pub mod error;
pub mod store;
pub mod util;
