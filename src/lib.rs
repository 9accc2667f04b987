//! Lead Triage — hierarchical sales-email classification service.

pub mod api;
pub mod config;
pub mod error;
pub mod model;
pub mod normalize;
pub mod pipeline;
