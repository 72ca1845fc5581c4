//! Core explainer engine module

pub mod config;
pub mod dataset;
pub mod errors;
pub mod explainer;
pub mod models;
pub mod simplifier;
pub mod terminology;
