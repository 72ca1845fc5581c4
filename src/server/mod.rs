//! HTTP surface: single-page UI and JSON API

pub mod api;
