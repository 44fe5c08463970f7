//! HTTP endpoint handlers.

pub mod boletim;
pub mod status;
