//! Render pipelines and the uniforms they bind.

pub mod basic;
pub mod light;
