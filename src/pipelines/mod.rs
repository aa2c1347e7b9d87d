//! Render pipelines. Currently the only one is the lit, textured mesh pipeline.

pub mod mesh;
