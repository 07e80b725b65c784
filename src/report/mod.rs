//! Report shaping: duration codec, data model, and the raw→typed normalizer.

pub mod duration;
pub mod model;
pub mod normalizer;
