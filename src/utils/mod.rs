//! Utility modules: logging setup, developer bench lines, JSON bridging, numeric conversions.
pub mod devlog;
pub mod json;
pub mod logger;
pub mod num;
