pub mod config;
pub mod constants;
pub mod credit;
pub mod geo;
pub mod projection;
pub mod tiling_scheme;
