//! Job definitions read from files.

pub mod yaml;
