//! Procedural generation for the driving terrain.

pub mod terrain;

pub use terrain::*;
