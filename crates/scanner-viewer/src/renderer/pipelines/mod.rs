pub mod points;
pub mod quads;
