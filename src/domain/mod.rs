pub mod geom;
pub mod level;
pub mod movement;
