/// COLMAP sparse model reader/writer module.
pub mod colmap;
