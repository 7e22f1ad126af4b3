pub mod affine;
pub mod point;
pub mod region;
