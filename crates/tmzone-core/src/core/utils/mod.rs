pub mod geometry;
pub mod physchem;
