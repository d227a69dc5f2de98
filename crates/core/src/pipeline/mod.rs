pub mod aggregate;
pub mod normalize;
pub mod reshape;
pub mod rolling;
pub mod summary;
