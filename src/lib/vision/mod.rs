pub mod decode;
pub mod normalize;
pub mod overlay;
pub mod resize;
