pub mod batch;
pub mod factor;
pub mod key;
pub mod range;
