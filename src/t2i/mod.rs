pub mod generators;
pub mod response;

pub use generators::{ImageGenerator, of};
pub use response::{ImageResponse, ImageType};
