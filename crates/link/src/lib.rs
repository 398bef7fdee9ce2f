pub mod config;
pub mod framing;
pub mod link;

pub use config::{LinkConfig, LinkMode};
pub use framing::FrameDecoder;
pub use link::{LinkError, SerialLink};
