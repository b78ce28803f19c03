pub mod audio;
pub mod device;
pub mod frame;
pub mod microphone;

pub use microphone::Microphone;
