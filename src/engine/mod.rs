//! External audio engine (ffmpeg/ffprobe) access.

pub mod command;
pub mod duration;
pub mod ffmpeg;

pub use command::{CommandOutput, CommandRunner, MockRunner, ProcessRunner};
pub use duration::{estimate_duration, measure_duration};
pub use ffmpeg::{AudioEngine, OutputFormat, output_format};
