// Audio module - device directory, tone synthesis and playback backends

pub mod cpal_output;
pub mod output;
pub mod stub;
pub mod tone;

pub use cpal_output::CpalOutput;
pub use output::{validate_tone, AudioOutput, DeviceInfo};
pub use stub::{NullOutput, PlayedTone};
pub use tone::{dbfs_to_amplitude, generate_tone, ToneShape};
