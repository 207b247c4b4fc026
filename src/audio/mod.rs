//! # Audio File Decoding
//!
//! Turns audio files on disk into the 16kHz mono f32 PCM the recognizer
//! expects. WAV files are decoded in-process; every other supported
//! container is delegated to an external FFmpeg binary, whose presence is
//! probed once at startup and exposed as a capability flag.

pub mod decoder;

pub use decoder::{AudioDecoder, DecodedAudio};
