//! Subprocess-isolated frame extraction and encoding.
//!
//! Everything that touches ffmpeg or burns CPU on quantization runs in a
//! separate worker process ([`service`] behind the `vivify-worker` binary);
//! [`host`] spawns and supervises it so a crash never takes the caller down.

pub mod host;
pub mod protocol;
pub mod service;

mod encode_apng;
mod encode_gif;
mod extract;

pub use extract::is_ffmpeg_on_path;
pub use host::run_encode_job;
pub use protocol::{WorkerErrorKind, WorkerReply, WorkerRequest};
