//! Vivify turns a static transparent cutout into a short looping animation.
//!
//! The pipeline composites the cutout onto a solid key color, sends it to a
//! remote image-to-video model, then keys the backdrop back out of every
//! generated frame and encodes the result as GIF and APNG:
//!
//! - Build an [`Animator`] from a [`RemoteConfig`]
//! - Pick a motion: a catalog preset ([`presets::static_presets`]) or a
//!   custom prompt via [`MotionSpec`]
//! - Call [`Animator::generate`] and watch events arrive on a [`ProgressSink`]
#![forbid(unsafe_code)]

pub mod chroma;
pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod presets;
pub mod progress;
pub mod queue;
pub mod upload;
pub mod worker;

pub use chroma::{KeyColor, KeyTuning};
pub use config::RemoteConfig;
pub use error::{VivifyError, VivifyResult};
pub use model::{AnimationResult, CutoutImage, FrameRgba, GenerateOptions, MotionSpec};
pub use pipeline::Animator;
pub use presets::{MotionPreset, PresetSuggester};
pub use progress::{ProgressEvent, ProgressSink, Stage};
