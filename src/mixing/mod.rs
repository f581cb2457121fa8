//! Track mixing: crossfade, beatmatch and automix strategies on top of tempo
//! alignment, with a cap on output length.

pub mod align;
pub mod engine;
pub mod ops;
pub mod types;

pub use align::{align_tempo, conform_to};
pub use engine::MixEngine;
pub use ops::{cap_length, fade_in, fade_out, overlay};
pub use types::{MixRequest, MixResult, Strategy};
