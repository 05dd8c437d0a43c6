//! Animated GIF89a encoding: NeuQuant palette training, nearest-color
//! indexing, GIF-variant LZW compression and container serialization,
//! driven through a start / add_frame / finish lifecycle.

mod encoder;
mod error;
mod lzw;
mod neuquant;
mod palette;
mod writer;

pub use encoder::{EncoderOptions, Frame, GifEncoder, Repeat};
pub use error::{EncodeError, Result};
pub use lzw::{compress, CompressedBlock};
pub use palette::{Palette, MAX_PALETTE_COLORS};
pub use writer::{DisposalMethod, GifWriter};
