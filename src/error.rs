use thiserror::Error;

/// Errors surfaced by the encoding pipeline. All of them are fatal for the
/// encoder instance that produced them; the caller must discard it.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("invalid parameters: {0}")]
    InvalidParameters(&'static str),

    #[error("frame is {frame_width}x{frame_height}, canvas is {canvas_width}x{canvas_height}")]
    DimensionMismatch {
        frame_width: u32,
        frame_height: u32,
        canvas_width: u32,
        canvas_height: u32,
    },

    #[error("frame violates the established contract: {0}")]
    FrameContractViolation(&'static str),

    #[error("finish() called before any frame was added")]
    EmptyFrameSequence,

    #[error("{op}() is not valid in the {state} state")]
    InvalidState { op: &'static str, state: &'static str },

    #[error("quantizer produced {0} colors, the palette limit is 256")]
    PaletteOverflow(usize),
}

pub type Result<T> = std::result::Result<T, EncodeError>;
