use crate::error::{EncodeError, Result};
use crate::lzw;
use crate::palette::Palette;
use crate::writer::{DisposalMethod, GifWriter};
use image::{DynamicImage, Rgb, RgbImage};
use log::debug;

/// One input frame: truecolor pixels plus its display delay in
/// centiseconds. The encoder only reads it during `add_frame`.
pub struct Frame {
    image: RgbImage,
    delay_cs: u16,
    disposal: DisposalMethod,
}

impl Frame {
    pub fn new(image: RgbImage, delay_cs: u16) -> Self {
        Self {
            image,
            delay_cs,
            disposal: DisposalMethod::Keep,
        }
    }

    /// Frame from a raw row-major RGB buffer.
    pub fn from_rgb(width: u32, height: u32, data: &[u8], delay_cs: u16) -> Result<Self> {
        let image = RgbImage::from_raw(width, height, data.to_vec()).ok_or(
            EncodeError::InvalidParameters("pixel buffer does not match the dimensions"),
        )?;
        Ok(Self::new(image, delay_cs))
    }

    /// Frame from a raw row-major RGBA buffer; the alpha channel is
    /// dropped (GIF frames here are fully opaque).
    pub fn from_rgba(width: u32, height: u32, data: &[u8], delay_cs: u16) -> Result<Self> {
        if data.len() != width as usize * height as usize * 4 {
            return Err(EncodeError::InvalidParameters(
                "pixel buffer does not match the dimensions",
            ));
        }
        let rgb: Vec<u8> = data
            .chunks_exact(4)
            .flat_map(|p| [p[0], p[1], p[2]])
            .collect();
        Self::from_rgb(width, height, &rgb, delay_cs)
    }

    pub fn from_image(image: &DynamicImage, delay_cs: u16) -> Self {
        Self::new(image.to_rgb8(), delay_cs)
    }

    pub fn with_disposal(mut self, disposal: DisposalMethod) -> Self {
        self.disposal = disposal;
        self
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Looping behavior carried by the NETSCAPE2.0 extension. `Never` omits
/// the extension entirely.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Repeat {
    Never,
    Infinite,
    Finite(u16),
}

pub struct EncoderOptions {
    pub repeat: Repeat,
    /// Palette size ceiling handed to the quantizer, in 1..=256.
    pub max_colors: usize,
    /// Quantizer sample factor: 1 samples every pixel (best quality),
    /// larger values sample fewer.
    pub sample_fac: i32,
    /// Caller-supplied global palette. When absent the palette is trained
    /// on the first frame and locked from then on.
    pub palette: Option<Palette>,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            repeat: Repeat::Infinite,
            max_colors: 256,
            sample_fac: 10,
            palette: None,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum State {
    Idle,
    Started,
    Finished,
}

impl State {
    fn name(self) -> &'static str {
        match self {
            State::Idle => "idle",
            State::Started => "started",
            State::Finished => "finished",
        }
    }
}

/// Drives the whole pipeline through a strict
/// `start -> add_frame* -> finish` lifecycle. Out-of-order calls fail with
/// `InvalidState`; after any error the instance must be discarded.
pub struct GifEncoder {
    width: u32,
    height: u32,
    repeat: Repeat,
    max_colors: usize,
    sample_fac: i32,
    palette: Option<Palette>,
    writer: GifWriter,
    state: State,
    frames_written: usize,
    frames_expected: Option<usize>,
    progress: Option<Box<dyn FnMut(f64) + Send>>,
}

impl GifEncoder {
    pub fn new(width: u32, height: u32, options: EncoderOptions) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(EncodeError::InvalidParameters(
                "canvas dimensions must be positive",
            ));
        }
        if width > u16::MAX as u32 || height > u16::MAX as u32 {
            return Err(EncodeError::InvalidParameters(
                "canvas dimensions exceed the GIF limit of 65535",
            ));
        }
        if options.max_colors == 0 || options.max_colors > 256 {
            return Err(EncodeError::InvalidParameters(
                "palette size must be in 1..=256",
            ));
        }
        if options.sample_fac < 1 {
            return Err(EncodeError::InvalidParameters("sample factor must be >= 1"));
        }
        Ok(Self {
            width,
            height,
            repeat: options.repeat,
            max_colors: options.max_colors,
            sample_fac: options.sample_fac,
            palette: options.palette,
            writer: GifWriter::new(width as u16, height as u16),
            state: State::Idle,
            frames_written: 0,
            frames_expected: None,
            progress: None,
        })
    }

    /// Advisory frame count used for fractional progress reporting.
    pub fn expect_frames(&mut self, count: usize) {
        self.frames_expected = Some(count);
    }

    /// Register a callback invoked after every `add_frame` with
    /// `frames_done / frames_expected`. Purely advisory.
    pub fn on_progress<F>(&mut self, callback: F)
    where
        F: FnMut(f64) + Send + 'static,
    {
        self.progress = Some(Box::new(callback));
    }

    pub fn start(&mut self) -> Result<()> {
        if self.state != State::Idle {
            return Err(EncodeError::InvalidState {
                op: "start",
                state: self.state.name(),
            });
        }
        self.writer.write_header();
        if self.palette.is_some() {
            // a supplied global palette locks the screen layout right away
            self.write_preamble();
        }
        self.state = State::Started;
        Ok(())
    }

    pub fn add_frame(&mut self, frame: &Frame) -> Result<()> {
        if self.state != State::Started {
            return Err(EncodeError::InvalidState {
                op: "add_frame",
                state: self.state.name(),
            });
        }
        if frame.width() != self.width || frame.height() != self.height {
            return Err(EncodeError::DimensionMismatch {
                frame_width: frame.width(),
                frame_height: frame.height(),
                canvas_width: self.width,
                canvas_height: self.height,
            });
        }

        if self.palette.is_none() {
            let pixels: Vec<Rgb<u8>> = frame.image.pixels().copied().collect();
            let palette = Palette::from_pixels(&pixels, self.max_colors, self.sample_fac)?;
            debug!(
                "trained palette from first frame: {} colors, table size {}",
                palette.len(),
                palette.table_size()
            );
            self.palette = Some(palette);
            self.write_preamble();
        }

        let palette = self.palette.as_ref().ok_or(
            EncodeError::FrameContractViolation("no palette established for this frame"),
        )?;
        let indices = palette.map_image(&frame.image);
        let block = lzw::compress(&indices, palette.min_code_size());
        self.writer.write_frame(
            frame.delay_cs,
            frame.disposal,
            &block,
            self.width as u16,
            self.height as u16,
            0,
            0,
        )?;
        self.frames_written += 1;
        debug!(
            "frame {}: {} indices, {} output bytes so far",
            self.frames_written,
            indices.len(),
            self.writer.len()
        );

        if let (Some(callback), Some(total)) = (self.progress.as_mut(), self.frames_expected) {
            if total > 0 {
                callback(self.frames_written as f64 / total as f64);
            }
        }
        Ok(())
    }

    /// Write the trailer and hand the finished document to the caller.
    pub fn finish(&mut self) -> Result<Vec<u8>> {
        if self.state != State::Started {
            return Err(EncodeError::InvalidState {
                op: "finish",
                state: self.state.name(),
            });
        }
        if self.frames_written == 0 {
            return Err(EncodeError::EmptyFrameSequence);
        }
        self.state = State::Finished;
        self.writer.write_trailer();
        Ok(self.writer.take_bytes())
    }

    fn write_preamble(&mut self) {
        if let Some(palette) = &self.palette {
            self.writer.write_screen_descriptor(palette);
            match self.repeat {
                Repeat::Never => {}
                Repeat::Infinite => self.writer.write_loop_extension(0),
                Repeat::Finite(count) => self.writer.write_loop_extension(count),
            }
        }
    }
}
