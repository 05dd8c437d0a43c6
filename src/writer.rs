//! GIF89a container serialization. Pure byte appends: nothing already
//! written is ever revisited, the buffer only grows.

use crate::error::{EncodeError, Result};
use crate::lzw::CompressedBlock;
use crate::palette::Palette;

/// Per-frame hint to the renderer about how to treat the canvas before the
/// next frame is drawn.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum DisposalMethod {
    Unspecified = 0,
    #[default]
    Keep = 1,
    Background = 2,
    Previous = 3,
}

pub struct GifWriter {
    width: u16,
    height: u16,
    buf: Vec<u8>,
}

impl GifWriter {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            buf: Vec::new(),
        }
    }

    pub fn write_header(&mut self) {
        self.buf.extend_from_slice(b"GIF89a");
    }

    /// Logical screen descriptor followed by the global color table,
    /// padded with black up to the declared power-of-two size.
    pub fn write_screen_descriptor(&mut self, palette: &Palette) {
        self.buf.extend_from_slice(&self.width.to_le_bytes());
        self.buf.extend_from_slice(&self.height.to_le_bytes());
        let size = palette.size_field();
        // global color table present, color resolution mirrors table size,
        // sort flag clear
        self.buf.push(0x80 | (size << 4) | size);
        self.buf.push(0); // background color index
        self.buf.push(0); // pixel aspect ratio
        for color in palette.colors() {
            self.buf.extend_from_slice(&color.0);
        }
        for _ in palette.len()..palette.table_size() {
            self.buf.extend_from_slice(&[0, 0, 0]);
        }
    }

    /// NETSCAPE2.0 application extension; `count` of 0 loops forever.
    pub fn write_loop_extension(&mut self, count: u16) {
        self.buf.push(0x21);
        self.buf.push(0xFF);
        self.buf.push(0x0B);
        self.buf.extend_from_slice(b"NETSCAPE2.0");
        self.buf.push(3);
        self.buf.push(1);
        self.buf.extend_from_slice(&count.to_le_bytes());
        self.buf.push(0);
    }

    /// Graphic control extension, image descriptor and compressed data for
    /// one frame. The compressor already terminated the sub-block chain.
    pub fn write_frame(
        &mut self,
        delay_cs: u16,
        disposal: DisposalMethod,
        block: &CompressedBlock,
        width: u16,
        height: u16,
        left: u16,
        top: u16,
    ) -> Result<()> {
        if width == 0
            || height == 0
            || u32::from(left) + u32::from(width) > u32::from(self.width)
            || u32::from(top) + u32::from(height) > u32::from(self.height)
        {
            return Err(EncodeError::FrameContractViolation(
                "frame rectangle does not fit the canvas",
            ));
        }

        self.buf.push(0x21);
        self.buf.push(0xF9);
        self.buf.push(4);
        self.buf.push((disposal as u8) << 2);
        self.buf.extend_from_slice(&delay_cs.to_le_bytes());
        self.buf.push(0); // transparent color index (unused)
        self.buf.push(0);

        self.buf.push(0x2C);
        self.buf.extend_from_slice(&left.to_le_bytes());
        self.buf.extend_from_slice(&top.to_le_bytes());
        self.buf.extend_from_slice(&width.to_le_bytes());
        self.buf.extend_from_slice(&height.to_le_bytes());
        self.buf.push(0); // no local color table, not interlaced

        self.buf.push(block.min_code_size);
        self.buf.extend_from_slice(&block.data);
        Ok(())
    }

    pub fn write_trailer(&mut self) {
        self.buf.push(0x3B);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn take_bytes(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }
}
