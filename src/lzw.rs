//! GIF-variant LZW compression with variable code widths.
//!
//! Codes are packed least-significant-bit first and flushed into
//! length-prefixed sub-blocks of at most 255 payload bytes. The dictionary
//! is an open-addressing hash table keyed on (prefix code, next symbol),
//! reset via an explicit clear code whenever it reaches the 4096-entry cap.

const MAX_BITS: u32 = 12;
const MAX_CODES: u32 = 1 << MAX_BITS;
// Hash table size: a prime comfortably above the code cap keeps the
// open-addressing probe chains short.
const HASH_SIZE: usize = 5003;
const HASH_SHIFT: u32 = 4;
const SUB_BLOCK_MAX: usize = 255;

/// One frame's compressed image data: the minimum-code-size byte followed
/// by the sub-block chain, zero-length terminator included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedBlock {
    pub min_code_size: u8,
    pub data: Vec<u8>,
}

/// Compress a palette-index stream. `min_code_size` must be in `2..=8` and
/// every symbol must be below `1 << min_code_size`.
///
/// Output is deterministic: the same input always yields the same bytes.
pub fn compress(indices: &[u8], min_code_size: u8) -> CompressedBlock {
    debug_assert!((2..=8).contains(&min_code_size));
    Compressor::new(min_code_size).run(indices)
}

struct Compressor {
    min_code_size: u8,
    clear_code: u32,
    eof_code: u32,
    next_code: u32,
    code_bits: u32,
    max_code: u32,
    reset_width: bool,
    hash: Vec<i32>,
    codes: Vec<u16>,
    acc: u32,
    acc_bits: u32,
    block: Vec<u8>,
    out: Vec<u8>,
}

impl Compressor {
    fn new(min_code_size: u8) -> Self {
        let clear_code = 1u32 << min_code_size;
        Self {
            min_code_size,
            clear_code,
            eof_code: clear_code + 1,
            next_code: clear_code + 2,
            code_bits: min_code_size as u32 + 1,
            max_code: (1 << (min_code_size as u32 + 1)) - 1,
            reset_width: false,
            hash: vec![-1; HASH_SIZE],
            codes: vec![0; HASH_SIZE],
            acc: 0,
            acc_bits: 0,
            block: Vec::with_capacity(SUB_BLOCK_MAX),
            out: Vec::new(),
        }
    }

    fn run(mut self, indices: &[u8]) -> CompressedBlock {
        self.emit(self.clear_code);

        let mut iter = indices.iter();
        if let Some(&first) = iter.next() {
            let mut prefix = first as u32;
            'stream: for &symbol in iter {
                let symbol = symbol as u32;
                let key = ((symbol << MAX_BITS) + prefix) as i32;
                let mut slot = ((symbol << HASH_SHIFT) ^ prefix) as usize;

                if self.hash[slot] == key {
                    prefix = self.codes[slot] as u32;
                    continue;
                }
                if self.hash[slot] >= 0 {
                    // secondary probe
                    let disp = if slot == 0 { 1 } else { HASH_SIZE - slot };
                    loop {
                        slot = if slot >= disp {
                            slot - disp
                        } else {
                            slot + HASH_SIZE - disp
                        };
                        if self.hash[slot] == key {
                            prefix = self.codes[slot] as u32;
                            continue 'stream;
                        }
                        if self.hash[slot] < 0 {
                            break;
                        }
                    }
                }

                self.emit(prefix);
                prefix = symbol;
                if self.next_code < MAX_CODES {
                    self.codes[slot] = self.next_code as u16;
                    self.hash[slot] = key;
                    self.next_code += 1;
                } else {
                    // dictionary full: clear and start over
                    self.hash.fill(-1);
                    self.next_code = self.clear_code + 2;
                    self.reset_width = true;
                    self.emit(self.clear_code);
                }
            }
            self.emit(prefix);
        }
        self.emit(self.eof_code);
        self.finish()
    }

    fn emit(&mut self, code: u32) {
        self.acc |= code << self.acc_bits;
        self.acc_bits += self.code_bits;
        while self.acc_bits >= 8 {
            self.push_byte((self.acc & 0xFF) as u8);
            self.acc >>= 8;
            self.acc_bits -= 8;
        }
        // Widen after the code that fills the current width; the decoder
        // tracks the same boundary from its side of the stream.
        if self.next_code > self.max_code || self.reset_width {
            if self.reset_width {
                self.code_bits = self.min_code_size as u32 + 1;
                self.max_code = (1 << self.code_bits) - 1;
                self.reset_width = false;
            } else {
                self.code_bits += 1;
                self.max_code = if self.code_bits == MAX_BITS {
                    MAX_CODES
                } else {
                    (1 << self.code_bits) - 1
                };
            }
        }
    }

    fn push_byte(&mut self, byte: u8) {
        self.block.push(byte);
        if self.block.len() == SUB_BLOCK_MAX {
            self.flush_block();
        }
    }

    fn flush_block(&mut self) {
        if !self.block.is_empty() {
            self.out.push(self.block.len() as u8);
            self.out.extend_from_slice(&self.block);
            self.block.clear();
        }
    }

    fn finish(mut self) -> CompressedBlock {
        if self.acc_bits > 0 {
            self.push_byte((self.acc & 0xFF) as u8);
        }
        self.flush_block();
        self.out.push(0);
        CompressedBlock {
            min_code_size: self.min_code_size,
            data: self.out,
        }
    }
}
