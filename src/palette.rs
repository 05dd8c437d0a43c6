use crate::error::{EncodeError, Result};
use crate::neuquant;
use image::{imageops::ColorMap, Rgb, RgbImage};

pub const MAX_PALETTE_COLORS: usize = 256;

/// An established GIF color table plus a lookup index.
///
/// Entries are sorted by their green channel into a side index so that
/// nearest-color queries can start at the query's green value and expand
/// outward, pruning a direction as soon as its green distance alone exceeds
/// the best squared distance found. The result is the true nearest entry
/// under squared Euclidean RGB distance; exact ties go to the lowest
/// palette index.
pub struct Palette {
    colors: Vec<Rgb<u8>>,
    by_green: Vec<(Rgb<u8>, u16)>,
}

#[inline]
fn dist2(a: Rgb<u8>, b: Rgb<u8>) -> i32 {
    let dr = a[0] as i32 - b[0] as i32;
    let dg = a[1] as i32 - b[1] as i32;
    let db = a[2] as i32 - b[2] as i32;
    dr * dr + dg * dg + db * db
}

impl Palette {
    /// Train a palette of at most `max_colors` entries over the sampled
    /// pixels.
    pub fn from_pixels(pixels: &[Rgb<u8>], max_colors: usize, sample_fac: i32) -> Result<Self> {
        Self::build(neuquant::train(pixels, max_colors, sample_fac)?)
    }

    /// Use a caller-supplied color table as-is.
    pub fn from_colors(colors: &[Rgb<u8>]) -> Result<Self> {
        Self::build(colors.to_vec())
    }

    fn build(colors: Vec<Rgb<u8>>) -> Result<Self> {
        if colors.is_empty() {
            return Err(EncodeError::InvalidParameters("palette cannot be empty"));
        }
        if colors.len() > MAX_PALETTE_COLORS {
            return Err(EncodeError::PaletteOverflow(colors.len()));
        }
        let mut by_green: Vec<(Rgb<u8>, u16)> = colors
            .iter()
            .enumerate()
            .map(|(i, &c)| (c, i as u16))
            .collect();
        by_green.sort_by_key(|&(c, i)| (c[1], i));
        Ok(Self { colors, by_green })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    #[inline]
    pub fn colors(&self) -> &[Rgb<u8>] {
        &self.colors
    }

    /// Declared color-table size: the next power of two, minimum 2.
    #[inline]
    pub fn table_size(&self) -> usize {
        self.colors.len().next_power_of_two().max(2)
    }

    /// The GIF color-table-size field: log2(table size) - 1.
    #[inline]
    pub fn size_field(&self) -> u8 {
        self.table_size().trailing_zeros() as u8 - 1
    }

    /// Minimum LZW code size for index streams over this palette.
    #[inline]
    pub fn min_code_size(&self) -> u8 {
        (self.table_size().trailing_zeros() as u8).max(2)
    }

    /// Index of the nearest palette entry. Total: every query maps to a
    /// valid index, and a query equal to an entry maps to that entry.
    pub fn lookup(&self, color: Rgb<u8>) -> usize {
        let sorted = &self.by_green;
        let g = color[1] as i32;
        let start = sorted.partition_point(|&(c, _)| (c[1] as i32) < g);

        let mut best_dist = i32::MAX;
        let mut best_idx = 0usize;
        let mut up = start;
        let mut down = start;
        let mut up_open = up < sorted.len();
        let mut down_open = down > 0;
        while up_open || down_open {
            if up_open {
                let (c, i) = sorted[up];
                let dg = c[1] as i32 - g;
                if dg * dg > best_dist {
                    up_open = false;
                } else {
                    let d = dist2(c, color);
                    if d < best_dist || (d == best_dist && (i as usize) < best_idx) {
                        best_dist = d;
                        best_idx = i as usize;
                    }
                    up += 1;
                    up_open = up < sorted.len();
                }
            }
            if down_open {
                let (c, i) = sorted[down - 1];
                let dg = g - c[1] as i32;
                if dg * dg > best_dist {
                    down_open = false;
                } else {
                    let d = dist2(c, color);
                    if d < best_dist || (d == best_dist && (i as usize) < best_idx) {
                        best_dist = d;
                        best_idx = i as usize;
                    }
                    down -= 1;
                    down_open = down > 0;
                }
            }
        }
        best_idx
    }

    /// Map a frame to palette indices in row-major order.
    pub fn map_image(&self, img: &RgbImage) -> Vec<u8> {
        img.pixels().map(|&p| self.lookup(p) as u8).collect()
    }
}

impl ColorMap for Palette {
    type Color = Rgb<u8>;

    #[inline]
    fn index_of(&self, color: &Self::Color) -> usize {
        self.lookup(*color)
    }

    #[inline]
    fn map_color(&self, color: &mut Self::Color) {
        *color = self.colors[self.lookup(*color)];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_entries_map_to_their_own_index() {
        let colors: Vec<Rgb<u8>> = (0..=255u8)
            .step_by(5)
            .map(|v| Rgb([v, 255 - v, v.wrapping_mul(3)]))
            .collect();
        let palette = Palette::from_colors(&colors).unwrap();
        for (i, &c) in colors.iter().enumerate() {
            assert_eq!(palette.lookup(c), i);
        }
    }

    #[test]
    fn lookup_is_true_nearest() {
        let colors = [
            Rgb([0, 0, 0]),
            Rgb([255, 255, 255]),
            Rgb([200, 10, 10]),
            Rgb([10, 200, 10]),
            Rgb([10, 10, 200]),
        ];
        let palette = Palette::from_colors(&colors).unwrap();
        // brute force over a coarse grid of queries
        for r in (0..=255u16).step_by(17) {
            for g in (0..=255u16).step_by(17) {
                for b in (0..=255u16).step_by(17) {
                    let q = Rgb([r as u8, g as u8, b as u8]);
                    let got = palette.lookup(q);
                    let want = colors
                        .iter()
                        .enumerate()
                        .min_by_key(|&(i, &c)| (dist2(c, q), i))
                        .map(|(i, _)| i)
                        .unwrap();
                    assert_eq!(got, want, "query {q:?}");
                }
            }
        }
    }

    #[test]
    fn equidistant_queries_take_the_lowest_index() {
        let palette =
            Palette::from_colors(&[Rgb([4, 10, 10]), Rgb([8, 10, 10]), Rgb([6, 10, 10])]).unwrap();
        // (5,10,10) is equidistant from entries 0 and 2
        assert_eq!(palette.lookup(Rgb([5, 10, 10])), 0);
        // (7,10,10) is equidistant from entries 1 and 2
        assert_eq!(palette.lookup(Rgb([7, 10, 10])), 1);
    }

    #[test]
    fn table_size_rounds_up_to_a_power_of_two() {
        let one = Palette::from_colors(&[Rgb([1, 2, 3])]).unwrap();
        assert_eq!(one.table_size(), 2);
        assert_eq!(one.size_field(), 0);
        assert_eq!(one.min_code_size(), 2);

        let colors: Vec<Rgb<u8>> = (0..5u8).map(|v| Rgb([v, v, v])).collect();
        let five = Palette::from_colors(&colors).unwrap();
        assert_eq!(five.table_size(), 8);
        assert_eq!(five.size_field(), 2);
        assert_eq!(five.min_code_size(), 3);

        let colors: Vec<Rgb<u8>> = (0..=255u8).map(|v| Rgb([v, v, 0])).collect();
        let full = Palette::from_colors(&colors).unwrap();
        assert_eq!(full.table_size(), 256);
        assert_eq!(full.size_field(), 7);
        assert_eq!(full.min_code_size(), 8);
    }

    #[test]
    fn rejects_empty_and_oversized_palettes() {
        assert!(matches!(
            Palette::from_colors(&[]),
            Err(EncodeError::InvalidParameters(_))
        ));
        let colors: Vec<Rgb<u8>> = (0..257).map(|i| Rgb([(i % 256) as u8, 0, 0])).collect();
        assert!(matches!(
            Palette::from_colors(&colors),
            Err(EncodeError::PaletteOverflow(257))
        ));
    }

    #[test]
    fn map_image_produces_one_valid_index_per_pixel() {
        let palette = Palette::from_colors(&[Rgb([0, 0, 0]), Rgb([255, 0, 0])]).unwrap();
        let img = RgbImage::from_fn(4, 3, |x, _| {
            if x % 2 == 0 {
                Rgb([250, 5, 5])
            } else {
                Rgb([10, 10, 10])
            }
        });
        let indices = palette.map_image(&img);
        assert_eq!(indices.len(), 12);
        assert!(indices.iter().all(|&i| (i as usize) < palette.len()));
        assert_eq!(indices[0], 1);
        assert_eq!(indices[1], 0);
    }

    #[test]
    fn trained_palette_round_trips_its_own_entries() {
        let pixels: Vec<Rgb<u8>> = (0..2048)
            .map(|i| Rgb([(i % 256) as u8, (i % 31) as u8 * 8, 255 - (i % 256) as u8]))
            .collect();
        let palette = Palette::from_pixels(&pixels, 64, 1).unwrap();
        for (i, &c) in palette.colors().iter().enumerate() {
            assert_eq!(palette.lookup(c), i, "entry {c:?}");
        }
    }
}
