//! NeuQuant color quantization (Dekker's self-organizing map, fixed-point).
//!
//! A one-dimensional network of neurons is trained over a pseudo-random
//! sample of the input pixels; each neuron converges toward a cluster of
//! the input colors. Learning rate and neighborhood radius are annealed
//! over the run, so early samples shape the palette coarsely and late
//! samples refine it.

use crate::error::{EncodeError, Result};
use image::Rgb;

// Network parameters from the original NeuQuant paper. Color channels are
// carried with 4 extra bits of precision for the duration of training.
const NET_BIAS_SHIFT: i32 = 4;
const N_CYCLES: usize = 100;

const INT_BIAS_SHIFT: i32 = 16;
const INT_BIAS: i32 = 1 << INT_BIAS_SHIFT;
const GAMMA_SHIFT: i32 = 10;
const BETA_SHIFT: i32 = 10;
const BETA: i32 = INT_BIAS >> BETA_SHIFT;
const BETA_GAMMA: i32 = INT_BIAS << (GAMMA_SHIFT - BETA_SHIFT);

const RADIUS_BIAS_SHIFT: i32 = 6;
const RADIUS_BIAS: i32 = 1 << RADIUS_BIAS_SHIFT;
const RADIUS_DEC: i32 = 30;

const ALPHA_BIAS_SHIFT: i32 = 10;
const INIT_ALPHA: i32 = 1 << ALPHA_BIAS_SHIFT;

const RAD_BIAS: i32 = 1 << 8;
const ALPHA_RAD_BIAS: i32 = 1 << 18;

// Prime strides walk the image in a deterministic pseudo-random order.
const PRIME1: usize = 499;
const PRIME2: usize = 491;
const PRIME3: usize = 487;
const PRIME4: usize = 503;

struct Network {
    neurons: Vec<[i32; 3]>,
    freq: Vec<i32>,
    bias: Vec<i32>,
}

impl Network {
    fn new(netsize: usize) -> Self {
        let neurons = (0..netsize)
            .map(|i| {
                let v = ((i << (NET_BIAS_SHIFT as usize + 8)) / netsize) as i32;
                [v, v, v]
            })
            .collect();
        Self {
            neurons,
            freq: vec![INT_BIAS / netsize as i32; netsize],
            bias: vec![0; netsize],
        }
    }

    /// Find the best-matching neuron for a sample. The winner by raw
    /// distance collects frequency; the returned winner is penalized by
    /// how often a neuron has already won, which spreads neurons over
    /// the input distribution.
    fn contest(&mut self, pixel: [i32; 3]) -> usize {
        let mut best_dist = i32::MAX;
        let mut best_bias_dist = i32::MAX;
        let mut best = 0;
        let mut best_bias = 0;
        for (i, n) in self.neurons.iter().enumerate() {
            let dist =
                (n[0] - pixel[0]).abs() + (n[1] - pixel[1]).abs() + (n[2] - pixel[2]).abs();
            if dist < best_dist {
                best_dist = dist;
                best = i;
            }
            let bias_dist = dist - (self.bias[i] >> (INT_BIAS_SHIFT - NET_BIAS_SHIFT));
            if bias_dist < best_bias_dist {
                best_bias_dist = bias_dist;
                best_bias = i;
            }
            let beta_freq = self.freq[i] >> BETA_SHIFT;
            self.freq[i] -= beta_freq;
            self.bias[i] += beta_freq << GAMMA_SHIFT;
        }
        self.freq[best] += BETA;
        self.bias[best] -= BETA_GAMMA;
        best_bias
    }

    fn move_neuron(&mut self, alpha: i32, i: usize, pixel: [i32; 3]) {
        let n = &mut self.neurons[i];
        for c in 0..3 {
            n[c] -= alpha * (n[c] - pixel[c]) / INIT_ALPHA;
        }
    }

    fn move_neighbors(&mut self, rad_power: &[i32], i: usize, pixel: [i32; 3]) {
        for (m, &a) in rad_power.iter().enumerate().skip(1) {
            if i + m < self.neurons.len() {
                self.nudge(a, i + m, pixel);
            }
            if let Some(k) = i.checked_sub(m) {
                self.nudge(a, k, pixel);
            }
        }
    }

    fn nudge(&mut self, a: i32, i: usize, pixel: [i32; 3]) {
        let n = &mut self.neurons[i];
        for c in 0..3 {
            n[c] -= a * (n[c] - pixel[c]) / ALPHA_RAD_BIAS;
        }
    }
}

fn rad_power(alpha: i32, rad: usize) -> Vec<i32> {
    let rad2 = (rad * rad) as i32;
    (0..rad)
        .map(|m| alpha * (((rad2 - (m * m) as i32) * RAD_BIAS) / rad2))
        .collect()
}

/// Train a network of `target_size` neurons over `pixels` and return the
/// learned colors. Exact duplicates among the converged neurons are
/// collapsed (first occurrence wins), so the result length is in
/// `1..=target_size`.
///
/// `sample_fac` trades speed for fidelity: one pixel in `sample_fac` is
/// presented to the network. Inputs smaller than the prime stride are
/// always sampled exhaustively.
pub fn train(pixels: &[Rgb<u8>], target_size: usize, sample_fac: i32) -> Result<Vec<Rgb<u8>>> {
    if target_size == 0 || target_size > 256 {
        return Err(EncodeError::InvalidParameters(
            "palette size must be in 1..=256",
        ));
    }
    if sample_fac < 1 {
        return Err(EncodeError::InvalidParameters("sample factor must be >= 1"));
    }
    if pixels.is_empty() {
        return Err(EncodeError::InvalidParameters("no pixels to sample"));
    }

    let netsize = target_size;
    let mut net = Network::new(netsize);

    let n = pixels.len();
    let sample_fac = if n < PRIME4 { 1 } else { sample_fac as usize };
    let sample_count = (n / sample_fac).max(1);
    let delta = (sample_count / N_CYCLES).max(1);
    let alpha_dec = 30 + (sample_fac as i32 - 1) / 3;

    let step = if n < PRIME4 {
        1
    } else if n % PRIME1 != 0 {
        PRIME1
    } else if n % PRIME2 != 0 {
        PRIME2
    } else if n % PRIME3 != 0 {
        PRIME3
    } else {
        PRIME4
    };

    let mut alpha = INIT_ALPHA;
    let mut radius = ((netsize >> 3) as i32) * RADIUS_BIAS;
    let mut rad = (radius >> RADIUS_BIAS_SHIFT).max(0) as usize;
    if rad <= 1 {
        rad = 0;
    }
    let mut powers = rad_power(alpha, rad);

    let mut pos = 0;
    for i in 0..sample_count {
        let p = pixels[pos];
        let pixel = [
            (p[0] as i32) << NET_BIAS_SHIFT,
            (p[1] as i32) << NET_BIAS_SHIFT,
            (p[2] as i32) << NET_BIAS_SHIFT,
        ];
        let winner = net.contest(pixel);
        net.move_neuron(alpha, winner, pixel);
        if rad > 0 {
            net.move_neighbors(&powers, winner, pixel);
        }

        pos += step;
        while pos >= n {
            pos -= n;
        }
        if (i + 1) % delta == 0 {
            alpha -= alpha / alpha_dec;
            radius -= radius / RADIUS_DEC;
            rad = (radius >> RADIUS_BIAS_SHIFT).max(0) as usize;
            if rad <= 1 {
                rad = 0;
            }
            powers = rad_power(alpha, rad);
        }
    }

    let mut colors: Vec<Rgb<u8>> = Vec::with_capacity(netsize);
    for neuron in &net.neurons {
        let color = Rgb([
            (neuron[0] >> NET_BIAS_SHIFT).clamp(0, 255) as u8,
            (neuron[1] >> NET_BIAS_SHIFT).clamp(0, 255) as u8,
            (neuron[2] >> NET_BIAS_SHIFT).clamp(0, 255) as u8,
        ]);
        if !colors.contains(&color) {
            colors.push(color);
        }
    }
    Ok(colors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_tone(count: usize) -> Vec<Rgb<u8>> {
        (0..count)
            .map(|i| {
                if i % 2 == 0 {
                    Rgb([255, 0, 0])
                } else {
                    Rgb([0, 0, 255])
                }
            })
            .collect()
    }

    fn gradient(count: usize) -> Vec<Rgb<u8>> {
        (0..count)
            .map(|i| {
                let v = (i % 256) as u8;
                Rgb([v, v.wrapping_mul(7), 255 - v])
            })
            .collect()
    }

    #[test]
    fn rejects_bad_parameters() {
        let pixels = gradient(16);
        assert!(matches!(
            train(&pixels, 0, 10),
            Err(EncodeError::InvalidParameters(_))
        ));
        assert!(matches!(
            train(&pixels, 257, 10),
            Err(EncodeError::InvalidParameters(_))
        ));
        assert!(matches!(
            train(&pixels, 16, 0),
            Err(EncodeError::InvalidParameters(_))
        ));
        assert!(matches!(
            train(&[], 16, 10),
            Err(EncodeError::InvalidParameters(_))
        ));
    }

    #[test]
    fn palette_length_stays_within_target() {
        for target in [1, 2, 3, 16, 100, 256] {
            let colors = train(&gradient(4096), target, 1).unwrap();
            assert!(!colors.is_empty());
            assert!(colors.len() <= target);
        }
    }

    #[test]
    fn flat_input_collapses_to_a_small_palette() {
        let pixels = vec![Rgb([40, 200, 90]); 2048];
        let colors = train(&pixels, 64, 1).unwrap();
        assert!(colors.len() < 64);
        assert!(colors.contains(&Rgb([40, 200, 90])));
    }

    #[test]
    fn dominant_colors_are_represented() {
        let colors = train(&two_tone(4096), 16, 1).unwrap();
        for target in [[255u8, 0, 0], [0, 0, 255]] {
            let hit = colors.iter().any(|c| {
                c[0].abs_diff(target[0]) <= 16
                    && c[1].abs_diff(target[1]) <= 16
                    && c[2].abs_diff(target[2]) <= 16
            });
            assert!(hit, "no palette entry near {target:?} in {colors:?}");
        }
    }

    #[test]
    fn tiny_inputs_are_sampled_exhaustively() {
        let colors = train(&two_tone(4), 4, 30).unwrap();
        assert!(!colors.is_empty());
        assert!(colors.len() <= 4);
    }

    #[test]
    fn training_is_deterministic() {
        let pixels = gradient(3000);
        let a = train(&pixels, 32, 3).unwrap();
        let b = train(&pixels, 32, 3).unwrap();
        assert_eq!(a, b);
    }
}
