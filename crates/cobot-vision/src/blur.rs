// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Separable Gaussian blur.
//!
//! Kernel construction follows the usual computer-vision conventions so that
//! thresholds tuned on camera images carry over:
//!
//! - `sigma <= 0` derives sigma from the kernel size as
//!   `0.3 * ((ksize - 1) * 0.5 - 1) + 0.8`, and sizes up to 7 use the
//!   classic binomial-like fixed taps
//! - borders are mirrored without repeating the edge pixel
//!   (`dcb|abcd|cba`)

use ndarray::Array2;

const SMALL_KERNELS: [&[f64]; 4] = [
    &[1.0],
    &[0.25, 0.5, 0.25],
    &[0.0625, 0.25, 0.375, 0.25, 0.0625],
    &[
        0.03125, 0.109375, 0.21875, 0.28125, 0.21875, 0.109375, 0.03125,
    ],
];

/// Returns the normalized 1-D Gaussian kernel of odd length `size`.
pub fn gaussian_kernel_1d(size: usize, sigma: f64) -> Vec<f64> {
    debug_assert!(size % 2 == 1, "kernel size must be odd");

    if sigma <= 0.0 && size <= 7 {
        return SMALL_KERNELS[size / 2].to_vec();
    }

    let sigma = if sigma > 0.0 {
        sigma
    } else {
        0.3 * ((size as f64 - 1.0) * 0.5 - 1.0) + 0.8
    };

    let center = (size / 2) as f64;
    let scale = -0.5 / (sigma * sigma);
    let mut kernel: Vec<f64> = (0..size)
        .map(|i| {
            let x = i as f64 - center;
            (scale * x * x).exp()
        })
        .collect();

    let sum: f64 = kernel.iter().sum();
    kernel.iter_mut().for_each(|value| *value /= sum);
    kernel
}

/// Maps an out-of-range index into `0..len` by mirroring around the edge
/// pixels without repeating them.
fn reflect_101(index: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let last = len as isize - 1;
    let mut i = index;
    while i < 0 || i > last {
        if i < 0 {
            i = -i;
        }
        if i > last {
            i = 2 * last - i;
        }
    }
    i as usize
}

/// Blurs `image` with a `(width, height)` Gaussian kernel.
///
/// `sigma` applies to both directions; `sigma <= 0` derives each direction's
/// sigma from its kernel size.
pub fn gaussian_blur(image: &Array2<f32>, ksize: (usize, usize), sigma: f64) -> Array2<f32> {
    let (rows, cols) = image.dim();
    if rows == 0 || cols == 0 {
        return image.clone();
    }

    let kx = gaussian_kernel_1d(ksize.0, sigma);
    let ky = gaussian_kernel_1d(ksize.1, sigma);
    let rx = (kx.len() / 2) as isize;
    let ry = (ky.len() / 2) as isize;

    let mut horizontal = Array2::<f64>::zeros((rows, cols));
    for r in 0..rows {
        for c in 0..cols {
            let mut sum = 0.0;
            for (k, weight) in kx.iter().enumerate() {
                let src = reflect_101(c as isize + k as isize - rx, cols);
                sum += weight * image[[r, src]] as f64;
            }
            horizontal[[r, c]] = sum;
        }
    }

    let mut output = Array2::<f32>::zeros((rows, cols));
    for r in 0..rows {
        for c in 0..cols {
            let mut sum = 0.0;
            for (k, weight) in ky.iter().enumerate() {
                let src = reflect_101(r as isize + k as isize - ry, rows);
                sum += weight * horizontal[[src, c]];
            }
            output[[r, c]] = sum as f32;
        }
    }

    output
}

// =============================================================================
// Tests
// =============================================================================
