//! Pixel helpers shared by the built-in effects

use rayon::prelude::*;

use crate::video::{luma, PixelLayout};

/// Read a pixel as `[r, g, b]` whatever its layout
#[inline]
pub fn get_rgb(pixel: &[u8], layout: PixelLayout) -> [u8; 3] {
    let [r, g, b] = layout.rgb_indices();
    [pixel[r], pixel[g], pixel[b]]
}

/// Write `[r, g, b]` into a pixel; gray pixels receive the luma
#[inline]
pub fn put_rgb(pixel: &mut [u8], layout: PixelLayout, rgb: [u8; 3]) {
    if layout == PixelLayout::Gray8 {
        pixel[0] = luma(rgb[0], rgb[1], rgb[2]);
        return;
    }
    let [r, g, b] = layout.rgb_indices();
    pixel[r] = rgb[0];
    pixel[g] = rgb[1];
    pixel[b] = rgb[2];
}

#[inline]
pub fn clamp_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Separable box blur over interleaved channels, in place
///
/// Borders are handled by shrinking the window, so flat images stay flat.
pub fn box_blur(data: &mut [u8], width: usize, height: usize, channels: usize, radius: usize) {
    if radius == 0 || width == 0 || height == 0 {
        return;
    }
    let stride = width * channels;
    let mut horizontal = vec![0u8; data.len()];

    horizontal
        .par_chunks_mut(stride)
        .zip(data.par_chunks(stride))
        .for_each(|(out, row)| {
            for x in 0..width {
                let lo = x.saturating_sub(radius);
                let hi = (x + radius).min(width - 1);
                let n = (hi - lo + 1) as u32;
                for c in 0..channels {
                    let sum: u32 = (lo..=hi).map(|i| row[i * channels + c] as u32).sum();
                    out[x * channels + c] = ((sum + n / 2) / n) as u8;
                }
            }
        });

    let src = &horizontal;
    data.par_chunks_mut(stride).enumerate().for_each(|(y, out)| {
        let lo = y.saturating_sub(radius);
        let hi = (y + radius).min(height - 1);
        let n = (hi - lo + 1) as u32;
        for (i, value) in out.iter_mut().enumerate() {
            let sum: u32 = (lo..=hi).map(|yy| src[yy * stride + i] as u32).sum();
            *value = ((sum + n / 2) / n) as u8;
        }
    });
}

/// Luma plane of an interleaved frame
pub fn gray_plane(data: &[u8], channels: usize, layout: PixelLayout) -> Vec<u8> {
    data.par_chunks(channels)
        .map(|p| {
            let [r, g, b] = get_rgb(p, layout);
            luma(r, g, b)
        })
        .collect()
}
