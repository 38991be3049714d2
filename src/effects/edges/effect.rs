use rayon::prelude::*;

use crate::{
    effects::{
        pixel::{box_blur, gray_plane, put_rgb},
        Effect, EffectDescriptor,
    },
    error::ApplyError,
    params::{Condition, ParameterSpec, ResolvedParameterSet},
    performance::QualityTier,
    video::FrameBuffer,
};

use super::{ALGORITHM, BACKGROUND, BLUR_PREPROCESSING, BLUR_RADIUS, EDGE_COLOR, INVERT, THRESHOLD};

/// Edge map drawn over black or over the original image
pub struct EdgeDetectionEffect;

impl EdgeDetectionEffect {
    pub fn new() -> Self {
        Self
    }

    /// Gradient magnitude of a gray plane, clamped to 0-255
    fn magnitude(gray: &[u8], width: usize, height: usize, laplacian: bool) -> Vec<u8> {
        let at = |x: isize, y: isize| -> i32 {
            let x = x.clamp(0, width as isize - 1) as usize;
            let y = y.clamp(0, height as isize - 1) as usize;
            gray[y * width + x] as i32
        };

        let mut out = vec![0u8; gray.len()];
        out.par_chunks_mut(width).enumerate().for_each(|(y, row)| {
            let y = y as isize;
            for (x, value) in row.iter_mut().enumerate() {
                let x = x as isize;
                let m = if laplacian {
                    (4 * at(x, y) - at(x - 1, y) - at(x + 1, y) - at(x, y - 1) - at(x, y + 1)).abs()
                } else {
                    let gx = at(x + 1, y - 1) + 2 * at(x + 1, y) + at(x + 1, y + 1)
                        - at(x - 1, y - 1)
                        - 2 * at(x - 1, y)
                        - at(x - 1, y + 1);
                    let gy = at(x - 1, y + 1) + 2 * at(x, y + 1) + at(x + 1, y + 1)
                        - at(x - 1, y - 1)
                        - 2 * at(x, y - 1)
                        - at(x + 1, y - 1);
                    gx.abs() + gy.abs()
                };
                *value = m.min(255) as u8;
            }
        });
        out
    }
}

impl Default for EdgeDetectionEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for EdgeDetectionEffect {
    fn describe(&self) -> EffectDescriptor {
        EffectDescriptor::new("edge_detection", "Edge Detection", "Artistic", "1.0.0")
            .with_description("Outline contours with Sobel or Laplacian operators")
            .with_parameter(
                ParameterSpec::choice(ALGORITHM, "Sobel", &["Sobel", "Laplacian"])
                    .in_category("Detection")
                    .with_label("Algorithm"),
            )
            .with_parameter(
                ParameterSpec::integer(THRESHOLD, 64, 0, 255)
                    .in_category("Detection")
                    .with_label("Threshold"),
            )
            .with_parameter(
                ParameterSpec::boolean(BLUR_PREPROCESSING, true)
                    .in_category("Detection")
                    .with_label("Pre-blur")
                    .with_description("Smooth the image first to suppress noise"),
            )
            .with_parameter(
                ParameterSpec::integer(BLUR_RADIUS, 1, 1, 5)
                    .in_category("Detection")
                    .with_label("Pre-blur radius")
                    .depends_on(BLUR_PREPROCESSING, Condition::IsTrue)
                    .with_tier_override(QualityTier::Low, 1),
            )
            .with_parameter(
                ParameterSpec::color(EDGE_COLOR, [255, 255, 255])
                    .in_category("Style")
                    .with_label("Line color"),
            )
            .with_parameter(
                ParameterSpec::choice(BACKGROUND, "Black", &["Black", "Original"])
                    .in_category("Style")
                    .with_label("Background"),
            )
            .with_parameter(ParameterSpec::boolean(INVERT, false).in_category("Style").with_label("Invert"))
    }

    fn apply(
        &self,
        input: &FrameBuffer,
        params: &ResolvedParameterSet,
        output: &mut FrameBuffer,
    ) -> Result<(), ApplyError> {
        let (width, height) = (input.width() as usize, input.height() as usize);
        if width == 0 || height == 0 {
            return Ok(());
        }
        let layout = input.layout();
        let channels = input.channels();

        let mut gray = gray_plane(input.data(), channels, layout);
        if params.get_bool_or(BLUR_PREPROCESSING, true) {
            let radius = params.get_i64_or(BLUR_RADIUS, 1).max(0) as usize;
            box_blur(&mut gray, width, height, 1, radius);
        }

        let laplacian = params.get_str_or(ALGORITHM, "Sobel") == "Laplacian";
        let edges = Self::magnitude(&gray, width, height, laplacian);

        let threshold = params.get_i64_or(THRESHOLD, 64).clamp(0, 255) as u8;
        let color = params.get_color(EDGE_COLOR).unwrap_or([255, 255, 255]);
        let keep_original = params.get_str_or(BACKGROUND, "Black") == "Original";
        let invert = params.get_bool_or(INVERT, false);

        output
            .data_mut()
            .par_chunks_mut(channels)
            .zip(edges.par_iter())
            .for_each(|(pixel, &m)| {
                let is_edge = (m >= threshold) != invert;
                if is_edge {
                    put_rgb(pixel, layout, color);
                } else if !keep_original {
                    put_rgb(pixel, layout, [0, 0, 0]);
                }
            });

        Ok(())
    }
}
