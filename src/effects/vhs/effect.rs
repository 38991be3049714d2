// src/effects/vhs/effect.rs - VHS tape emulation

use rand::{rngs::SmallRng, Rng, SeedableRng};

use crate::{
    effects::{
        pixel::{clamp_u8, get_rgb, put_rgb},
        Effect, EffectDescriptor,
    },
    error::ApplyError,
    params::{Condition, ParamValue, ParameterSpec, ResolvedParameterSet},
    performance::QualityTier,
    video::FrameBuffer,
};

use super::{
    CHROMA_SHIFT, COLOR_BLEEDING, CUSTOM_MODE, INTENSITY, MODE, NOISE_LEVEL, SATURATION_BOOST, SCANLINE_INTENSITY,
    TRACKING_ERROR,
};

/// Per-stage strengths, either from a preset mode or the custom parameters
#[derive(Debug, Clone, Copy, PartialEq)]
struct VhsSettings {
    scanlines: f32,
    bleeding: f32,
    tracking: f32,
    noise: f32,
    chroma: f32,
    saturation: f32,
}

impl VhsSettings {
    fn preset(mode: &str) -> Self {
        let [scanlines, bleeding, tracking, noise, chroma, saturation] = match mode {
            "Subtle" => [0.4, 0.3, 0.1, 0.2, 0.3, 0.2],
            "Damaged" => [1.0, 1.0, 0.9, 0.9, 1.0, 0.6],
            _ => [0.9, 0.8, 0.5, 0.6, 0.7, 0.4],
        };
        Self {
            scanlines,
            bleeding,
            tracking,
            noise,
            chroma,
            saturation,
        }
    }

    fn from_params(params: &ResolvedParameterSet) -> Self {
        let mode = params.get_str_or(MODE, "Classic");
        if mode != CUSTOM_MODE {
            return Self::preset(mode);
        }
        let classic = Self::preset("Classic");
        let get = |key: &str, fallback: f32| params.get_f64(key).map_or(fallback, |v| v as f32);
        Self {
            scanlines: get(SCANLINE_INTENSITY, classic.scanlines),
            bleeding: get(COLOR_BLEEDING, classic.bleeding),
            tracking: get(TRACKING_ERROR, classic.tracking),
            noise: get(NOISE_LEVEL, classic.noise),
            chroma: get(CHROMA_SHIFT, classic.chroma),
            saturation: get(SATURATION_BOOST, classic.saturation),
        }
    }
}

/// VHS-style video effect
///
/// Noise and tracking glitches are seeded from the frame's sequence number,
/// so processing the same frame twice gives the same output.
pub struct VhsEffect;

impl VhsEffect {
    pub fn new() -> Self {
        Self
    }

    /// Darken alternating lines, with an extra-dark line every 8 rows at high intensity
    fn apply_scanlines(&self, frame: &mut FrameBuffer, intensity: f32) {
        let layout = frame.layout();
        let stride = frame.stride();
        let channels = frame.channels();

        for (y, row) in frame.data_mut().chunks_exact_mut(stride).enumerate() {
            let line_intensity = if y % 2 == 0 {
                1.0 - intensity * 0.4
            } else {
                1.0 - intensity * 0.2
            };
            let factor = if y % 8 == 0 && intensity > 0.5 {
                line_intensity * 0.7
            } else {
                line_intensity
            };

            for pixel in row.chunks_exact_mut(channels) {
                let rgb = get_rgb(pixel, layout).map(|c| clamp_u8(c as f32 * factor));
                put_rgb(pixel, layout, rgb);
            }
        }
    }

    /// Red bleeds right, blue bleeds left, green smears slightly
    fn apply_color_bleeding(&self, frame: &mut FrameBuffer, intensity: f32) {
        let (width, height) = (frame.width(), frame.height());
        if width < 5 || intensity <= 0.0 {
            return;
        }
        let layout = frame.layout();
        let original = frame.clone();
        let blend = intensity * 0.4;

        for y in 0..height {
            for x in 2..width - 2 {
                let current = get_rgb(original.pixel(x, y), layout);
                let left1 = get_rgb(original.pixel(x - 1, y), layout);
                let left2 = get_rgb(original.pixel(x - 2, y), layout);
                let right1 = get_rgb(original.pixel(x + 1, y), layout);
                let right2 = get_rgb(original.pixel(x + 2, y), layout);

                let red_bleed = (right1[0] as f32 * 0.7 + right2[0] as f32 * 0.3) * blend;
                let blue_bleed = (left1[2] as f32 * 0.7 + left2[2] as f32 * 0.3) * blend;
                let green_shift = (left1[1] as f32 + right1[1] as f32) * 0.5 * (blend * 0.3);

                put_rgb(
                    frame.pixel_mut(x, y),
                    layout,
                    [
                        clamp_u8(current[0] as f32 * (1.0 - blend) + red_bleed),
                        clamp_u8(current[1] as f32 * (1.0 - blend * 0.3) + green_shift),
                        clamp_u8(current[2] as f32 * (1.0 - blend) + blue_bleed),
                    ],
                );
            }
        }
    }

    /// Horizontal chromatic aberration; green also drifts vertically when strong
    fn apply_chroma_shift(&self, frame: &mut FrameBuffer, intensity: f32) {
        let shift = (intensity * 4.0) as i64;
        if shift == 0 {
            return;
        }
        let (width, height) = (frame.width() as i64, frame.height() as i64);
        let layout = frame.layout();
        let original = frame.clone();

        for y in 0..height {
            for x in 0..width {
                let red_x = (x + shift).clamp(0, width - 1) as u32;
                let blue_x = (x - shift).clamp(0, width - 1) as u32;
                let green_y = if intensity > 0.7 {
                    (y + shift / 2).clamp(0, height - 1) as u32
                } else {
                    y as u32
                };

                let rgb = [
                    get_rgb(original.pixel(red_x, y as u32), layout)[0],
                    get_rgb(original.pixel(x as u32, green_y), layout)[1],
                    get_rgb(original.pixel(blue_x, y as u32), layout)[2],
                ];
                put_rgb(frame.pixel_mut(x as u32, y as u32), layout, rgb);
            }
        }
    }

    /// Randomly displaced scan lines and the occasional stretched line
    fn apply_tracking_error(&self, frame: &mut FrameBuffer, intensity: f32, rng: &mut SmallRng) {
        let height = frame.height();
        let error_probability = intensity * 0.15;

        for y in 0..height {
            if rng.gen::<f32>() < error_probability {
                let displacement = if rng.gen::<f32>() < 0.7 {
                    rng.gen_range(-2..=2)
                } else {
                    rng.gen_range(-8..=8)
                };
                self.displace_scanline(frame, y, displacement, rng);

                if rng.gen::<f32>() < 0.3 && y + 1 < height {
                    self.displace_scanline(frame, y + 1, displacement / 2, rng);
                }
            }
        }

        if intensity > 0.5 && height > 0 && rng.gen::<f32>() < 0.1 {
            let line = rng.gen_range(0..height);
            self.apply_tape_stretch(frame, line, intensity);
        }
    }

    fn displace_scanline(&self, frame: &mut FrameBuffer, y: u32, displacement: i32, rng: &mut SmallRng) {
        if displacement == 0 {
            return;
        }
        let width = frame.width() as i32;
        let layout = frame.layout();
        let line: Vec<[u8; 3]> = (0..width).map(|x| get_rgb(frame.pixel(x as u32, y), layout)).collect();

        for x in 0..width {
            let source_x = x - displacement;
            let rgb = if (0..width).contains(&source_x) {
                line[source_x as usize]
            } else {
                // Uncovered area shows snow
                let snow = rng.gen_range(0..=64);
                [snow; 3]
            };
            put_rgb(frame.pixel_mut(x as u32, y), layout, rgb);
        }
    }

    fn apply_tape_stretch(&self, frame: &mut FrameBuffer, y: u32, intensity: f32) {
        let width = frame.width();
        let layout = frame.layout();
        let stretch = 1.0 + intensity * 0.3;
        let line: Vec<[u8; 3]> = (0..width).map(|x| get_rgb(frame.pixel(x, y), layout)).collect();

        for x in 0..width {
            let source_x = ((x as f32 / stretch) as u32).min(width - 1);
            put_rgb(frame.pixel_mut(x, y), layout, line[source_x as usize]);
        }
    }

    /// Grain, snow and dropout specks, plus an occasional noise band
    fn apply_noise(&self, frame: &mut FrameBuffer, intensity: f32, rng: &mut SmallRng) {
        let (width, height) = (frame.width(), frame.height());
        let layout = frame.layout();
        let probability = intensity * 0.08;

        for y in 0..height {
            for x in 0..width {
                if rng.gen::<f32>() >= probability {
                    continue;
                }
                let pixel = frame.pixel_mut(x, y);
                let kind = rng.gen::<f32>();
                let rgb = if kind < 0.6 {
                    let grain = rng.gen_range(-30..=30) as f32;
                    get_rgb(pixel, layout).map(|c| clamp_u8(c as f32 + grain))
                } else if kind < 0.8 {
                    [rng.gen_range(200..=255); 3]
                } else {
                    [rng.gen_range(0..=40); 3]
                };
                put_rgb(pixel, layout, rgb);
            }
        }

        if intensity > 0.6 && height > 0 && rng.gen::<f32>() < 0.2 {
            let start = rng.gen_range(0..height);
            let band = rng.gen_range(2..=8);
            self.apply_noise_band(frame, start, band, intensity, rng);
        }
    }

    fn apply_noise_band(&self, frame: &mut FrameBuffer, start: u32, band: u32, intensity: f32, rng: &mut SmallRng) {
        let (width, height) = (frame.width(), frame.height());
        let layout = frame.layout();

        for y in start..=(start + band).min(height - 1) {
            for x in 0..width {
                if rng.gen::<f32>() < intensity * 0.5 {
                    let pixel = frame.pixel_mut(x, y);
                    let noise = rng.gen_range(-50..=50) as f32;
                    let rgb = get_rgb(pixel, layout).map(|c| clamp_u8(c as f32 + noise));
                    put_rgb(pixel, layout, rgb);
                }
            }
        }
    }

    /// Boost saturation with a slight magenta cast, then warm the image
    fn apply_color_grade(&self, frame: &mut FrameBuffer, boost: f32, warmth: f32) {
        let layout = frame.layout();
        let channels = frame.channels();
        let saturation_factor = 1.0 + boost * 0.6;
        let warmth = warmth * 0.3;

        for pixel in frame.data_mut().chunks_exact_mut(channels) {
            let [r, g, b] = get_rgb(pixel, layout).map(|c| c as f32 / 255.0);
            let (max, min) = (r.max(g).max(b), r.min(g).min(b));

            let [mut r, mut g, mut b] = [r, g, b];
            if max - min > 0.0 {
                let avg = (r + g + b) / 3.0;
                r = avg + (r - avg) * saturation_factor;
                g = avg + (g - avg) * saturation_factor;
                b = avg + (b - avg) * saturation_factor;
                if boost > 0.5 {
                    r *= 1.05;
                    g *= 0.98;
                    b *= 1.02;
                }
            }

            let rgb = [
                clamp_u8(r.clamp(0.0, 1.0) * 255.0 * (1.0 + warmth * 0.2)),
                clamp_u8(g.clamp(0.0, 1.0) * 255.0 * (1.0 + warmth * 0.1)),
                clamp_u8(b.clamp(0.0, 1.0) * 255.0 * (1.0 - warmth * 0.15)),
            ];
            put_rgb(pixel, layout, rgb);
        }
    }
}

impl Default for VhsEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for VhsEffect {
    fn describe(&self) -> EffectDescriptor {
        let custom = || Condition::Equals(ParamValue::from(CUSTOM_MODE));
        let custom_param = |key: &str, default: f64, label: &str| {
            ParameterSpec::real(key, default, 0.0, 1.0)
                .with_step(0.05)
                .in_category("Custom")
                .with_label(label)
                .depends_on(MODE, custom())
        };

        EffectDescriptor::new("vhs", "VHS", "Retro", "1.0.0")
            .with_description("VHS tape aesthetic with scan lines, color bleeding, tracking errors and noise")
            .with_parameter(
                ParameterSpec::choice(MODE, "Classic", &["Subtle", "Classic", "Damaged", CUSTOM_MODE]).with_label("Mode"),
            )
            .with_parameter(
                ParameterSpec::real(INTENSITY, 0.8, 0.0, 1.0)
                    .with_step(0.05)
                    .with_label("Intensity"),
            )
            .with_parameter(custom_param(SCANLINE_INTENSITY, 0.9, "Scan lines"))
            .with_parameter(
                // Bleeding copies the whole frame; skipped at the lowest tier
                custom_param(COLOR_BLEEDING, 0.8, "Color bleeding").with_tier_override(QualityTier::Low, 0.0),
            )
            .with_parameter(custom_param(TRACKING_ERROR, 0.5, "Tracking error"))
            .with_parameter(custom_param(NOISE_LEVEL, 0.6, "Noise"))
            .with_parameter(custom_param(CHROMA_SHIFT, 0.7, "Chroma shift"))
            .with_parameter(custom_param(SATURATION_BOOST, 0.4, "Saturation boost"))
    }

    fn apply(
        &self,
        input: &FrameBuffer,
        params: &ResolvedParameterSet,
        output: &mut FrameBuffer,
    ) -> Result<(), ApplyError> {
        let intensity = params.get_f64_or(INTENSITY, 0.8) as f32;
        if intensity <= 0.0 {
            return Ok(());
        }
        let settings = VhsSettings::from_params(params);
        let mut rng = SmallRng::seed_from_u64(input.sequence());

        // Order matters: geometry-preserving color stages first, glitches last
        self.apply_scanlines(output, settings.scanlines * intensity);
        self.apply_color_bleeding(output, settings.bleeding * intensity);
        self.apply_chroma_shift(output, settings.chroma * intensity);
        self.apply_tracking_error(output, settings.tracking * intensity, &mut rng);
        self.apply_noise(output, settings.noise * intensity, &mut rng);
        self.apply_color_grade(output, settings.saturation * intensity, intensity);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::RawParameters;
    use crate::video::PixelLayout;

    fn frame(sequence: u64) -> FrameBuffer {
        FrameBuffer::new_filled(32, 24, PixelLayout::Rgb8, [120, 90, 60]).with_sequence(sequence)
    }

    fn run(input: &FrameBuffer, params: &ResolvedParameterSet) -> FrameBuffer {
        let mut output = input.clone();
        VhsEffect::new().apply(input, params, &mut output).unwrap();
        output
    }

    #[test]
    fn test_vhs_is_deterministic_per_frame() {
        let params = VhsEffect::new().describe().defaults();
        let input = frame(7);

        assert_eq!(run(&input, &params), run(&input, &params));
        assert!(!run(&input, &params).same_pixels(&input));
    }

    #[test]
    fn test_zero_intensity_is_identity() {
        let mut params = VhsEffect::new().describe().defaults();
        params.insert(INTENSITY, 0.0);
        let input = frame(1);
        assert!(run(&input, &params).same_pixels(&input));
    }

    #[test]
    fn test_custom_parameters_only_active_in_custom_mode() {
        let descriptor = VhsEffect::new().describe();
        assert!(!descriptor.active_keys(&descriptor.defaults()).contains(NOISE_LEVEL));

        let mut raw = RawParameters::new();
        raw.insert(MODE.to_string(), ParamValue::from(CUSTOM_MODE));
        let active = descriptor.active_keys(&descriptor.resolve(&raw));
        assert!(active.contains(NOISE_LEVEL));
        assert!(active.contains(SCANLINE_INTENSITY));
    }

    #[test]
    fn test_low_tier_drops_color_bleeding() {
        let descriptor = VhsEffect::new().describe();
        let overrides = crate::performance::overrides_at(QualityTier::Low, &descriptor);
        assert_eq!(overrides.get(COLOR_BLEEDING), Some(&ParamValue::Float(0.0)));

        let mut raw = overrides;
        raw.insert(MODE.to_string(), ParamValue::from(CUSTOM_MODE));
        let settings = VhsSettings::from_params(&descriptor.resolve(&raw));
        assert_eq!(settings.bleeding, 0.0);
    }

    #[test]
    fn test_presets_differ() {
        assert_ne!(VhsSettings::preset("Subtle"), VhsSettings::preset("Damaged"));
        assert_eq!(VhsSettings::preset("Classic"), VhsSettings::preset("anything else"));
    }
}
