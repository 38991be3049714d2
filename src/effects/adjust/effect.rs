use rayon::prelude::*;

use crate::{
    effects::{
        pixel::{clamp_u8, get_rgb, put_rgb},
        Effect, EffectDescriptor,
    },
    error::ApplyError,
    params::{ParameterSpec, ResolvedParameterSet},
    video::{luma, FrameBuffer},
};

use super::{BRIGHTNESS, CONTRAST, SATURATION};

/// Brightness, contrast and saturation adjustment
pub struct BrightnessContrastEffect;

impl BrightnessContrastEffect {
    pub fn new() -> Self {
        Self
    }

    fn adjust(rgb: [u8; 3], brightness: f32, contrast: f32, saturation: f32) -> [u8; 3] {
        let gray = luma(rgb[0], rgb[1], rgb[2]) as f32;
        rgb.map(|c| {
            // Saturation around the pixel's luma, then contrast around mid-gray
            let saturated = gray + (c as f32 - gray) * saturation;
            clamp_u8((saturated - 128.0) * contrast + 128.0 + brightness)
        })
    }
}

impl Default for BrightnessContrastEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for BrightnessContrastEffect {
    fn describe(&self) -> EffectDescriptor {
        EffectDescriptor::new("brightness_contrast", "Brightness / Contrast", "Adjustments", "1.0.0")
            .with_description("Adjust brightness, contrast and color saturation")
            .with_parameter(
                ParameterSpec::real(BRIGHTNESS, 0.0, -100.0, 100.0)
                    .with_step(1.0)
                    .with_label("Brightness"),
            )
            .with_parameter(
                ParameterSpec::real(CONTRAST, 1.0, 0.0, 3.0)
                    .with_step(0.05)
                    .with_label("Contrast"),
            )
            .with_parameter(
                ParameterSpec::real(SATURATION, 1.0, 0.0, 2.0)
                    .with_step(0.05)
                    .with_label("Saturation")
                    .in_category("Color"),
            )
    }

    fn apply(
        &self,
        _input: &FrameBuffer,
        params: &ResolvedParameterSet,
        output: &mut FrameBuffer,
    ) -> Result<(), ApplyError> {
        let brightness = params.get_f64_or(BRIGHTNESS, 0.0) as f32;
        let contrast = params.get_f64_or(CONTRAST, 1.0) as f32;
        let saturation = params.get_f64_or(SATURATION, 1.0) as f32;

        if brightness == 0.0 && contrast == 1.0 && saturation == 1.0 {
            return Ok(());
        }

        let layout = output.layout();
        let channels = output.channels();
        output.data_mut().par_chunks_mut(channels).for_each(|pixel| {
            let adjusted = Self::adjust(get_rgb(pixel, layout), brightness, contrast, saturation);
            put_rgb(pixel, layout, adjusted);
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::PixelLayout;

    fn run(params: &ResolvedParameterSet, frame: &FrameBuffer) -> FrameBuffer {
        let mut output = frame.clone();
        BrightnessContrastEffect::new().apply(frame, params, &mut output).unwrap();
        output
    }

    #[test]
    fn test_defaults_are_identity() {
        let effect = BrightnessContrastEffect::new();
        let frame = FrameBuffer::new_filled(8, 8, PixelLayout::Rgb8, [10, 120, 240]);
        let output = run(&effect.describe().defaults(), &frame);
        assert!(output.same_pixels(&frame));
    }

    #[test]
    fn test_brightness_raises_every_channel() {
        let frame = FrameBuffer::new_filled(4, 4, PixelLayout::Rgb8, [100, 100, 100]);
        let mut params = ResolvedParameterSet::new();
        params.insert(BRIGHTNESS, 20.0);
        params.insert(CONTRAST, 1.0);
        params.insert(SATURATION, 1.0);

        let output = run(&params, &frame);
        assert_eq!(output.pixel(0, 0), &[120, 120, 120]);
    }

    #[test]
    fn test_alpha_untouched() {
        let frame = FrameBuffer::new_filled(2, 2, PixelLayout::Rgba8, [50, 50, 50]);
        let mut params = ResolvedParameterSet::new();
        params.insert(BRIGHTNESS, -100.0);

        let output = run(&params, &frame);
        assert_eq!(output.pixel(1, 1)[3], frame.pixel(1, 1)[3]);
        assert_eq!(output.pixel(1, 1)[0], 0);
    }
}
