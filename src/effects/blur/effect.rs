use crate::{
    effects::{pixel::box_blur, Effect, EffectDescriptor},
    error::ApplyError,
    params::{Condition, ParamValue, ParameterSpec, ResolvedParameterSet},
    performance::QualityTier,
    video::FrameBuffer,
};

use super::{GAUSSIAN_PASSES, KIND, PASSES, RADIUS};

/// Box or approximate Gaussian blur
///
/// Gaussian mode stacks three box passes; box mode uses the `passes`
/// parameter directly.
pub struct BlurEffect;

impl BlurEffect {
    pub fn new() -> Self {
        Self
    }
}

impl Default for BlurEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for BlurEffect {
    fn describe(&self) -> EffectDescriptor {
        EffectDescriptor::new("blur", "Blur", "Filters", "1.0.0")
            .with_description("Soften the image with a box or Gaussian kernel")
            .with_parameter(ParameterSpec::choice(KIND, "Gaussian", &["Gaussian", "Box"]).with_label("Kernel"))
            .with_parameter(
                ParameterSpec::integer(RADIUS, 5, 1, 15)
                    .with_label("Radius")
                    .with_description("Kernel radius in pixels")
                    .with_tier_override(QualityTier::Low, 2)
                    .with_tier_override(QualityTier::Balanced, 3),
            )
            .with_parameter(
                ParameterSpec::integer(PASSES, 2, 1, 4)
                    .with_label("Passes")
                    .depends_on(KIND, Condition::Equals(ParamValue::from("Box")))
                    .with_tier_override(QualityTier::Low, 1),
            )
    }

    fn apply(
        &self,
        input: &FrameBuffer,
        params: &ResolvedParameterSet,
        output: &mut FrameBuffer,
    ) -> Result<(), ApplyError> {
        let radius = params.get_i64_or(RADIUS, 5).max(0) as usize;
        let passes = match params.get_str_or(KIND, "Gaussian") {
            "Box" => params.get_i64_or(PASSES, 2),
            _ => GAUSSIAN_PASSES,
        };

        let (width, height, channels) = (input.width() as usize, input.height() as usize, input.channels());
        for _ in 0..passes.max(1) {
            box_blur(output.data_mut(), width, height, channels, radius);
        }

        Ok(())
    }
}
