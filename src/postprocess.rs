use crate::field::{FieldSet, Pixel};
use rayon::prelude::*;
use slime_common::{SimParams, MAX_SPECIES};

/// Blur + decay for one trail pixel.
#[inline(always)]
fn diffuse_and_decay(original: Pixel, blurred: Pixel, diffuse_weight: f32, decay: f32) -> Pixel {
    std::array::from_fn(|c| {
        let diffused = original[c] + (blurred[c] - original[c]) * diffuse_weight;
        (diffused - decay).max(0.0)
    })
}

/// Trail channels weighted by the active species' colors. Alpha is always 1.
#[inline(always)]
pub fn composite(trail: &Pixel, params: &SimParams) -> Pixel {
    let mut rgba = [0.0, 0.0, 0.0, 1.0];
    let active = (params.species_count as usize).min(MAX_SPECIES);
    for (s, species) in params.species[..active].iter().enumerate() {
        for c in 0..3 {
            rgba[c] += trail[s] * species.color[c];
        }
    }
    rgba
}

/// Runs the per-pixel stage: diffuse and decay the trail, then composite the colored field.
///
/// Every pixel reads the trail as it was before this stage and writes into the
/// scratch buffer, which then becomes the trail. Rows are processed in parallel.
pub fn run_postprocess_stage(fields: &mut FieldSet, params: &SimParams) {
    let dt = params.delta_time;
    let diffuse_weight = (params.diffuse_rate * dt).clamp(0.0, 1.0);
    let decay = params.decay_rate * dt;

    {
        let (trail, scratch, colored) = fields.trail_pass();
        let width = trail.width() as usize;

        scratch
            .pixels_mut()
            .par_chunks_mut(width)
            .zip(colored.pixels_mut().par_chunks_mut(width))
            .enumerate()
            .for_each(|(y, (trail_row, colored_row))| {
                for x in 0..width {
                    let original = trail.pixels()[y * width + x];
                    let blurred = trail.mean_3x3_clamped(x as u32, y as u32);
                    let decayed = diffuse_and_decay(original, blurred, diffuse_weight, decay);
                    trail_row[x] = decayed;
                    colored_row[x] = composite(&decayed, params);
                }
            });
    }

    fields.swap_trail();
}
