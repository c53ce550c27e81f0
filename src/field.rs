use anyhow::Result;
use slime_common::{Vec2, MAX_SPECIES};

/// One field pixel: four float channels.
pub type Pixel = [f32; MAX_SPECIES];

/// A 2D image of 4-channel float pixels, row-major.
///
/// Dropping a field releases its storage; fields are never resized in place.
#[derive(Debug, Clone)]
pub struct Field {
    width: u32,
    height: u32,
    pixels: Vec<Pixel>,
}

impl Field {
    /// Allocates a zeroed `width x height` field.
    ///
    /// Fails instead of aborting when the allocation cannot be satisfied or the
    /// pixel count exceeds `max_pixels`.
    pub fn try_new(width: u32, height: u32, max_pixels: u64) -> Result<Self> {
        if width == 0 || height == 0 {
            anyhow::bail!("Cannot allocate a {}x{} field.", width, height);
        }
        let len = width as u64 * height as u64;
        if len > max_pixels {
            anyhow::bail!(
                "Field of {}x{} ({} px) exceeds the {} px budget.",
                width,
                height,
                len,
                max_pixels
            );
        }
        let len = usize::try_from(len)?;
        let mut pixels = Vec::new();
        pixels
            .try_reserve_exact(len)
            .map_err(|e| anyhow::anyhow!("Failed to allocate {}x{} field: {}", width, height, e))?;
        pixels.resize(len, [0.0; MAX_SPECIES]);
        Ok(Self { width, height, pixels })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[Pixel] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [Pixel] {
        &mut self.pixels
    }

    /// Sets every channel of every pixel to zero.
    pub fn clear(&mut self) {
        self.pixels.fill([0.0; MAX_SPECIES]);
    }

    #[inline(always)]
    pub fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    pub fn get(&self, x: u32, y: u32) -> Option<Pixel> {
        if x < self.width && y < self.height {
            Some(self.pixels[self.index(x, y)])
        } else {
            None
        }
    }

    /// Cell containing `pos`, clamped into the field. Positions on the far
    /// edge (`x == width`) map to the last column.
    #[inline(always)]
    pub fn cell_of(&self, pos: Vec2) -> (u32, u32) {
        let x = (pos.x.max(0.0).floor() as u32).min(self.width - 1);
        let y = (pos.y.max(0.0).floor() as u32).min(self.height - 1);
        (x, y)
    }

    /// Sum of the 3x3 block centered on `(cx, cy)`. Cells outside the field contribute nothing.
    pub fn sum_3x3(&self, cx: i64, cy: i64) -> Pixel {
        // Any center further out than this has a block entirely outside the field.
        let cx = cx.clamp(-2, self.width as i64 + 1);
        let cy = cy.clamp(-2, self.height as i64 + 1);
        let mut sum = [0.0; MAX_SPECIES];
        for dy in -1..=1 {
            for dx in -1..=1 {
                let x = cx + dx;
                let y = cy + dy;
                if x >= 0 && x < self.width as i64 && y >= 0 && y < self.height as i64 {
                    let p = &self.pixels[self.index(x as u32, y as u32)];
                    for c in 0..MAX_SPECIES {
                        sum[c] += p[c];
                    }
                }
            }
        }
        sum
    }

    /// Mean of the 3x3 block centered on `(x, y)`, with coordinates clamped at the
    /// field edges (edge pixels are repeated, nothing wraps around).
    pub fn mean_3x3_clamped(&self, x: u32, y: u32) -> Pixel {
        let max_x = self.width as i64 - 1;
        let max_y = self.height as i64 - 1;
        let mut sum = [0.0; MAX_SPECIES];
        for dy in -1..=1i64 {
            for dx in -1..=1i64 {
                let sx = (x as i64 + dx).clamp(0, max_x) as u32;
                let sy = (y as i64 + dy).clamp(0, max_y) as u32;
                let p = &self.pixels[self.index(sx, sy)];
                for c in 0..MAX_SPECIES {
                    sum[c] += p[c];
                }
            }
        }
        sum.map(|v| v / 9.0)
    }

    /// Sum of every channel over the whole field.
    pub fn channel_totals(&self) -> Pixel {
        self.pixels.iter().fold([0.0; MAX_SPECIES], |mut acc, p| {
            for c in 0..MAX_SPECIES {
                acc[c] += p[c];
            }
            acc
        })
    }

    /// Quantizes the field to RGBA8 (channels clamped to `[0, 1]`).
    pub fn to_rgba8(&self) -> Vec<u8> {
        self.pixels
            .iter()
            .flat_map(|p| p.map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8))
            .collect()
    }
}

/// The fields owned by the engine: the trail field, its post-process scratch
/// buffer, and the colored output.
#[derive(Debug)]
pub struct FieldSet {
    pub trail: Field,
    trail_scratch: Field,
    pub colored: Field,
}

impl FieldSet {
    /// Allocates all fields at `width x height`. Either every field is created or none is.
    pub fn try_new(width: u32, height: u32, max_pixels: u64) -> Result<Self> {
        Ok(Self {
            trail: Field::try_new(width, height, max_pixels)?,
            trail_scratch: Field::try_new(width, height, max_pixels)?,
            colored: Field::try_new(width, height, max_pixels)?,
        })
    }

    pub fn width(&self) -> u32 {
        self.trail.width()
    }

    pub fn height(&self) -> u32 {
        self.trail.height()
    }

    pub fn clear_trail(&mut self) {
        self.trail.clear();
        self.trail_scratch.clear();
    }

    /// Current trail (read) and scratch (write) buffers for a post-process pass.
    pub fn trail_pass(&mut self) -> (&Field, &mut Field, &mut Field) {
        (&self.trail, &mut self.trail_scratch, &mut self.colored)
    }

    /// Makes the scratch buffer written by the last pass the current trail.
    pub fn swap_trail(&mut self) {
        std::mem::swap(&mut self.trail, &mut self.trail_scratch);
    }
}
