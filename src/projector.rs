// projector.rs — equirectangular panorama → perspective viewport (CPU, nearest neighbour)
//
// For every output pixel an inverse-camera ray is built, rotated into the
// panorama frame, turned into longitude/latitude and looked up in the source.
// x grows to the right, y grows downwards (image rows), z points forward.

use crate::buffer::{OutputBuffer, SourceImage, BYTES_PER_PIXEL};
use crate::error::Result;
use crate::panorama::{Algorithm, ViewportParameters};

use glam::{DMat3, DVec3};
use rayon::{
    iter::{IndexedParallelIterator, ParallelIterator},
    slice::ParallelSliceMut,
};
use std::f64::consts::PI;

/// `R = R_roll · R_pitch · R_yaw`, each an axis-angle rotation.
/// Yaw turns about the up axis, pitch about the yawed right axis and roll
/// about the viewing axis left after yaw and pitch.
pub fn rotation_matrix(params: &ViewportParameters) -> DMat3 {
    let r_yaw = DMat3::from_axis_angle(DVec3::Y, params.yaw.to_radians());
    let r_pitch = DMat3::from_axis_angle(r_yaw * DVec3::X, params.pitch.to_radians());
    let roll_axis = r_yaw * (r_pitch * DVec3::NEG_Z);
    let r_roll = DMat3::from_axis_angle(roll_axis, params.roll.to_radians());
    r_roll * r_pitch * r_yaw
}

/// Everything needed to map an output pixel to a source pixel for one frame.
#[derive(Debug, Clone, Copy)]
pub struct Projection {
    rotation: DMat3,
    focal: f64,
    cx: f64,
    cy: f64,
    src_width: u32,
    src_height: u32,
}

impl Projection {
    /// `params` is expected to be clamped already.
    pub fn new(
        params: &ViewportParameters,
        out_width: u32,
        out_height: u32,
        src_width: u32,
        src_height: u32,
    ) -> Self {
        let focal = 0.5 * out_width as f64 / (0.5 * params.fov.to_radians()).tan();
        Self {
            rotation: rotation_matrix(params),
            focal,
            cx: (out_width as f64 - 1.0) / 2.0,
            cy: (out_height as f64 - 1.0) / 2.0,
            src_width,
            src_height,
        }
    }

    /// Unit direction in panorama space seen through output pixel (row, col).
    #[inline]
    pub fn direction(&self, row: u32, col: u32) -> DVec3 {
        let ray = DVec3::new(
            (col as f64 - self.cx) / self.focal,
            (row as f64 - self.cy) / self.focal,
            1.0,
        );
        (self.rotation * ray).normalize()
    }

    /// Source pixel sampled for output pixel (row, col).
    ///
    /// Longitude is periodic, so the column wraps around the seam; latitude is
    /// clamped to the first/last row at the poles.
    #[inline]
    pub fn source_coords(&self, row: u32, col: u32) -> (u32, u32) {
        let d = self.direction(row, col);
        let longitude = d.x.atan2(d.z);
        let latitude = d.y.clamp(-1.0, 1.0).asin();

        let w = self.src_width as i64;
        let h = self.src_height as i64;
        let sx = ((longitude / (2.0 * PI) + 0.5) * self.src_width as f64).round() as i64;
        let sy = ((latitude / PI + 0.5) * self.src_height as f64).round() as i64;

        (sx.rem_euclid(w) as u32, sy.clamp(0, h - 1) as u32)
    }

    fn project_row(&self, source: &SourceImage, row: u32, dst: &mut [u8]) {
        for (col, px) in dst.chunks_exact_mut(BYTES_PER_PIXEL).enumerate() {
            let (sx, sy) = self.source_coords(row, col as u32);
            px.copy_from_slice(&source.pixel(sx, sy));
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Projector {
    algorithm: Algorithm,
}

impl Projector {
    pub fn new(algorithm: Algorithm) -> Self {
        Self { algorithm }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn set_algorithm(&mut self, algorithm: Algorithm) {
        self.algorithm = algorithm;
    }

    pub fn render(
        &self,
        source: &SourceImage,
        params: &ViewportParameters,
        out_width: u32,
        out_height: u32,
    ) -> Result<OutputBuffer> {
        let mut out = OutputBuffer::new(out_width, out_height)?;
        self.render_into(source, params, &mut out);
        Ok(out)
    }

    /// Overwrites every pixel of `out`.
    pub fn render_into(&self, source: &SourceImage, params: &ViewportParameters, out: &mut OutputBuffer) {
        let params = params.clamped();
        let projection = Projection::new(
            &params,
            out.width(),
            out.height(),
            source.width(),
            source.height(),
        );
        let stride = out.row_stride();

        match self.algorithm {
            Algorithm::Serial => {
                for (row, dst) in out.as_bytes_mut().chunks_exact_mut(stride).enumerate() {
                    projection.project_row(source, row as u32, dst);
                }
            }
            Algorithm::Parallel => {
                // rows are independent: read-only source, disjoint output slices
                out.as_bytes_mut()
                    .par_chunks_mut(stride)
                    .enumerate()
                    .for_each(|(row, dst)| projection.project_row(source, row as u32, dst));
            }
        }
    }
}

/// One-shot render with the default execution strategy.
pub fn render(
    source: &SourceImage,
    params: &ViewportParameters,
    out_width: u32,
    out_height: u32,
) -> Result<OutputBuffer> {
    Projector::default().render(source, params, out_width, out_height)
}
