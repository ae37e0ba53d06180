//! The matrix stack: model-view, projection, and the transform accumulator.
//!
//! Matrices follow glam's column-vector convention. Elementary transforms
//! (`translate`, `rotate`, `scale`) are applied in the local space of the
//! current matrix, so `translate` then `rotate` rotates about the translated
//! origin. [`MatrixStack::mult`] applies the supplied matrix *after* the
//! current one, which is what projections need.
//!
//! # Transform accumulator
//!
//! Pushing while in [`MatrixMode::ModelView`] does not touch the model-view
//! matrix. Instead the stack switches to a separate accumulator matrix that is
//! baked into vertex positions at submission time. Vertices already queued in
//! the batch keep the model-view they were submitted under, and the model-view
//! matrix itself is only consumed at flush time. Popping back to an empty
//! stack switches the current matrix back to the model-view.

use glam::{Mat4, Vec3, Vec4};

use crate::fixed::FixedVec;

/// Which matrix the transform operations target.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum MatrixMode {
    /// The model-view matrix (or the accumulator while a push is active).
    #[default]
    ModelView,
    /// The projection matrix.
    Projection,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Slot {
    ModelView,
    Projection,
    Transform,
}

/// Fixed-depth stack of 4x4 matrices with a switchable current matrix.
#[derive(Debug, Clone)]
pub struct MatrixStack {
    modelview: Mat4,
    projection: Mat4,
    transform: Mat4,
    stack: FixedVec<Mat4>,
    mode: MatrixMode,
    current: Slot,
    use_transform: bool,
}

impl MatrixStack {
    /// Create a stack holding at most `depth` saved matrices.
    pub fn new(depth: usize) -> Self {
        Self {
            modelview: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            transform: Mat4::IDENTITY,
            stack: FixedVec::with_capacity(depth),
            mode: MatrixMode::ModelView,
            current: Slot::ModelView,
            use_transform: false,
        }
    }

    /// Point the current matrix at the model-view or projection matrix.
    pub fn set_mode(&mut self, mode: MatrixMode) {
        self.mode = mode;
        self.current = match mode {
            MatrixMode::ModelView => Slot::ModelView,
            MatrixMode::Projection => Slot::Projection,
        };
    }

    /// The active matrix mode.
    pub fn mode(&self) -> MatrixMode {
        self.mode
    }

    /// Save the current matrix.
    ///
    /// In model-view mode this also activates the transform accumulator, so
    /// subsequent transforms only affect vertices submitted before the
    /// matching [`pop`](Self::pop). Logs and does nothing when the stack is
    /// full.
    pub fn push(&mut self) {
        if self.stack.is_full() {
            log::error!(
                "matrix stack overflow: push ignored at depth {}",
                self.stack.capacity()
            );
            return;
        }

        if self.mode == MatrixMode::ModelView {
            self.use_transform = true;
            self.current = Slot::Transform;
        }

        let saved = *self.current();
        // Cannot fail: fullness was checked above.
        let _ = self.stack.try_push(saved);
    }

    /// Restore the most recently pushed matrix.
    ///
    /// Once the stack is empty in model-view mode the accumulator is switched
    /// off and the current matrix points at the model-view again.
    pub fn pop(&mut self) {
        if self.stack.is_empty() {
            log::warn!("matrix stack underflow: pop with nothing pushed");
        }
        self.pop_inner();
    }

    /// Pop every saved matrix, leaving the model-view untouched.
    pub(crate) fn pop_all(&mut self) {
        while !self.stack.is_empty() {
            self.pop_inner();
        }
        self.pop_inner();
    }

    fn pop_inner(&mut self) {
        if let Some(saved) = self.stack.pop() {
            *self.current_mut() = saved;
        }
        if self.stack.is_empty() && self.mode == MatrixMode::ModelView {
            self.current = Slot::ModelView;
            self.use_transform = false;
        }
    }

    /// Reset the current matrix to identity.
    pub fn load_identity(&mut self) {
        *self.current_mut() = Mat4::IDENTITY;
    }

    /// Translate the current matrix.
    pub fn translate(&mut self, x: f32, y: f32, z: f32) {
        self.apply_local(Mat4::from_translation(Vec3::new(x, y, z)));
    }

    /// Rotate the current matrix by `angle_degrees` about `axis`.
    ///
    /// A zero-length axis leaves the matrix unchanged.
    pub fn rotate(&mut self, angle_degrees: f32, axis: Vec3) {
        let Some(axis) = axis.try_normalize() else {
            return;
        };
        self.apply_local(Mat4::from_axis_angle(axis, angle_degrees.to_radians()));
    }

    /// Scale the current matrix.
    pub fn scale(&mut self, x: f32, y: f32, z: f32) {
        self.apply_local(Mat4::from_scale(Vec3::new(x, y, z)));
    }

    /// Compose `matrix` after the current matrix.
    pub fn mult(&mut self, matrix: Mat4) {
        let current = self.current_mut();
        *current = matrix * *current;
    }

    /// Multiply by an OpenGL-style orthographic projection.
    pub fn ortho(&mut self, left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) {
        self.mult(Mat4::orthographic_rh_gl(left, right, bottom, top, near, far));
    }

    /// Multiply by an OpenGL-style perspective frustum.
    pub fn frustum(&mut self, left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) {
        self.mult(frustum_matrix(left, right, bottom, top, near, far));
    }

    /// Multiply by a symmetric perspective projection.
    pub fn perspective(&mut self, fovy_degrees: f32, aspect: f32, near: f32, far: f32) {
        self.mult(Mat4::perspective_rh_gl(
            fovy_degrees.to_radians(),
            aspect,
            near,
            far,
        ));
    }

    /// The matrix the transform operations currently modify.
    pub fn current(&self) -> &Mat4 {
        match self.current {
            Slot::ModelView => &self.modelview,
            Slot::Projection => &self.projection,
            Slot::Transform => &self.transform,
        }
    }

    fn current_mut(&mut self) -> &mut Mat4 {
        match self.current {
            Slot::ModelView => &mut self.modelview,
            Slot::Projection => &mut self.projection,
            Slot::Transform => &mut self.transform,
        }
    }

    /// The model-view matrix uploaded at flush time.
    pub fn modelview(&self) -> Mat4 {
        self.modelview
    }

    /// The projection matrix uploaded at flush time.
    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    /// `projection * modelview`, as consumed by the vertex shader.
    pub fn mvp(&self) -> Mat4 {
        self.projection * self.modelview
    }

    /// Number of saved matrices.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Whether vertex positions are currently run through the accumulator.
    pub fn transform_active(&self) -> bool {
        self.use_transform
    }

    /// Apply the accumulator to a submitted position, if it is active.
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        if self.use_transform {
            self.transform.transform_point3(point)
        } else {
            point
        }
    }

    fn apply_local(&mut self, matrix: Mat4) {
        let current = self.current_mut();
        *current *= matrix;
    }
}

fn frustum_matrix(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
    let width = right - left;
    let height = top - bottom;
    let depth = far - near;

    Mat4::from_cols(
        Vec4::new(2.0 * near / width, 0.0, 0.0, 0.0),
        Vec4::new(0.0, 2.0 * near / height, 0.0, 0.0),
        Vec4::new(
            (right + left) / width,
            (top + bottom) / height,
            -(far + near) / depth,
            -1.0,
        ),
        Vec4::new(0.0, 0.0, -2.0 * far * near / depth, 0.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_matrix() -> Mat4 {
        Mat4::from_scale_rotation_translation(
            Vec3::new(2.0, 3.0, 1.0),
            glam::Quat::from_rotation_z(0.3),
            Vec3::new(10.0, -4.0, 0.5),
        )
    }

    #[test]
    fn push_translate_pop_restores_modelview_exactly() {
        let mut stack = MatrixStack::new(4);
        let m = sample_matrix();
        stack.mult(m);
        let before = *stack.current();

        stack.push();
        stack.translate(5.0, 6.0, 7.0);
        stack.pop();

        assert_eq!(stack.current().to_cols_array(), before.to_cols_array());
        assert!(!stack.transform_active());
    }

    #[test]
    fn push_translate_pop_restores_projection_exactly() {
        let mut stack = MatrixStack::new(4);
        stack.set_mode(MatrixMode::Projection);
        stack.ortho(0.0, 800.0, 600.0, 0.0, -1.0, 1.0);
        let before = *stack.current();

        stack.push();
        stack.translate(1.0, 2.0, 3.0);
        assert_ne!(*stack.current(), before);
        stack.pop();

        assert_eq!(stack.current().to_cols_array(), before.to_cols_array());
        assert!(!stack.transform_active());
    }

    #[test]
    fn push_in_modelview_activates_accumulator() {
        let mut stack = MatrixStack::new(4);
        stack.push();
        assert!(stack.transform_active());

        stack.translate(1.0, 0.0, 0.0);
        assert_eq!(stack.modelview(), Mat4::IDENTITY);
        assert_eq!(
            stack.transform_point(Vec3::ZERO),
            Vec3::new(1.0, 0.0, 0.0)
        );

        stack.pop();
        assert_eq!(stack.transform_point(Vec3::ZERO), Vec3::ZERO);
    }

    #[test]
    fn nested_push_keeps_accumulator_until_last_pop() {
        let mut stack = MatrixStack::new(4);
        stack.push();
        stack.translate(1.0, 0.0, 0.0);
        stack.push();
        stack.translate(0.0, 1.0, 0.0);
        assert_eq!(
            stack.transform_point(Vec3::ZERO),
            Vec3::new(1.0, 1.0, 0.0)
        );

        stack.pop();
        assert!(stack.transform_active());
        assert_eq!(
            stack.transform_point(Vec3::ZERO),
            Vec3::new(1.0, 0.0, 0.0)
        );

        stack.pop();
        assert!(!stack.transform_active());
    }

    #[test]
    fn overflow_is_a_no_op() {
        let mut stack = MatrixStack::new(2);
        stack.push();
        stack.push();
        stack.push();
        assert_eq!(stack.depth(), 2);
    }

    #[test]
    fn pop_on_empty_is_harmless() {
        let mut stack = MatrixStack::new(2);
        stack.translate(3.0, 0.0, 0.0);
        stack.pop();
        assert_eq!(stack.depth(), 0);
        assert_eq!(stack.modelview(), Mat4::from_translation(Vec3::X * 3.0));
    }

    #[test]
    fn pop_all_resets_to_modelview() {
        let mut stack = MatrixStack::new(8);
        for _ in 0..5 {
            stack.push();
            stack.rotate(15.0, Vec3::Z);
        }
        stack.pop_all();
        assert_eq!(stack.depth(), 0);
        assert!(!stack.transform_active());
        assert_eq!(*stack.current(), Mat4::IDENTITY);
    }

    #[test]
    fn translate_applies_in_local_space() {
        let mut stack = MatrixStack::new(1);
        stack.scale(2.0, 2.0, 1.0);
        stack.translate(1.0, 0.0, 0.0);
        let p = stack.current().transform_point3(Vec3::ZERO);
        assert_eq!(p, Vec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn mult_applies_after_current() {
        let mut stack = MatrixStack::new(1);
        stack.translate(1.0, 0.0, 0.0);
        stack.mult(Mat4::from_scale(Vec3::splat(2.0)));
        let p = stack.current().transform_point3(Vec3::ZERO);
        assert_eq!(p, Vec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn rotate_with_zero_axis_is_ignored() {
        let mut stack = MatrixStack::new(1);
        stack.rotate(90.0, Vec3::ZERO);
        assert_eq!(*stack.current(), Mat4::IDENTITY);
    }

    #[test]
    fn ortho_matches_glam() {
        let mut stack = MatrixStack::new(1);
        stack.set_mode(MatrixMode::Projection);
        stack.load_identity();
        stack.ortho(0.0, 800.0, 600.0, 0.0, 0.0, 1.0);
        assert_eq!(
            stack.projection(),
            Mat4::orthographic_rh_gl(0.0, 800.0, 600.0, 0.0, 0.0, 1.0)
        );
    }

    #[test]
    fn symmetric_frustum_matches_perspective() {
        let near = 0.1;
        let far = 100.0;
        let fovy = 60.0_f32;
        let aspect = 1.5;
        let top = near * (fovy.to_radians() / 2.0).tan();
        let right = top * aspect;

        let frustum = frustum_matrix(-right, right, -top, top, near, far);
        let perspective = Mat4::perspective_rh_gl(fovy.to_radians(), aspect, near, far);
        assert!(frustum.abs_diff_eq(perspective, 1e-5));
    }
}
