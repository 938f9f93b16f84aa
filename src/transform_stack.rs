//! Save/restore stack of model transforms.
//!
//! Each draw composes its model matrix from the value left on the stack by
//! the enclosing code. Operations post-multiply the current matrix, so
//! `translate(t).scale(s)` produces `T * S` (scale applied to vertices first).

use glam::{Mat4, Vec3};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransformStackError {
    #[error("restore called with no saved transform")]
    Underflow,
}

/// Current model matrix plus a stack of saved copies.
#[derive(Debug, Clone)]
pub struct TransformStack {
    current: Mat4,
    saved: Vec<Mat4>,
}

impl Default for TransformStack {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformStack {
    pub fn new() -> Self {
        Self {
            current: Mat4::IDENTITY,
            saved: Vec::new(),
        }
    }

    /// Back to the initial state: identity with nothing saved.
    pub fn reset(&mut self) -> &mut Self {
        self.current = Mat4::IDENTITY;
        self.saved.clear();
        self
    }

    /// Push a copy of the current matrix.
    pub fn save(&mut self) -> &mut Self {
        self.saved.push(self.current);
        self
    }

    /// Pop the most recent saved matrix back into current.
    pub fn restore(&mut self) -> Result<&mut Self, TransformStackError> {
        self.current = self.saved.pop().ok_or(TransformStackError::Underflow)?;
        Ok(self)
    }

    pub fn get(&self) -> Mat4 {
        self.current
    }

    pub fn set(&mut self, matrix: Mat4) -> &mut Self {
        self.current = matrix;
        self
    }

    pub fn translate(&mut self, offset: Vec3) -> &mut Self {
        self.current *= Mat4::from_translation(offset);
        self
    }

    pub fn rotate_x(&mut self, radians: f32) -> &mut Self {
        self.current *= Mat4::from_rotation_x(radians);
        self
    }

    pub fn rotate_y(&mut self, radians: f32) -> &mut Self {
        self.current *= Mat4::from_rotation_y(radians);
        self
    }

    pub fn rotate_z(&mut self, radians: f32) -> &mut Self {
        self.current *= Mat4::from_rotation_z(radians);
        self
    }

    /// Rotate about an arbitrary axis. The axis is normalised here; a zero axis is a no-op.
    pub fn rotate(&mut self, axis: Vec3, radians: f32) -> &mut Self {
        if let Some(axis) = axis.try_normalize() {
            self.current *= Mat4::from_axis_angle(axis, radians);
        }
        self
    }

    pub fn scale(&mut self, factors: Vec3) -> &mut Self {
        self.current *= Mat4::from_scale(factors);
        self
    }

    /// Number of saved entries.
    pub fn depth(&self) -> usize {
        self.saved.len()
    }

    /// Save now and restore when the returned guard drops.
    pub fn scope(&mut self) -> StackScope<'_> {
        self.save();
        StackScope { stack: self }
    }
}

/// RAII guard from [`TransformStack::scope`].
///
/// Derefs to the stack so transforms can be applied through it.
pub struct StackScope<'a> {
    stack: &'a mut TransformStack,
}

impl std::ops::Deref for StackScope<'_> {
    type Target = TransformStack;

    fn deref(&self) -> &Self::Target {
        &*self.stack
    }
}

impl std::ops::DerefMut for StackScope<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.stack
    }
}

impl Drop for StackScope<'_> {
    fn drop(&mut self) {
        // The guard owns exactly one save, so this cannot underflow unless
        // someone restored through the guard past its own entry.
        if self.stack.restore().is_err() {
            log::warn!("transform scope closed on an empty stack");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: Mat4, b: Mat4) -> bool {
        a.abs_diff_eq(b, 1e-5)
    }

    #[test]
    fn test_new_stack_is_identity() {
        let stack = TransformStack::new();
        assert_eq!(stack.get(), Mat4::IDENTITY);
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn test_save_restore_round_trip() {
        let mut stack = TransformStack::new();
        stack.translate(Vec3::new(1.0, 2.0, 3.0));
        let before = stack.get();

        stack.save();
        stack.rotate_y(0.7).scale(Vec3::splat(4.0));
        assert!(!approx_eq(stack.get(), before));

        stack.restore().unwrap();
        assert_eq!(stack.get(), before);
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn test_translate_then_scale_is_t_times_s() {
        let t = Vec3::new(0.0, -10.0, 5.0);
        let s = Vec3::new(2.0, 0.5, 2.0);

        let mut stack = TransformStack::new();
        stack.translate(t).scale(s);

        let expected = Mat4::from_translation(t) * Mat4::from_scale(s);
        assert!(approx_eq(stack.get(), expected));

        // Scale hits the vertex first, then the translation.
        let p = stack.get().transform_point3(Vec3::new(1.0, 1.0, 1.0));
        assert!((p - Vec3::new(2.0, -9.5, 7.0)).length() < 1e-5);
    }

    #[test]
    fn test_restore_on_empty_stack_fails() {
        let mut stack = TransformStack::new();
        assert_eq!(stack.restore().err(), Some(TransformStackError::Underflow));
        assert_eq!(stack.get(), Mat4::IDENTITY);
    }

    #[test]
    fn test_reset_clears_saved_entries() {
        let mut stack = TransformStack::new();
        stack.scale(Vec3::splat(3.0)).save().save();
        stack.reset();
        assert_eq!(stack.get(), Mat4::IDENTITY);
        assert_eq!(stack.depth(), 0);
        assert!(stack.restore().is_err());
    }

    #[test]
    fn test_saved_copy_is_not_aliased() {
        let mut stack = TransformStack::new();
        stack.save();
        stack.translate(Vec3::Y * 5.0);
        stack.restore().unwrap();
        assert_eq!(stack.get(), Mat4::IDENTITY);
    }

    #[test]
    fn test_scope_restores_on_drop() {
        let mut stack = TransformStack::new();
        stack.translate(Vec3::X);
        let outer = stack.get();
        {
            let mut scoped = stack.scope();
            scoped.rotate_z(1.0);
            assert_eq!(scoped.depth(), 1);
        }
        assert_eq!(stack.get(), outer);
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn test_rotate_about_zero_axis_is_noop() {
        let mut stack = TransformStack::new();
        stack.rotate(Vec3::ZERO, 1.0);
        assert_eq!(stack.get(), Mat4::IDENTITY);
    }

    #[test]
    fn test_rotate_matches_axis_angle() {
        let mut stack = TransformStack::new();
        stack.rotate(Vec3::new(1.0, 1.0, 0.0), 1.5);
        let expected = Mat4::from_axis_angle(Vec3::new(1.0, 1.0, 0.0).normalize(), 1.5);
        assert!(approx_eq(stack.get(), expected));
    }
}
