//! Per-frame render target and drawable providers.
//!
//! The backend does not own a window surface. The first default pass of a
//! frame asks the provider for a render target, and commit asks it for the
//! drawable to present. Either may be unavailable (a minimized window, a
//! surface being resized), in which case the pass is skipped or the frame is
//! submitted without presenting.

use crate::backend::Driver;

/// Source of default-pass targets and presentable drawables.
pub trait SurfaceProvider<D: Driver> {
    /// Target of the default pass of the current frame.
    fn render_target(&mut self) -> Option<D::Target>;

    /// Drawable presented when the current frame is committed.
    fn drawable(&mut self) -> Option<D::Drawable>;
}

/// A [`SurfaceProvider`] built from two closures.
///
/// # Example
///
/// ```
/// use redlilium_gpu::{DummyDrawable, DummyDriver, DummyTarget, SurfaceCallbacks, SurfaceProvider};
///
/// let mut surface = SurfaceCallbacks::new(|| Some(DummyTarget), || Some(DummyDrawable));
/// let target = SurfaceProvider::<DummyDriver>::render_target(&mut surface);
/// assert_eq!(target, Some(DummyTarget));
/// ```
pub struct SurfaceCallbacks<T, P> {
    target: T,
    drawable: P,
}

impl<T, P> SurfaceCallbacks<T, P> {
    pub fn new(target: T, drawable: P) -> Self {
        Self { target, drawable }
    }
}

impl<D, T, P> SurfaceProvider<D> for SurfaceCallbacks<T, P>
where
    D: Driver,
    T: FnMut() -> Option<D::Target>,
    P: FnMut() -> Option<D::Drawable>,
{
    fn render_target(&mut self) -> Option<D::Target> {
        (self.target)()
    }

    fn drawable(&mut self) -> Option<D::Drawable> {
        (self.drawable)()
    }
}

impl<T, P> std::fmt::Debug for SurfaceCallbacks<T, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceCallbacks").finish_non_exhaustive()
    }
}
