//! rayon when the `threading` feature is on, plain iterators otherwise.
//!
//! Only the handful of entry points the engine uses are shimmed:
//! `into_par_iter` and `par_chunks_mut`.
use crate::error::Result;

#[cfg(feature = "threading")]
pub use rayon::prelude::*;

#[cfg(not(feature = "threading"))]
mod sequential {
    pub trait IntoParallelIterator {
        type Iter;
        fn into_par_iter(self) -> Self::Iter;
    }

    impl<I: IntoIterator> IntoParallelIterator for I {
        type Iter = I::IntoIter;
        fn into_par_iter(self) -> Self::Iter {
            self.into_iter()
        }
    }

    pub trait ParallelSliceMut<T> {
        fn par_chunks_mut(&mut self, size: usize) -> std::slice::ChunksMut<'_, T>;
    }

    impl<T> ParallelSliceMut<T> for [T] {
        fn par_chunks_mut(&mut self, size: usize) -> std::slice::ChunksMut<'_, T> {
            self.chunks_mut(size)
        }
    }
}

#[cfg(not(feature = "threading"))]
pub use sequential::*;

/// Run `f` on a dedicated pool of `threads` workers, or on the global pool
/// when `threads` is `None`.
#[cfg(feature = "threading")]
pub fn with_pool<R, F>(threads: Option<usize>, f: F) -> Result<R>
where
    R: Send,
    F: FnOnce() -> R + Send,
{
    match threads {
        None => Ok(f()),
        Some(n) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .map_err(|e| crate::error::Error::ThreadPool(e.to_string()))?;
            Ok(pool.install(f))
        }
    }
}

#[cfg(not(feature = "threading"))]
pub fn with_pool<R, F>(threads: Option<usize>, f: F) -> Result<R>
where
    R: Send,
    F: FnOnce() -> R + Send,
{
    if threads.is_some_and(|n| n > 1) {
        tracing::warn!("built without threading; running on the calling thread");
    }
    Ok(f())
}
