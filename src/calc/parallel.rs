use rayon::prelude::*;

/// Number of chunks handed to each worker thread.
const CHUNKS_PER_THREAD: usize = 4;

/// Chunk size giving every worker thread a few chunks of `len` items.
fn chunk_size(len: usize) -> usize {
    let threads = rayon::current_num_threads().max(1);
    len.div_ceil(threads * CHUNKS_PER_THREAD).max(1)
}

/// Maps `task` over chunks of `items` on the rayon pool and folds the
/// partial results, in chunk order, into `init` with `combine`.
///
/// # Errors
///
/// Returns the first error reported by a chunk, in which case no result is
/// combined.
pub fn apply_reduce<T, R, E, F, C>(items: &[T], task: F, combine: C, init: R) -> Result<R, E>
where
    T: Sync,
    R: Send,
    E: Send,
    F: Fn(&[T]) -> Result<R, E> + Send + Sync,
    C: FnMut(R, R) -> R,
{
    if items.is_empty() {
        return Ok(init);
    }
    let size = chunk_size(items.len());
    tracing::trace!("Applying task to {} item(s) in chunks of {size}", items.len());
    let partials: Vec<R> = items.par_chunks(size).map(task).collect::<Result<_, _>>()?;
    Ok(partials.into_iter().fold(init, combine))
}
