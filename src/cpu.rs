//! Host-side fills: one sequential loop and one rayon parallel-for.

use rayon::prelude::*;

use crate::error::{FillError, Result};

/// Reserves room for `len` elements without aborting on OOM.
pub fn reserve_host(len: usize) -> Result<Vec<i64>> {
    let mut output = Vec::new();
    output
        .try_reserve_exact(len)
        .map_err(|_| FillError::HostAllocation { len })?;
    Ok(output)
}

/// Allocates a zeroed host buffer of `len` elements.
pub fn alloc_host(len: usize) -> Result<Vec<i64>> {
    let mut output = reserve_host(len)?;
    output.resize(len, 0);
    Ok(output)
}

/// Fills a fresh buffer on the calling thread, index 0 through `len - 1`.
pub fn fill_sequential(len: usize, value: i64) -> Result<Vec<i64>> {
    let mut output = alloc_host(len)?;
    for slot in output.iter_mut() {
        *slot = value;
    }
    Ok(output)
}

/// Fills a fresh buffer across the rayon pool.
///
/// Returns once every partition has joined.
pub fn fill_parallel(len: usize, value: i64) -> Result<Vec<i64>> {
    let mut output = alloc_host(len)?;
    output.par_iter_mut().for_each(|slot| *slot = value);
    Ok(output)
}
