//! Value generators backing the exported symbols.

use handoff_core::{HandoffError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn with_capacity(len: usize) -> Result<Vec<i32>> {
    let mut values = Vec::new();
    values
        .try_reserve_exact(len)
        .map_err(|_| HandoffError::AllocationFailure {
            what: "values buffer",
            bytes: len.saturating_mul(std::mem::size_of::<i32>()),
        })?;
    Ok(values)
}

/// `len` values drawn uniformly from `[i32::MIN, i32::MAX)`.
pub(crate) fn random_values<R: Rng + ?Sized>(rng: &mut R, len: usize) -> Result<Vec<i32>> {
    let mut values = with_capacity(len)?;
    values.extend((0..len).map(|_| rng.random_range(i32::MIN..i32::MAX)));
    Ok(values)
}

/// Deterministic pseudo-random values for `seed`.
pub(crate) fn seeded_values(seed: u64, len: usize) -> Result<Vec<i32>> {
    random_values(&mut StdRng::seed_from_u64(seed), len)
}

/// `start, start + 1, …`, wrapping at `i32::MAX`.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub(crate) fn sequence(start: i32, len: usize) -> Result<Vec<i32>> {
    let mut values = with_capacity(len)?;
    // Truncating the index keeps the sum correct modulo 2^32.
    values.extend((0..len).map(|i| start.wrapping_add(i as i32)));
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_wraps() {
        assert_eq!(sequence(5, 3).unwrap(), vec![5, 6, 7]);
        assert_eq!(sequence(i32::MAX, 2).unwrap(), vec![i32::MAX, i32::MIN]);
        assert!(sequence(0, 0).unwrap().is_empty());
    }

    #[test]
    fn test_seeded_is_deterministic() {
        let a = seeded_values(42, 64).unwrap();
        let b = seeded_values(42, 64).unwrap();
        let c = seeded_values(43, 64).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.iter().all(|v| *v != i32::MAX));
    }

    #[test]
    fn test_random_len() {
        assert_eq!(random_values(&mut rand::rng(), 1000).unwrap().len(), 1000);
    }
}
