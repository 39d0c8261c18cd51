//! Random query sampling.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{RngExt, SeedableRng};
use rankprobe_store::{Key, KeyStore};
use tracing::{debug, warn};

/// Draw `count` keys uniformly (with replacement) from `store`, mix in up to
/// `absent` keys the store does not hold, and shuffle.
///
/// The same seed always yields the same sequence. An empty store yields
/// only absent keys.
pub fn sample_queries<K: Key>(store: &KeyStore<K>, count: usize, absent: usize, seed: u64) -> Vec<K> {
    let keys = store.keys();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut queries = Vec::with_capacity(count + absent);

    if !keys.is_empty() {
        queries.extend((0..count).map(|_| keys[rng.random_range(0..keys.len())]));
    }

    let mut missing = 0;
    let mut attempts = 0;
    let max_attempts = absent.saturating_mul(32).saturating_add(64);
    while missing < absent && attempts < max_attempts {
        attempts += 1;
        let candidate = if keys.is_empty() || attempts % 2 == 0 {
            K::from_u64(rng.random::<u64>()).or_else(|| K::from_u64(rng.random::<u64>() >> 32))
        } else {
            let near = keys[rng.random_range(0..keys.len())].to_u64();
            near.checked_add(1).and_then(K::from_u64)
        };

        if let Some(key) = candidate {
            if !store.rank(key).is_found() {
                queries.push(key);
                missing += 1;
            }
        }
    }
    if missing < absent {
        warn!("Only found {} of {} absent keys", missing, absent);
    }

    queries.shuffle(&mut rng);
    debug!("Sampled {} queries ({} absent)", queries.len(), missing);
    queries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_and_present() {
        let store = KeyStore::from_vec((0..1_000u64).map(|i| i * 3).collect()).unwrap();
        let a = sample_queries(&store, 500, 0, 7);
        let b = sample_queries(&store, 500, 0, 7);
        assert_eq!(a, b);
        assert_eq!(a.len(), 500);
        assert!(a.iter().all(|k| store.rank(*k).is_found()));
        assert_ne!(a, sample_queries(&store, 500, 0, 8));
    }

    #[test]
    fn test_absent_keys_mixed_in() {
        let store = KeyStore::from_vec((0..1_000u32).map(|i| i * 3).collect()).unwrap();
        let queries = sample_queries(&store, 100, 50, 1);
        assert_eq!(queries.len(), 150);
        let missing = queries.iter().filter(|k| !store.rank(**k).is_found()).count();
        assert_eq!(missing, 50);
    }

    #[test]
    fn test_empty_store() {
        let store = KeyStore::<u64>::from_vec(Vec::new()).unwrap();
        assert!(sample_queries(&store, 10, 0, 1).is_empty());
        assert_eq!(sample_queries(&store, 10, 5, 1).len(), 5);
    }
}
