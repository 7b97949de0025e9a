//! Placeholder work for exercising the pool.
//!
//! Resources are random ASCII strings. Processing hashes a string with
//! 32-bit FNV-1a after a simulated delay; post-processing increments the
//! value after a shorter one.

use std::thread;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::JobError;
use crate::job::JobResult;

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Generates a random string of `len` ASCII letters.
pub fn random_string<G: Rng + ?Sized>(rng: &mut G, len: usize) -> String {
    (0..len)
        .map(|_| LETTERS[rng.gen_range(0..LETTERS.len())] as char)
        .collect()
}

/// Generates `count` random strings; the same `seed` yields the same batch.
pub fn random_resources(count: usize, len: usize, seed: Option<u64>) -> Vec<String> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    (0..count).map(|_| random_string(&mut rng, len)).collect()
}

/// 32-bit FNV-1a hash.
pub fn fnv1a(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &b| {
        (hash ^ u32::from(b)).wrapping_mul(FNV_PRIME)
    })
}

/// Hashes a resource after sleeping for `delay`.
pub fn hash_process(
    delay: Duration,
) -> impl Fn(&String) -> Result<u32, JobError> + Send + Sync + 'static {
    move |resource: &String| {
        thread::sleep(delay);
        Ok(fnv1a(resource.as_bytes()))
    }
}

/// Increments a result's value after sleeping for `delay`.
pub fn increment(
    delay: Duration,
) -> impl Fn(JobResult<String>) -> JobResult<String> + Send + Sync + 'static {
    move |result: JobResult<String>| {
        thread::sleep(delay);
        JobResult {
            value: result.value.wrapping_add(1),
            ..result
        }
    }
}
