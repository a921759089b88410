#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone, Copy)]
pub struct FuzzParams {
    pub seed: u64,
    pub steps: usize,
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok()?.trim().parse::<u64>().ok()
}

fn env_usize(name: &str) -> Option<usize> {
    std::env::var(name).ok()?.trim().parse::<usize>().ok()
}

fn mix_seed(mut seed: u64, tag: &str) -> u64 {
    // A tiny stable mixer so each test gets a different deterministic stream by default.
    for (i, b) in tag.as_bytes().iter().enumerate() {
        seed ^= (*b as u64) << ((i % 8) * 8);
        seed = seed.rotate_left(13).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    }
    seed
}

pub fn params(test_tag: &str, default_steps: usize) -> FuzzParams {
    let base_seed = env_u64("TOKENCAST_FUZZ_SEED").unwrap_or(0xA1B2_C3D4_E5F6_0708);
    let steps = env_usize("TOKENCAST_FUZZ_STEPS").unwrap_or(default_steps);

    FuzzParams {
        seed: mix_seed(base_seed, test_tag),
        steps,
    }
}

pub fn rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

pub fn choose_tokens(rng: &mut StdRng, max: u32) -> u32 {
    rng.gen_range(0..=max * 2)
}

pub fn choose_count(rng: &mut StdRng) -> i32 {
    rng.gen_range(1..=5)
}
