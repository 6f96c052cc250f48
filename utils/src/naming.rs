use rand::Rng;
use rand::rngs::ThreadRng;

pub const SUFFIX_LEN: usize = 6;

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const ALPHANUMERIC: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Produces short lowercase suffixes that are safe inside Kubernetes object
/// names. Always starts with a letter.
pub struct IdGenerator<R: Rng> {
    rng: R,
}

impl IdGenerator<ThreadRng> {
    pub fn new() -> Self {
        IdGenerator {
            rng: rand::thread_rng(),
        }
    }
}

impl Default for IdGenerator<ThreadRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> IdGenerator<R> {
    pub fn with_rng(rng: R) -> Self {
        IdGenerator { rng }
    }

    pub fn suffix(&mut self) -> String {
        let mut suffix = String::with_capacity(SUFFIX_LEN);
        suffix.push(LETTERS[self.rng.gen_range(0..LETTERS.len())] as char);
        for _ in 1..SUFFIX_LEN {
            suffix.push(ALPHANUMERIC[self.rng.gen_range(0..ALPHANUMERIC.len())] as char);
        }
        suffix
    }
}

pub fn generate_suffix() -> String {
    IdGenerator::new().suffix()
}
