use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};

const ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
pub const PNR_LENGTH: usize = 8;

/// 36^8, the number of distinct codes.
const CODE_SPACE: u64 = 2_821_109_907_456;

/// Coprime to 36^8 (odd, not a multiple of 3), so stepping by it visits every
/// code once before repeating.
const STRIDE: u64 = 1_125_899_906_842_597;

/// Mints 8-character uppercase alphanumeric booking references.
///
/// Codes from one generator never repeat until the whole space is used up.
/// Generators in other processes start at independent random offsets; the
/// `bookings.pnr` unique constraint catches the rare cross-process collision.
#[derive(Debug)]
pub struct PnrGenerator {
    offset: u64,
    sequence: AtomicU64,
}

impl PnrGenerator {
    pub fn new() -> Self {
        Self::with_offset(rand::thread_rng().gen_range(0..CODE_SPACE))
    }

    pub fn with_offset(offset: u64) -> Self {
        Self { offset: offset % CODE_SPACE, sequence: AtomicU64::new(0) }
    }

    pub fn generate(&self) -> String {
        let n = self.sequence.fetch_add(1, Ordering::Relaxed);
        let value = (self.offset as u128 + n as u128 * STRIDE as u128) % CODE_SPACE as u128;
        encode(value as u64)
    }
}

impl Default for PnrGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn encode(mut value: u64) -> String {
    let mut out = [b'0'; PNR_LENGTH];
    for slot in out.iter_mut().rev() {
        *slot = ALPHABET[(value % 36) as usize];
        value /= 36;
    }
    out.iter().map(|b| *b as char).collect()
}
