//! Randomness used for synthesising a locally-administered MAC address and for
//! jittering IGMP membership-report timers. A ChaCha-based generator, the same
//! family the teacher uses for its own entropy pool, seeded by the host rather than
//! by processor entropy (this crate has no notion of a hardware RNG).

use rand_chacha::rand_core::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::addr::MacAddr;

pub struct Prng {
    rng: ChaCha20Rng,
}

impl Prng {
    #[must_use]
    pub fn new(seed: [u8; 32]) -> Self {
        Prng {
            rng: ChaCha20Rng::from_seed(seed),
        }
    }

    /// A uniformly distributed value in `0..upper`. `upper` of 0 always yields 0.
    pub fn uniform_range(&mut self, upper: u32) -> u32 {
        if upper == 0 {
            return 0;
        }
        self.rng.next_u32() % upper
    }

    /// A random unicast, locally-administered Ethernet address: the multicast bit
    /// clear, the locally-administered bit set (`x2:xx:xx:xx:xx:xx` shape).
    pub fn random_mac(&mut self) -> MacAddr {
        let mut bytes = [0u8; 6];
        self.rng.fill_bytes(&mut bytes);
        bytes[0] = (bytes[0] & 0xfc) | 0x02;
        MacAddr(bytes)
    }
}
