// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

/// Rolling hash over a fixed-width byte window
///
/// The hash value after [`RollingHash::update`] depends only on the bytes
/// currently inside the window. Identical windows at different stream
/// positions produce identical values, which is what lets the block splitter
/// resynchronize after a local edit.
pub trait RollingHash {
    /// Clears the window and the hash state.
    fn reset(&mut self);

    /// Shifts `byte` into the window, shifts the byte written
    /// `window_size` updates ago out, and returns the updated hash.
    fn update(&mut self, byte: u8) -> u64;

    /// Returns the width of the window in bytes.
    fn window_size(&self) -> usize;
}

/// Default Rabin–Karp base
pub const DEFAULT_BASE: u64 = 1_031;

/// Default Rabin–Karp modulus (prime)
pub const DEFAULT_MODULUS: u64 = 2_147_483_659;

/// Default window width in bytes
pub const DEFAULT_WINDOW: usize = 48;

/// Rabin–Karp rolling hash
///
/// Maintains `hash = sum(window[i] * base^(w-1-i)) mod modulus` with an O(1)
/// update step: `h' = (base * (h - inv * out) + in) mod modulus`, where
/// `inv = base^(w-1) mod modulus`.
pub struct RabinKarp {
    base: u64,
    modulus: u64,
    inv: u64,
    hash: u64,
    window: Vec<u8>,
    pos: usize,
}

impl RabinKarp {
    /// Creates a hash with the given base, modulus and window width.
    ///
    /// # Panics
    ///
    /// Panics if `modulus` is zero or `window_size` is zero.
    #[must_use]
    pub fn new(base: u64, modulus: u64, window_size: usize) -> Self {
        assert!(modulus > 0, "modulus may not be zero");
        assert!(window_size > 0, "window may not be empty");

        Self {
            base,
            modulus,
            inv: pow_mod(base, window_size as u64 - 1, modulus),
            hash: 0,
            window: vec![0; window_size],
            pos: 0,
        }
    }
}

impl Default for RabinKarp {
    fn default() -> Self {
        Self::new(DEFAULT_BASE, DEFAULT_MODULUS, DEFAULT_WINDOW)
    }
}

impl RollingHash for RabinKarp {
    fn reset(&mut self) {
        self.hash = 0;
        self.pos = 0;
        self.window.fill(0);
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    #[allow(clippy::expect_used)]
    fn update(&mut self, byte: u8) -> u64 {
        let slot = self.window.get_mut(self.pos).expect("pos is in range");
        let out = std::mem::replace(slot, byte);
        self.pos = (self.pos + 1) % self.window.len();

        // NOTE: The subtraction can go negative, so normalize in i128
        let h = i128::from(self.base) * (i128::from(self.hash) - i128::from(self.inv) * i128::from(out))
            + i128::from(byte);

        self.hash = h.rem_euclid(i128::from(self.modulus)) as u64;
        self.hash
    }

    fn window_size(&self) -> usize {
        self.window.len()
    }
}

fn pow_mod(base: u64, mut exp: u64, modulus: u64) -> u64 {
    let m = u128::from(modulus);
    let mut result: u128 = 1 % m;
    let mut b = u128::from(base) % m;

    while exp > 0 {
        if exp & 1 == 1 {
            result = result * b % m;
        }
        b = b * b % m;
        exp >>= 1;
    }

    #[allow(clippy::cast_possible_truncation)]
    {
        result as u64
    }
}
