//! Resolvable private address matching.
//!
//! A resolvable private address (RPA) is `prand || hash` where
//! `hash = AES-128(irk, 0^104 || prand) mod 2^24`. Holding the IRK lets us
//! recompute the hash and recognise the device across address rotations.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;

/// A 16-byte Identity Resolution Key.
pub type Irk = [u8; 16];

/// Returns `true` if `address` (6 bytes, display order) was generated from `irk`.
///
/// Anything other than a 6-byte address fails closed.
#[must_use]
pub fn matches(irk: &Irk, address: &[u8]) -> bool {
    let Ok(address) = <&[u8; 6]>::try_from(address) else {
        return false;
    };

    let mut block = [0u8; 16];
    block[13..].copy_from_slice(&address[..3]);

    let cipher = Aes128::new(&GenericArray::from(*irk));
    let mut block = GenericArray::from(block);
    cipher.encrypt_block(&mut block);

    block[13..] == address[3..]
}

/// Returns the first key in `irks` that resolves `address`.
#[must_use]
pub fn resolve<'k>(address: &[u8], irks: &'k [Irk]) -> Option<&'k Irk> {
    irks.iter().find(|irk| matches(irk, address))
}
