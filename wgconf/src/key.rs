/*
 * SPDX-FileCopyrightText: 2022 Empo Inc.
 *
 * SPDX-License-Identifier: GPL-3.0-or-later
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful, but
 * WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU
 * General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program. If not, see <http://www.gnu.org/licenses/>.
 */

//! WireGuard keys.
//!
//! A [`Key`] is 32 raw bytes. Whether it is a private, public or preshared
//! key depends on where it is stored, not on its type.

use std::convert::TryInto;
use std::fmt;
use std::str::FromStr;

use custom_error::custom_error;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

// Raw crypto primitives
use curve25519_dalek::constants::ED25519_BASEPOINT_TABLE;
use curve25519_dalek::scalar::Scalar;
use rand_core::{OsRng, RngCore};

pub const KEY_LEN: usize = 32;

custom_error! {pub KeyError
    Generation{source: rand_core::Error} = "failed to read random bytes",
    Encoding{source: base64::DecodeError} = "key is not in b64 format",
    Length{len: usize} = "incorrect key size: {len}",
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key([u8; KEY_LEN]);

impl Key {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Key(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Fills a key from the OS random source.
    pub fn generate() -> Result<Self, KeyError> {
        let mut bytes = [0u8; KEY_LEN];
        OsRng.try_fill_bytes(&mut bytes)?;
        Ok(Key(bytes))
    }

    /// Random key clamped so it is a valid X25519 scalar.
    pub fn generate_private() -> Result<Self, KeyError> {
        let mut key = Self::generate()?;
        key.0 = clamp(key.0);
        Ok(key)
    }

    /// Derives the public half of a private key.
    ///
    /// The scalar is clamped before the base point multiplication, so an
    /// unclamped private key yields the same public key as its clamped form.
    pub fn public_key(&self) -> Key {
        let scalar = Scalar::from_bits(clamp(self.0));
        let point = (&ED25519_BASEPOINT_TABLE * &scalar).to_montgomery();
        Key(point.to_bytes())
    }

    pub fn encode(&self) -> String {
        base64::encode(self.0)
    }

    pub fn decode(s: &str) -> Result<Self, KeyError> {
        let raw = base64::decode(s)?;
        let bytes: [u8; KEY_LEN] = raw
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::Length { len: raw.len() })?;
        Ok(Key(bytes))
    }
}

fn clamp(mut bytes: [u8; KEY_LEN]) -> [u8; KEY_LEN] {
    bytes[0] &= 248;
    bytes[31] &= 127;
    bytes[31] |= 64;
    bytes
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

// Keys end up in log lines through `{:?}` on bigger structs.
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Key(..)")
    }
}

impl FromStr for Key {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Key::decode(s)
    }
}

impl Serialize for Key {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for Key {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Key::decode(&s).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_public_key_normal() {
        let privk = Key::decode("ADD7fFbGmA0TqivcbwW7RACosgn2ZqK5uDSijvUul2c=").unwrap();
        let pubk = "LCBsla9u/BT2i9yYKqCi6yHh2nKvvdgyMPVYCkLh/3Y=";

        assert_eq!(privk.public_key().encode(), pubk);
    }

    #[test]
    fn test_public_key_clamp() {
        let privk = Key::decode("gGHF8XEpNKEnzIjoQNs6CRy5bVBTR8ZMcWbFckkWiv8=").unwrap();
        let pubk = "zxUOG5Sb+wZY70iCiK5R4oeTuf1IC/e1whg8GkHl5hI=";

        assert_eq!(privk.public_key().encode(), pubk);
    }

    #[test]
    fn test_public_key_deterministic() {
        let privk = Key::generate_private().unwrap();
        assert_eq!(privk.public_key(), privk.public_key());
    }

    #[test]
    fn test_generate_private_is_clamped() {
        for _ in 0..64 {
            let k = Key::generate_private().unwrap();
            let b = k.as_bytes();
            assert_eq!(b[0] & 0b0000_0111, 0);
            assert_eq!(b[31] & 0b1000_0000, 0);
            assert_eq!(b[31] & 0b0100_0000, 0b0100_0000);
        }
    }

    #[test]
    fn test_generate_differs() {
        assert_ne!(Key::generate().unwrap(), Key::generate().unwrap());
    }

    #[test]
    fn test_encode_decode() {
        let k = Key::generate().unwrap();
        assert_eq!(Key::decode(&k.encode()).unwrap(), k);

        let s = "LCBsla9u/BT2i9yYKqCi6yHh2nKvvdgyMPVYCkLh/3Y=";
        assert_eq!(Key::decode(s).unwrap().encode(), s);
        assert_eq!(s.parse::<Key>().unwrap().to_string(), s);
    }

    #[test]
    fn test_decode_wrong_length() {
        // 16 bytes
        match Key::decode("AAAAAAAAAAAAAAAAAAAAAA==") {
            Err(KeyError::Length { len }) => assert_eq!(len, 16),
            _ => panic!("expected length error"),
        }
    }

    #[test]
    fn test_decode_not_base64() {
        assert!(matches!(
            Key::decode("not a key!"),
            Err(KeyError::Encoding { .. })
        ));
    }

    #[test]
    fn test_debug_hides_material() {
        let k = Key::from_bytes([7u8; KEY_LEN]);
        assert_eq!(format!("{:?}", k), "Key(..)");
    }
}
