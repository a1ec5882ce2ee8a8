//! ASCII substitution table.
//!
//! Covers printable ASCII (`0x20..=0x7e`) plus tab, newline and carriage
//! return. A shuffled copy of the alphabet defines the substitution; the
//! unshuffle key records only the characters actually used.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;

use super::LoaderError;

/// Characters the table can substitute, in canonical order
pub fn alphabet() -> Vec<u8> {
    (0x20u8..0x7f).chain([b'\t', b'\n', b'\r']).collect()
}

/// One randomly shuffled substitution
#[derive(Debug, Clone)]
pub struct SubstitutionTable {
    /// `forward[c]` is the substitute for `c`, for every `c` in the alphabet
    forward: [Option<u8>; 128],
}

impl SubstitutionTable {
    /// Fresh table from a random permutation of the alphabet
    pub fn shuffled() -> Self {
        let plain = alphabet();
        let mut shuffled = plain.clone();
        shuffled.shuffle(&mut rand::thread_rng());
        Self::from_permutation(&plain, &shuffled)
    }

    fn from_permutation(plain: &[u8], substitutes: &[u8]) -> Self {
        let mut forward = [None; 128];
        for (&p, &s) in plain.iter().zip(substitutes) {
            forward[p as usize] = Some(s);
        }
        Self { forward }
    }

    /// Substitute every byte of `text`.
    ///
    /// Returns the substituted text and the key mapping each substitute
    /// back to its original.
    pub fn apply(&self, text: &str) -> Result<(String, BTreeMap<String, String>), LoaderError> {
        let mut out = String::with_capacity(text.len());
        let mut key = BTreeMap::new();

        for c in text.chars() {
            let substitute = (c as u32)
                .try_into()
                .ok()
                .and_then(|b: u8| self.forward.get(b as usize).copied().flatten())
                .ok_or(LoaderError::UnsupportedCharacter(c))?;

            let substitute = char::from(substitute);
            out.push(substitute);
            key.insert(substitute.to_string(), c.to_string());
        }

        Ok((out, key))
    }
}

/// Reverse a substitution with its key
pub fn reverse(text: &str, key: &BTreeMap<String, String>) -> Option<String> {
    text.chars()
        .map(|c| key.get(c.encode_utf8(&mut [0; 4]) as &str).cloned())
        .collect()
}
