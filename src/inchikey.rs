//! InChIKey derivation from an InChI string.
//!
//! The key is `AAAAAAAAAAAAAA-BBBBBBBBFV-P`: a base-26 rendering of the SHA-256
//! digest of the main layers, the digest of the remaining layers, the
//! standard/version flags and the protonation indicator.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::KinanError;

const INCHI_PREFIX: &str = "InChI=";

/// Layers that belong to the first (skeleton) block. Everything after the
/// first other layer goes to the second block.
const MAIN_LAYERS: [char; 3] = ['c', 'h', 'q'];

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InchiKey(String);

impl InchiKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn skeleton(&self) -> &str {
        &self.0[..14]
    }
}

impl fmt::Display for InchiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for InchiKey {
    type Err = KinanError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        let bytes = normalized.as_bytes();
        let is_valid = bytes.len() == 27
            && bytes[14] == b'-'
            && bytes[25] == b'-'
            && bytes
                .iter()
                .enumerate()
                .filter(|(idx, _)| *idx != 14 && *idx != 25)
                .all(|(_, ch)| ch.is_ascii_uppercase());
        if !is_valid {
            return Err(KinanError::InvalidInchiKey(value.to_string()));
        }
        Ok(Self(normalized.to_string()))
    }
}

impl TryFrom<String> for InchiKey {
    type Error = KinanError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<InchiKey> for String {
    fn from(value: InchiKey) -> Self {
        value.0
    }
}

pub fn inchi_to_inchikey(inchi: &str) -> Result<InchiKey, KinanError> {
    let invalid = |reason: &str| KinanError::InvalidInchi(format!("{reason}: {inchi}"));

    let body = inchi
        .trim()
        .strip_prefix(INCHI_PREFIX)
        .ok_or_else(|| invalid("missing InChI= prefix"))?;
    let (version, layers) = body
        .split_once('/')
        .ok_or_else(|| invalid("missing layers"))?;
    let standard_flag = match version {
        "1S" => 'S',
        "1" => 'N',
        _ => return Err(invalid("unsupported version")),
    };

    let mut layers = layers.split('/');
    let formula = layers.next().unwrap_or_default();
    if formula.is_empty() {
        return Err(invalid("empty formula layer"));
    }

    let mut main = vec![formula];
    let mut rest = Vec::new();
    let mut protonation = 'N';
    for layer in layers {
        let Some(tag) = layer.chars().next() else {
            return Err(invalid("empty layer"));
        };
        if tag == 'p' {
            protonation = protonation_flag(&layer[1..]).ok_or_else(|| invalid("bad /p layer"))?;
        } else if rest.is_empty() && MAIN_LAYERS.contains(&tag) {
            main.push(layer);
        } else {
            rest.push(layer);
        }
    }

    let main_block = main.join("/");
    let mut rest_block = rest.iter().map(|layer| format!("/{layer}")).collect::<String>();
    if rest_block.len() < 255 {
        rest_block = rest_block.repeat(2);
    }

    let first = Sha256::digest(main_block.as_bytes());
    let second = Sha256::digest(rest_block.as_bytes());

    let mut key = String::with_capacity(27);
    key.push_str(triplet(first[0] as usize | ((first[1] & 0x3f) as usize) << 8));
    key.push_str(triplet(
        ((first[1] & 0xc0) as usize | (first[2] as usize) << 8 | ((first[3] & 0x0f) as usize) << 16)
            >> 6,
    ));
    key.push_str(triplet(
        ((first[3] & 0xf0) as usize | (first[4] as usize) << 8 | ((first[5] & 0x03) as usize) << 16)
            >> 4,
    ));
    key.push_str(triplet(
        ((first[5] & 0xfc) as usize | (first[6] as usize) << 8) >> 2,
    ));
    key.push_str(&doublet(first[7] as usize | ((first[8] & 0x01) as usize) << 8));
    key.push('-');
    key.push_str(triplet(second[0] as usize | ((second[1] & 0x3f) as usize) << 8));
    key.push_str(triplet(
        ((second[1] & 0xc0) as usize
            | (second[2] as usize) << 8
            | ((second[3] & 0x0f) as usize) << 16)
            >> 6,
    ));
    key.push_str(&doublet(
        ((second[3] & 0xf0) as usize | ((second[4] & 0x1f) as usize) << 8) >> 4,
    ));
    key.push(standard_flag);
    key.push('A');
    key.push('-');
    key.push(protonation);

    key.parse()
}

/// `N` for neutral, `O`..`Z` for added protons, `M`..`A` for removed ones.
fn protonation_flag(layer: &str) -> Option<char> {
    let count = layer.parse::<i32>().ok()?;
    if count.abs() > 12 {
        return Some('A');
    }
    char::from_u32((b'N' as i32 + count) as u32)
}

/// Triplets skip the `E` block and keep only the first 160 `T` triplets, so
/// that exactly 2^14 remain.
fn triplet(index: usize) -> &'static str {
    static TABLE: std::sync::OnceLock<Vec<String>> = std::sync::OnceLock::new();
    let table = TABLE.get_or_init(|| {
        let mut table = Vec::with_capacity(1 << 14);
        for first in b'A'..=b'Z' {
            if first == b'E' {
                continue;
            }
            let mut block = 0;
            for second in b'A'..=b'Z' {
                for third in b'A'..=b'Z' {
                    if first == b'T' && block == 160 {
                        continue;
                    }
                    table.push(String::from_utf8_lossy(&[first, second, third]).into_owned());
                    block += 1;
                }
            }
        }
        table
    });
    &table[index & 0x3fff]
}

fn doublet(index: usize) -> String {
    let index = index & 0x1ff;
    let first = b'A' + (index / 26) as u8;
    let second = b'A' + (index % 26) as u8;
    String::from_utf8_lossy(&[first, second]).into_owned()
}
