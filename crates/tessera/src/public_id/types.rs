use core::fmt;

use crate::{BASE62_TEXT_LEN, ULID_TEXT_LEN, Ulid128};

/// Payload encodings. Chosen once per deployment; changing it invalidates
/// every public id already handed out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum PublicIdFormat {
    /// The 26-character canonical ULID text.
    #[default]
    UlidBase32,
    /// 22 characters of `0-9A-Za-z`.
    Base62,
}

impl PublicIdFormat {
    pub const fn payload_len(self) -> usize {
        match self {
            Self::UlidBase32 => ULID_TEXT_LEN,
            Self::Base62 => BASE62_TEXT_LEN,
        }
    }
}

/// Characters appended after the payload when checksums are enabled.
pub const CHECKSUM_LEN: usize = 2;

/// An encoded external identifier: `type<sep>payload[checksum]`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicId {
    text: String,
    type_len: usize,
    payload_len: usize,
}

impl PublicId {
    pub(crate) fn from_parts(text: String, type_len: usize, payload_len: usize) -> Self {
        Self {
            text,
            type_len,
            payload_len,
        }
    }

    /// The resource type prefix, e.g. `ord`.
    pub fn id_type(&self) -> &str {
        &self.text[..self.type_len]
    }

    pub fn payload(&self) -> &str {
        let start = self.type_len + 1;
        &self.text[start..start + self.payload_len]
    }

    pub fn checksum(&self) -> Option<&str> {
        let start = self.type_len + 1 + self.payload_len;
        (start < self.text.len()).then(|| &self.text[start..])
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

impl fmt::Display for PublicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl AsRef<str> for PublicId {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

impl From<PublicId> for String {
    fn from(id: PublicId) -> Self {
        id.text
    }
}

/// A fully validated public id.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DecodedPublicId {
    pub id_type: String,
    pub internal_id: Ulid128,
}
