use crate::{
    CHECKSUM_LEN, ConfigError, DecodeError, DecodedPublicId, PublicId, PublicIdError,
    PublicIdFormat, Ulid128, crc8, decode_base62_u128, decode_crockford_u128_strict,
    encode_base62_u128, encode_crockford_pair, encode_crockford_u128,
};

pub const MIN_TYPE_LEN: usize = 2;
pub const MAX_TYPE_LEN: usize = 10;
pub const DEFAULT_SEPARATOR: char = '_';

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CodecConfig {
    pub format: PublicIdFormat,
    /// Append a two-character CRC-8 after the payload.
    pub checksum: bool,
    pub separator: char,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            format: PublicIdFormat::UlidBase32,
            checksum: false,
            separator: DEFAULT_SEPARATOR,
        }
    }
}

/// Returns `true` for a well-formed type prefix: 2 to 10 of `[a-z0-9]`.
pub fn is_valid_type(id_type: &str) -> bool {
    (MIN_TYPE_LEN..=MAX_TYPE_LEN).contains(&id_type.len())
        && id_type
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
}

/// Stateless, deterministic mapping between `(type, Ulid128)` and the
/// external string form.
///
/// Decoding checks, in order: the type, the separator, the exact length
/// after the separator, the checksum, and finally the payload alphabet.
///
/// ```
/// use tessera::{CodecConfig, PublicIdCodec, Ulid128};
///
/// let codec = PublicIdCodec::new(CodecConfig::default()).unwrap();
/// let id = Ulid128::from_components(1_700_000_000_000, 42);
/// let public = codec.encode("ord", id).unwrap();
/// assert_eq!(public.as_str().len(), 3 + 1 + 26);
///
/// let decoded = codec.decode(public.as_str()).unwrap();
/// assert_eq!(decoded.id_type, "ord");
/// assert_eq!(decoded.internal_id, id);
/// ```
#[derive(Clone, Debug)]
pub struct PublicIdCodec {
    config: CodecConfig,
}

impl PublicIdCodec {
    /// # Errors
    ///
    /// The separator must be ASCII punctuation, which keeps it out of both
    /// the type and payload alphabets.
    pub fn new(config: CodecConfig) -> Result<Self, ConfigError> {
        if !config.separator.is_ascii_punctuation() {
            return Err(ConfigError::Separator(config.separator));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    fn suffix_len(&self) -> usize {
        self.config.format.payload_len() + if self.config.checksum { CHECKSUM_LEN } else { 0 }
    }

    pub fn encode(&self, id_type: &str, id: Ulid128) -> Result<PublicId, PublicIdError> {
        if !is_valid_type(id_type) {
            return Err(PublicIdError::InvalidType(id_type.to_owned()));
        }

        let payload_len = self.config.format.payload_len();
        let mut text = String::with_capacity(id_type.len() + 1 + self.suffix_len());
        text.push_str(id_type);
        text.push(self.config.separator);
        match self.config.format {
            PublicIdFormat::UlidBase32 => {
                push_ascii(&mut text, &encode_crockford_u128(id.to_u128()));
            }
            PublicIdFormat::Base62 => push_ascii(&mut text, &encode_base62_u128(id.to_u128())),
        }
        if self.config.checksum {
            let check = checksum_chars(text.as_bytes());
            push_ascii(&mut text, &check);
        }

        Ok(PublicId::from_parts(text, id_type.len(), payload_len))
    }

    /// Encodes a 16-byte big-endian id, as stored in a `BINARY(16)` column.
    pub fn encode_bytes(&self, id_type: &str, bytes: &[u8]) -> Result<PublicId, PublicIdError> {
        let id = Ulid128::from_binary_column(bytes)?;
        self.encode(id_type, id)
    }

    pub fn decode(&self, public_id: &str) -> Result<DecodedPublicId, PublicIdError> {
        let sep = self.config.separator;
        let (id_type, rest) = match public_id.split_once(sep) {
            Some(parts) => parts,
            None => (public_id, ""),
        };
        if !is_valid_type(id_type) {
            return Err(PublicIdError::InvalidType(id_type.to_owned()));
        }
        if id_type.len() == public_id.len() {
            return Err(PublicIdError::MissingSeparator(sep));
        }
        if rest.contains(sep) {
            return Err(PublicIdError::ExtraSeparator(sep));
        }

        let expected = self.suffix_len();
        if rest.len() != expected {
            return Err(PublicIdError::InvalidLength {
                expected,
                got: rest.len(),
            });
        }

        let payload_len = self.config.format.payload_len();
        // Length checked above; a non-char boundary means non-ASCII input.
        let (Some(payload), Some(check)) = (rest.get(..payload_len), rest.get(payload_len..))
        else {
            return Err(PublicIdError::InvalidPayload(DecodeError::InvalidLength {
                expected: payload_len,
                got: rest.len(),
            }));
        };

        if self.config.checksum {
            let signed_len = id_type.len() + 1 + payload_len;
            let expected = checksum_chars(&public_id.as_bytes()[..signed_len]);
            if check.as_bytes() != expected.as_slice() {
                return Err(PublicIdError::ChecksumMismatch);
            }
        }

        let value = match self.config.format {
            PublicIdFormat::UlidBase32 => decode_crockford_u128_strict(payload)?,
            PublicIdFormat::Base62 => decode_base62_u128(payload)?,
        };

        Ok(DecodedPublicId {
            id_type: id_type.to_owned(),
            internal_id: Ulid128::from_u128(value),
        })
    }

    pub fn is_valid(&self, public_id: &str) -> bool {
        self.decode(public_id).is_ok()
    }
}

/// CRC-8 over `type + separator + payload`, as two Crockford characters.
fn checksum_chars(signed: &[u8]) -> [u8; CHECKSUM_LEN] {
    encode_crockford_pair(u16::from(crc8(signed)))
}

fn push_ascii(text: &mut String, bytes: &[u8]) {
    text.extend(bytes.iter().map(|&b| char::from(b)));
}
