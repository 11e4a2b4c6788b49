use ::serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::{ULID_TEXT_LEN, Ulid128};

impl Serialize for Ulid128 {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let buf = self.encode();
        let text = core::str::from_utf8(&buf).map_err(::serde::ser::Error::custom)?;
        s.serialize_str(text)
    }
}

impl<'de> Deserialize<'de> for Ulid128 {
    fn deserialize<D>(d: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct Base32Visitor;

        impl de::Visitor<'_> for Base32Visitor {
            type Value = Ulid128;

            fn expecting(&self, formatter: &mut core::fmt::Formatter) -> core::fmt::Result {
                write!(
                    formatter,
                    "a {ULID_TEXT_LEN}-character Crockford base32 string"
                )
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ulid128::from_char_column(v).map_err(E::custom)
            }
        }

        d.deserialize_str(Base32Visitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(PartialEq, Eq, Debug, Serialize, Deserialize)]
    struct Row {
        event_id: Ulid128,
    }

    #[test]
    fn ulid_serializes_as_canonical_text() {
        let row = Row {
            event_id: Ulid128::from_u128(42),
        };

        let json = serde_json::to_string(&row).expect("serialize");
        assert_eq!(json, json!({"event_id": "0000000000000000000000001A"}).to_string());
        let back: Row = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, row);
    }

    #[test]
    fn deserialize_rejects_non_canonical_shapes() {
        for bad in [
            r#"{"event_id":42}"#,
            r#"{"event_id":"1A"}"#,
            r#"{"event_id":"0000000000000000000000001A0"}"#,
            r#"{"event_id":"000000000000000000000000!A"}"#,
            r#"{"event_id":"8ZZZZZZZZZZZZZZZZZZZZZZZZZ"}"#,
            r#"{"event_id":null}"#,
        ] {
            assert!(serde_json::from_str::<Row>(bad).is_err(), "{bad}");
        }
    }
}
