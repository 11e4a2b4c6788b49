/// Defines a strongly typed identifier backed by a [`Ulid128`].
///
/// The wrapper keeps ids of different resources from being mixed up at
/// compile time while sharing the ULID text form, ordering and (with the
/// `serde` feature) the canonical 26-character JSON representation.
///
/// ```rust
/// use tessera::{Ulid128, define_typed_id};
///
/// define_typed_id!(
///     /// Identifies an order.
///     OrderId
/// );
///
/// let id = OrderId::from(Ulid128::from_u128(42));
/// assert_eq!(id.to_string(), "0000000000000000000000001A");
/// assert_eq!("0000000000000000000000001A".parse::<OrderId>().unwrap(), id);
/// ```
///
/// [`Ulid128`]: crate::Ulid128
#[macro_export]
macro_rules! define_typed_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(transparent)]
        pub struct $name($crate::Ulid128);

        impl $name {
            pub const fn new(id: $crate::Ulid128) -> Self {
                Self(id)
            }

            pub const fn ulid(&self) -> $crate::Ulid128 {
                self.0
            }
        }

        impl ::core::convert::From<$crate::Ulid128> for $name {
            fn from(id: $crate::Ulid128) -> Self {
                Self(id)
            }
        }

        impl ::core::convert::From<$name> for $crate::Ulid128 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                ::core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = $crate::DecodeError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                s.parse::<$crate::Ulid128>().map(Self)
            }
        }

        $crate::__typed_id_serde!($name);
    };
}

#[cfg(feature = "serde")]
#[doc(hidden)]
#[macro_export]
macro_rules! __typed_id_serde {
    ($name:ident) => {
        impl $crate::__private::serde::Serialize for $name {
            fn serialize<S>(&self, s: S) -> ::core::result::Result<S::Ok, S::Error>
            where
                S: $crate::__private::serde::Serializer,
            {
                $crate::__private::serde::Serialize::serialize(&self.0, s)
            }
        }

        impl<'de> $crate::__private::serde::Deserialize<'de> for $name {
            fn deserialize<D>(d: D) -> ::core::result::Result<Self, D::Error>
            where
                D: $crate::__private::serde::Deserializer<'de>,
            {
                <$crate::Ulid128 as $crate::__private::serde::Deserialize<'de>>::deserialize(d)
                    .map(Self)
            }
        }
    };
}

#[cfg(not(feature = "serde"))]
#[doc(hidden)]
#[macro_export]
macro_rules! __typed_id_serde {
    ($name:ident) => {};
}

#[cfg(test)]
mod tests {
    use crate::Ulid128;

    crate::define_typed_id!(
        /// Test id.
        WidgetId
    );

    crate::define_typed_id!(GadgetId);

    #[test]
    fn typed_ids_wrap_and_unwrap() {
        let raw = Ulid128::from_components(1_700_000_000_000, 7);
        let widget = WidgetId::from(raw);
        assert_eq!(widget.ulid(), raw);
        assert_eq!(Ulid128::from(widget), raw);
        assert_eq!(widget.to_string(), raw.to_string());
        assert_eq!(widget.to_string().parse::<WidgetId>().unwrap(), widget);
        assert_eq!(GadgetId::new(raw).ulid(), widget.ulid());
    }

    #[test]
    fn typed_ids_keep_ulid_order() {
        let a = WidgetId::new(Ulid128::from_u128(1));
        let b = WidgetId::new(Ulid128::from_u128(2));
        assert!(a < b);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn typed_ids_serialize_as_text() {
        let id = WidgetId::new(Ulid128::from_u128(42));
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, r#""0000000000000000000000001A""#);
        assert_eq!(serde_json::from_str::<WidgetId>(&json).unwrap(), id);
        assert!(serde_json::from_str::<WidgetId>("42").is_err());
    }
}
