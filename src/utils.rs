use core::fmt;

/// Generates an enum convertible from and to a primitive type, where values
/// without a named variant land in an `Unknown` catch-all instead of failing
/// to decode.
///
/// Wire fields with a handful of assigned code points and a reserved
/// remainder (PDU types, opcodes) all go through this.
macro_rules! enum_with_unknown {
    (
        $( #[$enum_attr:meta] )*
        $v:vis enum $name:ident($ty:ty) {
            $(
                $( #[$variant_attr:meta] )*
                $variant:ident = $value:expr
            ),* $(,)?
        }
    ) => {
        $( #[$enum_attr] )*
        $v enum $name {
            $(
                $( #[$variant_attr] )*
                $variant,
            )*
            /// A value this controller does not know.
            Unknown($ty),
        }

        impl ::core::convert::From<$ty> for $name {
            fn from(value: $ty) -> Self {
                match value {
                    $( $value => $name::$variant, )*
                    other => $name::Unknown(other),
                }
            }
        }

        impl ::core::convert::From<$name> for $ty {
            fn from(value: $name) -> Self {
                match value {
                    $( $name::$variant => $value, )*
                    $name::Unknown(other) => other,
                }
            }
        }
    };
}

/// `Debug`-formats a byte slice as lowercase hex octets.
///
/// Used when dumping addresses and raw PDU payloads to the log.
pub struct HexSlice<T>(pub T)
where
    T: AsRef<[u8]>;

impl<T: AsRef<[u8]>> fmt::Debug for HexSlice<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        let mut first = true;
        for byte in self.0.as_ref() {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(f, "{:02x}", byte)?;
        }
        f.write_str("]")
    }
}

/// `Debug`-formats a single value in hexadecimal.
pub struct Hex<T>(pub T)
where
    T: fmt::LowerHex;

impl<T: fmt::LowerHex> fmt::Debug for Hex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_slice() {
        assert_eq!(format!("{:?}", HexSlice(&[][..])), "[]");
        assert_eq!(format!("{:?}", HexSlice(&[0x0a, 0xff][..])), "[0a, ff]");
    }

    #[test]
    fn hex() {
        assert_eq!(format!("{:?}", Hex(0x2au32)), "0x2a");
        assert_eq!(format!("{:?}", Hex(0u8)), "0x0");
    }

    enum_with_unknown! {
        #[derive(Copy, Clone, Debug, PartialEq, Eq)]
        enum Coding(u8) {
            Uncoded = 0,
            Coded = 1,
        }
    }

    #[test]
    fn unknown_catch_all() {
        assert_eq!(Coding::from(1), Coding::Coded);
        assert_eq!(Coding::from(7), Coding::Unknown(7));
        assert_eq!(u8::from(Coding::Unknown(7)), 7);
    }
}
