//! Value model of the store dialect and the key trait.
//!
//! A [`Node`] is what one entry's value decodes to before serde turns it
//! into a Rust type. Scalars are typed, so every node can be written to the
//! file and read back unchanged.

use std::fmt::{self, Write as _};
use std::hash::Hash;

/// Bare rendering of null.
pub const NULL: &str = "~";

/// Bare rendering of an empty sequence.
pub const EMPTY_SEQ: &str = "[]";

/// Bare rendering of an empty mapping.
pub const EMPTY_MAP: &str = "{}";

/// A single-line value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// `~`
    Null,
    /// `true` or `false`
    Bool(bool),
    /// Bare integer
    Int(i128),
    /// Bare float, always rendered with a `.`, an exponent, `inf` or `NaN`
    Float(f64),
    /// Double-quoted string
    Str(String),
}

impl Scalar {
    /// Classifies an unquoted token. `None` for words the dialect does not
    /// define.
    pub fn parse_bare(text: &str) -> Option<Scalar> {
        match text {
            NULL => return Some(Scalar::Null),
            "true" => return Some(Scalar::Bool(true)),
            "false" => return Some(Scalar::Bool(false)),
            _ => {}
        }
        if let Ok(int) = text.parse::<i128>() {
            return Some(Scalar::Int(int));
        }
        text.parse::<f64>().ok().map(Scalar::Float)
    }

    /// Whether this is the null marker.
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    pub(crate) fn describe(&self) -> &'static str {
        match self {
            Scalar::Null => "null",
            Scalar::Bool(_) => "boolean",
            Scalar::Int(_) => "integer",
            Scalar::Float(_) => "float",
            Scalar::Str(_) => "string",
        }
    }
}

/// Renders the scalar exactly as the encoder writes it.
impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => f.write_str(NULL),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            // Debug keeps `1.0` distinct from the integer `1`.
            Scalar::Float(x) => write!(f, "{:?}", x),
            Scalar::Str(text) => {
                f.write_char('"')?;
                for c in text.chars() {
                    match c {
                        '\\' => f.write_str("\\\\")?,
                        '"' => f.write_str("\\\"")?,
                        '\n' => f.write_str("\\n")?,
                        '\r' => f.write_str("\\r")?,
                        '\t' => f.write_str("\\t")?,
                        '\0' => f.write_str("\\0")?,
                        c if c.is_control() => write!(f, "\\u{{{:x}}}", c as u32)?,
                        c => f.write_char(c)?,
                    }
                }
                f.write_char('"')
            }
        }
    }
}

impl From<&str> for Scalar {
    fn from(text: &str) -> Self {
        Scalar::Str(text.to_string())
    }
}

impl From<String> for Scalar {
    fn from(text: String) -> Self {
        Scalar::Str(text)
    }
}

/// A decoded value: scalar, sequence or mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Single-line scalar
    Scalar(Scalar),
    /// Block sequence (`- item` lines)
    Seq(Vec<Node>),
    /// Block mapping (`key: value` lines), in file order
    Map(Vec<(Scalar, Node)>),
}

impl Node {
    /// The null node.
    pub fn null() -> Self {
        Node::Scalar(Scalar::Null)
    }

    /// Interprets an unquoted token in value position, including the empty
    /// collection markers.
    pub fn from_bare(text: &str) -> Option<Self> {
        match text {
            EMPTY_SEQ => Some(Node::Seq(Vec::new())),
            EMPTY_MAP => Some(Node::Map(Vec::new())),
            _ => Scalar::parse_bare(text).map(Node::Scalar),
        }
    }

    pub(crate) fn describe(&self) -> &'static str {
        match self {
            Node::Scalar(scalar) => scalar.describe(),
            Node::Seq(_) => "sequence",
            Node::Map(_) => "mapping",
        }
    }
}

impl From<Scalar> for Node {
    fn from(scalar: Scalar) -> Self {
        Node::Scalar(scalar)
    }
}

/// Types usable as store keys.
///
/// `NUMERIC` decides, once per key type, whether keys render as bare integers
/// or as quoted strings. The tombstone search relies on this rendering being
/// identical everywhere a key is written, so it is a property of the type and
/// never of an individual key.
pub trait Key: Clone + Eq + Hash + Ord {
    /// Keys of this type render as bare integers.
    const NUMERIC: bool;

    /// The scalar written to the file for this key.
    fn to_scalar(&self) -> Scalar;

    /// Reads a key back. `None` for the wrong scalar kind or an out of range
    /// integer.
    fn from_scalar(scalar: Scalar) -> Option<Self>;

    /// Parses the unquoted textual form, as typed on a command line.
    fn parse(text: &str) -> Option<Self>;
}

impl Key for String {
    const NUMERIC: bool = false;

    fn to_scalar(&self) -> Scalar {
        Scalar::Str(self.clone())
    }

    fn from_scalar(scalar: Scalar) -> Option<Self> {
        match scalar {
            Scalar::Str(text) => Some(text),
            _ => None,
        }
    }

    fn parse(text: &str) -> Option<Self> {
        Some(text.to_string())
    }
}

macro_rules! numeric_key {
    ($($ty:ty),*) => {$(
        impl Key for $ty {
            const NUMERIC: bool = true;

            fn to_scalar(&self) -> Scalar {
                Scalar::Int(*self as i128)
            }

            fn from_scalar(scalar: Scalar) -> Option<Self> {
                match scalar {
                    Scalar::Int(int) => <$ty>::try_from(int).ok(),
                    _ => None,
                }
            }

            fn parse(text: &str) -> Option<Self> {
                text.parse().ok()
            }
        }
    )*};
}

numeric_key!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, usize);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_classification() {
        assert_eq!("a".to_string().to_scalar(), Scalar::Str("a".to_string()));
        assert_eq!(42u32.to_scalar(), Scalar::Int(42));
        assert_eq!((-7i64).to_scalar().to_string(), "-7");
        assert_eq!(u64::MAX.to_scalar().to_string(), u64::MAX.to_string());
    }

    #[test]
    fn test_key_rejects_wrong_kind() {
        assert_eq!(String::from_scalar(Scalar::Int(1)), None);
        assert_eq!(i64::from_scalar(Scalar::Str("1".to_string())), None);
        assert_eq!(i64::from_scalar(Scalar::Int(12)), Some(12));
        assert_eq!(u8::from_scalar(Scalar::Int(300)), None);
    }

    #[test]
    fn test_parse_bare() {
        assert_eq!(Scalar::parse_bare("~"), Some(Scalar::Null));
        assert_eq!(Scalar::parse_bare("false"), Some(Scalar::Bool(false)));
        assert_eq!(Scalar::parse_bare("-12"), Some(Scalar::Int(-12)));
        assert_eq!(Scalar::parse_bare("1.0"), Some(Scalar::Float(1.0)));
        assert_eq!(Scalar::parse_bare("1e3"), Some(Scalar::Float(1000.0)));
        assert!(matches!(Scalar::parse_bare("NaN"), Some(Scalar::Float(x)) if x.is_nan()));
        assert_eq!(Scalar::parse_bare("yes"), None);
        assert_eq!(Scalar::parse_bare(""), None);
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        let scalars = [
            Scalar::Null,
            Scalar::Bool(true),
            Scalar::Int(i128::MIN),
            Scalar::Float(1.0),
            Scalar::Float(-0.5),
            Scalar::Float(1e300),
            Scalar::Float(f64::NEG_INFINITY),
        ];
        for scalar in scalars {
            assert_eq!(Scalar::parse_bare(&scalar.to_string()), Some(scalar.clone()), "{}", scalar);
        }
    }

    #[test]
    fn test_string_escapes() {
        let scalar = Scalar::from("say \"hi\"\\\n\t\u{1}\u{7f}");
        assert_eq!(scalar.to_string(), "\"say \\\"hi\\\"\\\\\\n\\t\\u{1}\\u{7f}\"");
    }

    #[test]
    fn test_empty_collection_markers() {
        assert_eq!(Node::from_bare("[]"), Some(Node::Seq(vec![])));
        assert_eq!(Node::from_bare("{}"), Some(Node::Map(vec![])));
        assert_eq!(Node::from_bare("x"), None);
    }
}
