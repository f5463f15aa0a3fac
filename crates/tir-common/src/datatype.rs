//! Tensor element data types.

/// Precision of a floating-point data type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FloatPrecision {
    Half,
    Single,
    Double,
}

impl FloatPrecision {
    /// Bit width of the representation.
    pub const fn bit_width(self) -> u32 {
        match self {
            FloatPrecision::Half => 16,
            FloatPrecision::Single => 32,
            FloatPrecision::Double => 64,
        }
    }
}

/// The element type of a tensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataType {
    Bool,
    Int(u32),
    Float(FloatPrecision),
}

impl DataType {
    pub const fn is_bool(self) -> bool {
        matches!(self, DataType::Bool)
    }

    pub const fn is_numeric(self) -> bool {
        matches!(self, DataType::Int(_) | DataType::Float(_))
    }

    /// Bit width of the representation.
    pub const fn bit_width(self) -> u32 {
        match self {
            DataType::Bool => 1,
            DataType::Int(w) => w,
            DataType::Float(p) => p.bit_width(),
        }
    }

    /// Whether a value of this data type can be cast to `other`.
    ///
    /// Casting is allowed within the bool < int < float order, and within
    /// a base type to an equal or wider representation.
    pub fn can_cast(self, other: DataType) -> bool {
        match (self, other) {
            (DataType::Bool, _) => true,
            (DataType::Int(a), DataType::Int(b)) => a <= b,
            (DataType::Int(_), DataType::Float(_)) => true,
            (DataType::Float(a), DataType::Float(b)) => a <= b,
            _ => false,
        }
    }

    /// Parse a textual data type: `bool`, `iN`, `f16`, `f32` or `f64`.
    pub fn parse(text: &str) -> Option<DataType> {
        match text {
            "bool" => Some(DataType::Bool),
            "f16" => Some(DataType::Float(FloatPrecision::Half)),
            "f32" => Some(DataType::Float(FloatPrecision::Single)),
            "f64" => Some(DataType::Float(FloatPrecision::Double)),
            _ => {
                let width = text.strip_prefix('i')?;
                if width.is_empty() || !width.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                width.parse().ok().filter(|&w| w > 0).map(DataType::Int)
            }
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataType::Bool => write!(f, "bool"),
            DataType::Int(w) => write!(f, "i{w}"),
            DataType::Float(FloatPrecision::Half) => write!(f, "f16"),
            DataType::Float(FloatPrecision::Single) => write!(f, "f32"),
            DataType::Float(FloatPrecision::Double) => write!(f, "f64"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cast_lattice() {
        assert!(DataType::Bool.can_cast(DataType::Int(8)));
        assert!(DataType::Int(8).can_cast(DataType::Int(32)));
        assert!(!DataType::Int(32).can_cast(DataType::Int(8)));
        assert!(DataType::Int(64).can_cast(DataType::Float(FloatPrecision::Half)));
        assert!(!DataType::Float(FloatPrecision::Single).can_cast(DataType::Int(64)));
        assert!(
            DataType::Float(FloatPrecision::Single).can_cast(DataType::Float(FloatPrecision::Double))
        );
    }

    #[test]
    fn parse_round_trips_display() {
        for text in ["bool", "i1", "i32", "i64", "f16", "f32", "f64"] {
            let dt = DataType::parse(text).unwrap();
            assert_eq!(dt.to_string(), text);
        }
        assert_eq!(DataType::parse("i0"), None);
        assert_eq!(DataType::parse("f8"), None);
        assert_eq!(DataType::parse("int"), None);
    }
}
