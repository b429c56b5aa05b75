use derive_more::Display;

/// Data types of the source language, ordered by the promotion lattice.
///
/// The derived `Ord` follows declaration order, so the result type of a
/// binary operator is `a.promote(b)`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Display)]
pub enum DataType {
    #[display("invalid")]
    Invalid,
    #[display("bool")]
    Bool,
    #[display("integer")]
    Integer,
    #[display("float")]
    Float,
    #[display("string")]
    Str,
}

impl DataType {
    pub fn from_type_mark(word: &str) -> Option<Self> {
        match word {
            "integer" => Some(Self::Integer),
            "float" => Some(Self::Float),
            "bool" => Some(Self::Bool),
            "string" => Some(Self::Str),
            _ => None,
        }
    }

    /// Admissible for `+ - * /`.
    pub fn numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }

    /// Admissible for `not & |`, relations, and conditions.
    pub fn logical(self) -> bool {
        matches!(self, Self::Bool | Self::Integer)
    }

    pub fn promote(self, other: Self) -> Self {
        self.max(other)
    }
}

#[cfg(test)]
mod tests {
    use super::DataType;
    use super::DataType::*;

    #[test]
    fn lattice_order() {
        assert!(Invalid < Bool);
        assert!(Bool < Integer);
        assert!(Integer < Float);
        assert!(Float < Str);
    }

    #[test]
    fn promotion_is_commutative() {
        let all = [Invalid, Bool, Integer, Float, Str];
        for a in all {
            for b in all {
                assert_eq!(a.promote(b), b.promote(a));
                assert_eq!(a.promote(b), a.max(b));
            }
        }
    }

    #[test]
    fn type_marks() {
        assert_eq!(DataType::from_type_mark("integer"), Some(Integer));
        assert_eq!(DataType::from_type_mark("float"), Some(Float));
        assert_eq!(DataType::from_type_mark("bool"), Some(Bool));
        assert_eq!(DataType::from_type_mark("string"), Some(Str));
        assert_eq!(DataType::from_type_mark("procedure"), None);
    }
}
