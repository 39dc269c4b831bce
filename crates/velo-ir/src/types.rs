//! The scalar type system of the IR.
//!
//! A closed set of categories: `None` is the internal "produces nothing"
//! type carried by blocks, functions and control-transfer instructions;
//! `Void` marks the absence of a return value; the `iN` types are the value
//! types every def carries. No unsigned integer types -- signedness is a
//! property of the operation (`SDiv` vs `UDiv`, `Sgt` vs `Ugt`), following
//! the LLVM approach.

use std::fmt;

/// Scalar type of a value, block or function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Type {
    None,
    Void,
    I1,
    I8,
    I16,
    I32,
    I64,
}

impl Type {
    /// `true` for the value-carrying integer types `i1`..`i64`.
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Type::I1 | Type::I8 | Type::I16 | Type::I32 | Type::I64
        )
    }

    /// Bit width of an integer type; `None` for `None`/`Void`.
    pub fn bit_width(self) -> Option<u32> {
        match self {
            Type::I1 => Some(1),
            Type::I8 => Some(8),
            Type::I16 => Some(16),
            Type::I32 => Some(32),
            Type::I64 => Some(64),
            Type::None | Type::Void => None,
        }
    }

    /// Largest unsigned magnitude an integer type can hold; `None` for
    /// `None`/`Void`. Doubles as the all-ones bit pattern of the type.
    pub fn max_value(self) -> Option<u64> {
        match self {
            Type::I1 => Some(1),
            Type::I8 => Some(u8::MAX as u64),
            Type::I16 => Some(u16::MAX as u64),
            Type::I32 => Some(u32::MAX as u64),
            Type::I64 => Some(u64::MAX),
            Type::None | Type::Void => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Type::None => "none",
            Type::Void => "void",
            Type::I1 => "i1",
            Type::I8 => "i8",
            Type::I16 => "i16",
            Type::I32 => "i32",
            Type::I64 => "i64",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths_and_max_values_agree() {
        for ty in [Type::I1, Type::I8, Type::I16, Type::I32, Type::I64] {
            let width = ty.bit_width().unwrap();
            let max = ty.max_value().unwrap();
            if width == 64 {
                assert_eq!(max, u64::MAX);
            } else {
                assert_eq!(max, (1u64 << width) - 1);
            }
        }
    }

    #[test]
    fn non_value_types_have_no_width() {
        assert_eq!(Type::None.bit_width(), None);
        assert_eq!(Type::Void.max_value(), None);
        assert!(!Type::Void.is_integer());
    }

    #[test]
    fn display_names() {
        assert_eq!(Type::I1.to_string(), "i1");
        assert_eq!(Type::I64.to_string(), "i64");
        assert_eq!(Type::Void.to_string(), "void");
    }
}
