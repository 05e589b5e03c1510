//! The value type system (spec.md §3 "Types").
//!
//! Types are compared structurally (`PartialEq` derives do exactly that),
//! not by identity — two `Pointer(Box::new(Type::Int32))` values are equal
//! regardless of where they were constructed, mirroring the original
//! `Type::equals` virtual dispatch without needing a vtable.

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Int32,
    Int64,
    UInt32,
    UInt64,
    Double,
    Function(Box<Type>, Vec<Type>),
    Pointer(Box<Type>),
    Array(Box<Type>, usize),
}

impl Type {
    pub fn pointer_to(pointee: Type) -> Type {
        Type::Pointer(Box::new(pointee))
    }

    pub fn array_of(element: Type, length: usize) -> Type {
        Type::Array(Box::new(element), length)
    }

    pub fn function(return_type: Type, params: Vec<Type>) -> Type {
        Type::Function(Box::new(return_type), params)
    }

    pub fn is_signed_integer(&self) -> bool {
        matches!(self, Type::Int32 | Type::Int64)
    }

    pub fn is_unsigned_integer(&self) -> bool {
        matches!(self, Type::UInt32 | Type::UInt64)
    }

    pub fn is_integer(&self) -> bool {
        self.is_signed_integer() || self.is_unsigned_integer()
    }

    pub fn is_arithmetic(&self) -> bool {
        self.is_integer() || matches!(self, Type::Double)
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer(_))
    }

    /// Byte size of the type. Functions have no size; arrays have
    /// `length * element size`.
    pub fn size(&self) -> usize {
        match self {
            Type::Int32 | Type::UInt32 => 4,
            Type::Int64 | Type::UInt64 | Type::Double => 8,
            Type::Pointer(_) => 8,
            Type::Array(elem, len) => elem.size() * len,
            Type::Function(..) => 0,
        }
    }

    /// Natural alignment. Matches size for primitives and pointers; an
    /// array is aligned like its element type.
    pub fn alignment(&self) -> usize {
        match self {
            Type::Int32 | Type::UInt32 => 4,
            Type::Int64 | Type::UInt64 | Type::Double | Type::Pointer(_) => 8,
            Type::Array(elem, _) => elem.alignment(),
            Type::Function(..) => 1,
        }
    }

    /// "Common type" promotion used for arithmetic binary operators
    /// (spec.md §4.2). The usual-arithmetic-conversions ladder, restricted
    /// to this subset's type set: Double dominates everything, then the
    /// wider of the two integer ranks wins ties toward unsigned.
    pub fn common_type(a: &Type, b: &Type) -> Type {
        if a == b {
            return a.clone();
        }
        if *a == Type::Double || *b == Type::Double {
            return Type::Double;
        }
        let rank = |t: &Type| -> u8 {
            match t {
                Type::Int32 => 0,
                Type::UInt32 => 1,
                Type::Int64 => 2,
                Type::UInt64 => 3,
                _ => 0,
            }
        };
        if a.size() == b.size() {
            if a.is_unsigned_integer() || b.is_unsigned_integer() {
                return if a.size() == 8 {
                    Type::UInt64
                } else {
                    Type::UInt32
                };
            }
            return a.clone();
        }
        if rank(a) >= rank(b) { a.clone() } else { b.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_equality_not_identity() {
        let a = Type::pointer_to(Type::Int32);
        let b = Type::pointer_to(Type::Int32);
        assert_eq!(a, b);
    }

    #[test]
    fn common_type_promotes_to_double() {
        assert_eq!(Type::common_type(&Type::Int32, &Type::Double), Type::Double);
    }

    #[test]
    fn common_type_prefers_wider_integer() {
        assert_eq!(Type::common_type(&Type::Int32, &Type::Int64), Type::Int64);
    }

    #[test]
    fn common_type_same_size_prefers_unsigned() {
        assert_eq!(
            Type::common_type(&Type::Int32, &Type::UInt32),
            Type::UInt32
        );
    }

    #[test]
    fn sizes_and_alignment() {
        assert_eq!(Type::Int32.size(), 4);
        assert_eq!(Type::Int64.size(), 8);
        assert_eq!(Type::pointer_to(Type::Int32).size(), 8);
        assert_eq!(Type::pointer_to(Type::Int32).alignment(), 8);
        assert_eq!(Type::array_of(Type::Int32, 3).size(), 12);
    }
}
