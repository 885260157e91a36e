//! Method and type signatures.
//!
//! Signatures are kept in decoded form. Only the element types that occur in the methods
//! the rewriter inspects or creates are modelled; class and value types refer to their
//! `TypeDef` or `TypeRef` by token.

use std::fmt;

use crate::metadata::token::Token;

/// A type as it appears in a signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeSig {
    /// `void`, only valid as a return type
    Void,
    /// `bool`
    Boolean,
    /// `char`
    Char,
    /// `int32`
    I4,
    /// `int64`
    I8,
    /// `float64`
    R8,
    /// `string`
    String,
    /// `object`
    Object,
    /// A reference type, by `TypeDef` or `TypeRef` token
    Class(Token),
    /// A value type, by `TypeDef` or `TypeRef` token
    ValueType(Token),
}

impl fmt::Display for TypeSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSig::Void => f.write_str("void"),
            TypeSig::Boolean => f.write_str("bool"),
            TypeSig::Char => f.write_str("char"),
            TypeSig::I4 => f.write_str("int32"),
            TypeSig::I8 => f.write_str("int64"),
            TypeSig::R8 => f.write_str("float64"),
            TypeSig::String => f.write_str("string"),
            TypeSig::Object => f.write_str("object"),
            TypeSig::Class(token) => write!(f, "class {token}"),
            TypeSig::ValueType(token) => write!(f, "valuetype {token}"),
        }
    }
}

/// A method signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSig {
    /// Instance method (`this` is argument 0)
    pub has_this: bool,
    /// Return type
    pub return_type: TypeSig,
    /// Parameter types, excluding `this`
    pub params: Vec<TypeSig>,
}

impl MethodSig {
    /// `instance void ()`
    #[must_use]
    pub fn instance_void() -> Self {
        MethodSig {
            has_this: true,
            return_type: TypeSig::Void,
            params: Vec::new(),
        }
    }

    /// `instance <ret> ()`
    #[must_use]
    pub fn instance_returning(return_type: TypeSig) -> Self {
        MethodSig {
            has_this: true,
            return_type,
            params: Vec::new(),
        }
    }

    /// `instance void (<params>)`
    #[must_use]
    pub fn instance_with_params(params: Vec<TypeSig>) -> Self {
        MethodSig {
            has_this: true,
            return_type: TypeSig::Void,
            params,
        }
    }

    /// Returns true if the method returns a value.
    #[must_use]
    pub fn returns_value(&self) -> bool {
        self.return_type != TypeSig::Void
    }

    /// Number of stack slots a call consumes, including `this`.
    #[must_use]
    pub fn call_pops(&self) -> usize {
        self.params.len() + usize::from(self.has_this)
    }
}

impl fmt::Display for MethodSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.has_this {
            f.write_str("instance ")?;
        }
        write!(f, "{} (", self.return_type)?;
        for (index, param) in self.params.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{param}")?;
        }
        f.write_str(")")
    }
}
