//! References to types and members defined in other assemblies.

use crate::metadata::{signature::MethodSig, token::Token};

/// A `TypeRef` row: a type defined elsewhere, identified by its resolution scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    /// `TypeRef` token
    pub token: Token,
    /// Name of the assembly that defines the type
    pub scope: String,
    /// Namespace
    pub namespace: String,
    /// Simple name
    pub name: String,
}

impl TypeRef {
    /// `Namespace.Name`, or `Name` in the global namespace.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }
}

/// A `MemberRef` row referring to a method of a referenced type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef {
    /// `MemberRef` token
    pub token: Token,
    /// Declaring type, usually a `TypeRef` token
    pub parent: Token,
    /// Member name
    pub name: String,
    /// Method signature
    pub signature: MethodSig,
}

impl MemberRef {
    /// Returns true if this reference names `name` with `signature` on `parent`.
    #[must_use]
    pub fn matches(&self, parent: Token, name: &str, signature: &MethodSig) -> bool {
        self.parent == parent && self.name == name && &self.signature == signature
    }
}
