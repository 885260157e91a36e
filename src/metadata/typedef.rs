//! Type definitions.

use bitflags::bitflags;

use crate::{
    metadata::{method::MethodDef, token::Token},
    Error, Result,
};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// `TypeDef` attribute flags (ECMA-335 II.23.1.15)
    pub struct TypeAttributes: u32 {
        /// Mask for the visibility bits
        const VISIBILITY_MASK = 0x0000_0007;
        /// Top-level public type
        const PUBLIC = 0x0000_0001;
        /// Nested public type
        const NESTED_PUBLIC = 0x0000_0002;
        /// Nested private type
        const NESTED_PRIVATE = 0x0000_0003;
        /// Type is an interface
        const INTERFACE = 0x0000_0020;
        /// Type is abstract
        const ABSTRACT = 0x0000_0080;
        /// Type cannot be derived from
        const SEALED = 0x0000_0100;
        /// Type is special, name describes how
        const SPECIAL_NAME = 0x0000_0400;
        /// Type is imported
        const IMPORT = 0x0000_1000;
        /// Type is serializable
        const SERIALIZABLE = 0x0000_2000;
        /// Type initializer may run before first static field access
        const BEFORE_FIELD_INIT = 0x0010_0000;
    }
}

/// A type definition and the methods it owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDef {
    /// `TypeDef` token
    pub token: Token,
    /// Namespace, empty for nested types and the global namespace
    pub namespace: String,
    /// Simple name
    pub name: String,
    /// Type attributes
    pub flags: TypeAttributes,
    /// Base type, `TypeDef` or `TypeRef` token
    pub extends: Option<Token>,
    /// Enclosing type of a nested type
    pub enclosing: Option<Token>,
    /// Methods in declaration order
    pub methods: Vec<MethodDef>,
}

impl TypeDef {
    /// Creates a public top-level type without base type or methods.
    #[must_use]
    pub fn new(token: Token, namespace: &str, name: &str) -> Self {
        TypeDef {
            token,
            namespace: namespace.to_string(),
            name: name.to_string(),
            flags: TypeAttributes::PUBLIC,
            extends: None,
            enclosing: None,
            methods: Vec::new(),
        }
    }

    /// `Namespace.Name`, or `Name` in the global namespace. Does not include enclosing types.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    /// First method matching `predicate`, in declaration order.
    pub fn find_method<P>(&self, predicate: P) -> Option<&MethodDef>
    where
        P: Fn(&MethodDef) -> bool,
    {
        self.methods.iter().find(|method| predicate(method))
    }

    /// Method with the given token.
    #[must_use]
    pub fn method(&self, token: Token) -> Option<&MethodDef> {
        self.methods.iter().find(|method| method.token == token)
    }

    /// Mutable access to the method with the given token.
    ///
    /// # Errors
    /// Returns [`Error::MethodNotFound`] if the type does not own the method.
    pub fn method_mut(&mut self, token: Token) -> Result<&mut MethodDef> {
        self.methods
            .iter_mut()
            .find(|method| method.token == token)
            .ok_or(Error::MethodNotFound(token))
    }

    /// The instance constructor taking no arguments, if any.
    #[must_use]
    pub fn parameterless_constructor(&self) -> Option<&MethodDef> {
        self.find_method(|method| method.is_instance_constructor() && method.is_parameterless())
    }

    /// Appends a method.
    ///
    /// # Errors
    /// Returns [`Error::DuplicateMethod`] if a method with the same token is already present.
    pub fn push_method(&mut self, method: MethodDef) -> Result<()> {
        if self.method(method.token).is_some() {
            return Err(Error::DuplicateMethod(method.token));
        }
        self.methods.push(method);
        Ok(())
    }

    /// Number of methods called `name`.
    #[must_use]
    pub fn count_named(&self, name: &str) -> usize {
        self.methods.iter().filter(|method| method.name == name).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{
        method::{MethodAttributes, CONSTRUCTOR_NAME},
        signature::{MethodSig, TypeSig},
    };

    fn page() -> TypeDef {
        let mut page = TypeDef::new(Token::new(0x0200_0002), "App", "MainPage");
        page.push_method(MethodDef::new(
            Token::new(0x0600_0001),
            CONSTRUCTOR_NAME,
            MethodAttributes::INSTANCE_CONSTRUCTOR,
            MethodSig::instance_with_params(vec![TypeSig::I4]),
        ))
        .unwrap();
        page.push_method(MethodDef::new(
            Token::new(0x0600_0002),
            CONSTRUCTOR_NAME,
            MethodAttributes::INSTANCE_CONSTRUCTOR,
            MethodSig::instance_void(),
        ))
        .unwrap();
        page
    }

    #[test]
    fn test_qualified_name() {
        assert_eq!(page().qualified_name(), "App.MainPage");
        assert_eq!(
            TypeDef::new(Token::new(0x0200_0003), "", "Global").qualified_name(),
            "Global"
        );
    }

    #[test]
    fn test_parameterless_constructor() {
        let page = page();
        let ctor = page.parameterless_constructor().unwrap();
        assert_eq!(ctor.token, Token::new(0x0600_0002));
        assert_eq!(page.count_named(CONSTRUCTOR_NAME), 2);
    }

    #[test]
    fn test_duplicate_method_rejected() {
        let mut page = page();
        let copy = page.methods[0].clone();
        assert!(matches!(
            page.push_method(copy),
            Err(Error::DuplicateMethod(t)) if t == Token::new(0x0600_0001)
        ));
        assert_eq!(page.methods.len(), 2);
    }

    #[test]
    fn test_method_mut() {
        let mut page = page();
        page.method_mut(Token::new(0x0600_0001)).unwrap().name = "Renamed".to_string();
        assert_eq!(page.method(Token::new(0x0600_0001)).unwrap().name, "Renamed");
        assert!(page.method_mut(Token::new(0x0600_0099)).is_err());
    }
}
