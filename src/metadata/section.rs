//! One module of an assembly and the metadata it owns.
//!
//! A [`Section`] holds resources, type definitions, type and member references and,
//! optionally, debug symbols. It also hands out tokens for rows the rewriter adds: new
//! methods get the next free `MethodDef` row, imported members the next free `MemberRef`
//! row. Rows are derived from the current contents, so a section built by hand in a test
//! and one produced by a codec allocate the same way.

use crate::{
    metadata::{
        method::MethodDef,
        references::{MemberRef, TypeRef},
        resource::Resource,
        signature::MethodSig,
        symbols::{SymbolRefresh, SymbolTable},
        token::Token,
        typedef::{TypeAttributes, TypeDef},
    },
    Error, Result,
};

/// Separator between an enclosing type and a nested type in full names.
pub const NESTED_SEPARATOR: char = '/';

/// A module of an assembly.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Section {
    /// Module name, e.g. `App.dll`
    pub name: String,
    /// Manifest resources, in stored order
    pub resources: Vec<Resource>,
    /// Type definitions, in stored order
    pub types: Vec<TypeDef>,
    /// Type references
    pub type_refs: Vec<TypeRef>,
    /// Member references
    pub member_refs: Vec<MemberRef>,
    /// Debug symbols, if they were read
    pub symbols: Option<SymbolTable>,
}

impl Section {
    /// Creates an empty section.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Section {
            name: name.to_string(),
            ..Section::default()
        }
    }

    /// Adds a resource.
    pub fn add_resource(&mut self, resource: Resource) {
        self.resources.push(resource);
    }

    /// Defines a top-level type and returns its token.
    pub fn define_type(&mut self, namespace: &str, name: &str, extends: Option<Token>) -> Token {
        let token = Token::from_parts(Token::TYPE_DEF, self.next_type_row());
        let mut type_def = TypeDef::new(token, namespace, name);
        type_def.extends = extends;
        self.types.push(type_def);
        token
    }

    /// Defines a type nested in `enclosing` and returns its token.
    ///
    /// # Errors
    /// Returns [`Error::TypeNotFound`] if `enclosing` is not defined in this section.
    pub fn define_nested_type(
        &mut self,
        enclosing: Token,
        name: &str,
        extends: Option<Token>,
    ) -> Result<Token> {
        if self.type_def(enclosing).is_none() {
            return Err(Error::TypeNotFound(enclosing));
        }

        let token = Token::from_parts(Token::TYPE_DEF, self.next_type_row());
        let mut type_def = TypeDef::new(token, "", name);
        type_def.flags = TypeAttributes::NESTED_PUBLIC;
        type_def.extends = extends;
        type_def.enclosing = Some(enclosing);
        self.types.push(type_def);
        Ok(token)
    }

    /// Adds a type reference, reusing an identical existing one.
    pub fn add_type_ref(&mut self, scope: &str, namespace: &str, name: &str) -> Token {
        if let Some(existing) = self
            .type_refs
            .iter()
            .find(|r| r.scope == scope && r.namespace == namespace && r.name == name)
        {
            return existing.token;
        }

        let row = self.type_refs.iter().map(|r| r.token.row()).max().unwrap_or(0) + 1;
        let token = Token::from_parts(Token::TYPE_REF, row);
        self.type_refs.push(TypeRef {
            token,
            scope: scope.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        });
        token
    }

    /// Adds `method` to the type `owner`, assigning it the next free `MethodDef` token.
    ///
    /// # Errors
    /// Returns [`Error::TypeNotFound`] if `owner` is not defined in this section.
    pub fn add_method(&mut self, owner: Token, mut method: MethodDef) -> Result<Token> {
        let token = Token::from_parts(Token::METHOD_DEF, self.next_method_row());
        method.token = token;
        self.type_mut(owner)?.push_method(method)?;
        Ok(token)
    }

    /// Imports a method of a referenced type as a member reference.
    ///
    /// An existing reference with the same parent, name and signature is reused.
    pub fn import_method(&mut self, parent: Token, name: &str, signature: &MethodSig) -> Token {
        if let Some(existing) = self
            .member_refs
            .iter()
            .find(|r| r.matches(parent, name, signature))
        {
            return existing.token;
        }

        let row = self
            .member_refs
            .iter()
            .map(|r| r.token.row())
            .max()
            .unwrap_or(0)
            + 1;
        let token = Token::from_parts(Token::MEMBER_REF, row);
        self.member_refs.push(MemberRef {
            token,
            parent,
            name: name.to_string(),
            signature: signature.clone(),
        });
        token
    }

    /// Looks up a type by full name.
    ///
    /// Top-level types are named `Namespace.Name` (`Name` in the global namespace); nested
    /// types append `/Inner` for each level of nesting.
    #[must_use]
    pub fn find_type(&self, full_name: &str) -> Option<&TypeDef> {
        let mut parts = full_name.split(NESTED_SEPARATOR);
        let outer = parts.next()?;
        let mut current = self
            .types
            .iter()
            .find(|t| t.enclosing.is_none() && t.qualified_name() == outer)?;

        for inner in parts {
            current = self
                .types
                .iter()
                .find(|t| t.enclosing == Some(current.token) && t.name == inner)?;
        }
        Some(current)
    }

    /// Type definition with the given token.
    #[must_use]
    pub fn type_def(&self, token: Token) -> Option<&TypeDef> {
        self.types.iter().find(|t| t.token == token)
    }

    /// Mutable access to the type definition with the given token.
    ///
    /// # Errors
    /// Returns [`Error::TypeNotFound`] if no such type is defined.
    pub fn type_mut(&mut self, token: Token) -> Result<&mut TypeDef> {
        self.types
            .iter_mut()
            .find(|t| t.token == token)
            .ok_or(Error::TypeNotFound(token))
    }

    /// Type reference with the given token.
    #[must_use]
    pub fn type_ref(&self, token: Token) -> Option<&TypeRef> {
        self.type_refs.iter().find(|r| r.token == token)
    }

    /// Member reference with the given token.
    #[must_use]
    pub fn member_ref(&self, token: Token) -> Option<&MemberRef> {
        self.member_refs.iter().find(|r| r.token == token)
    }

    /// Method definition with the given token and the type that owns it.
    #[must_use]
    pub fn method(&self, token: Token) -> Option<(&TypeDef, &MethodDef)> {
        self.types
            .iter()
            .find_map(|t| t.method(token).map(|method| (t, method)))
    }

    /// Full name of a `TypeDef` or `TypeRef`, in the form [`Section::find_type`] accepts.
    #[must_use]
    pub fn type_name(&self, token: Token) -> Option<String> {
        match token.table() {
            Token::TYPE_DEF => {
                let type_def = self.type_def(token)?;
                match type_def.enclosing {
                    Some(enclosing) => Some(format!(
                        "{}{}{}",
                        self.type_name(enclosing)?,
                        NESTED_SEPARATOR,
                        type_def.name
                    )),
                    None => Some(type_def.qualified_name()),
                }
            }
            Token::TYPE_REF => self.type_ref(token).map(TypeRef::qualified_name),
            _ => None,
        }
    }

    /// Refreshes the symbol table against the current methods.
    ///
    /// Returns `None` if the section carries no symbols.
    pub fn refresh_symbols(&mut self) -> Option<SymbolRefresh> {
        let Section { types, symbols, .. } = self;
        let symbols = symbols.as_mut()?;
        Some(symbols.refresh(
            types
                .iter()
                .flat_map(|t| t.methods.iter())
                .map(|m| (m.token, m.name.as_str())),
        ))
    }

    fn next_type_row(&self) -> u32 {
        self.types.iter().map(|t| t.token.row()).max().unwrap_or(0) + 1
    }

    fn next_method_row(&self) -> u32 {
        self.types
            .iter()
            .flat_map(|t| t.methods.iter())
            .map(|m| m.token.row())
            .max()
            .unwrap_or(0)
            + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{
        method::{MethodAttributes, CONSTRUCTOR_NAME},
        signature::MethodSig,
    };

    #[test]
    fn test_find_type_nested() {
        let mut section = Section::new("App.dll");
        let object = section.add_type_ref("mscorlib", "System", "Object");
        let outer = section.define_type("App.Views", "Shell", Some(object));
        let inner = section.define_nested_type(outer, "Flyout", Some(object)).unwrap();
        section.define_type("", "Global", Some(object));

        assert_eq!(section.find_type("App.Views.Shell").unwrap().token, outer);
        assert_eq!(section.find_type("App.Views.Shell/Flyout").unwrap().token, inner);
        assert_eq!(section.find_type("Global").unwrap().name, "Global");
        assert!(section.find_type("App.Views.Flyout").is_none());
        assert!(section.find_type("App.Views.Shell/Missing").is_none());
        assert_eq!(
            section.type_name(inner).as_deref(),
            Some("App.Views.Shell/Flyout")
        );
        assert_eq!(section.type_name(object).as_deref(), Some("System.Object"));
    }

    #[test]
    fn test_method_tokens_allocated_across_types() {
        let mut section = Section::new("App.dll");
        let a = section.define_type("App", "A", None);
        let b = section.define_type("App", "B", None);

        let ctor = || {
            MethodDef::new(
                Token::default(),
                CONSTRUCTOR_NAME,
                MethodAttributes::INSTANCE_CONSTRUCTOR,
                MethodSig::instance_void(),
            )
        };
        let first = section.add_method(a, ctor()).unwrap();
        let second = section.add_method(b, ctor()).unwrap();
        let third = section.add_method(a, ctor()).unwrap();

        assert_eq!(first, Token::new(0x0600_0001));
        assert_eq!(second, Token::new(0x0600_0002));
        assert_eq!(third, Token::new(0x0600_0003));
        assert_eq!(section.method(second).unwrap().0.token, b);
        assert!(matches!(
            section.add_method(Token::new(0x0200_0042), ctor()),
            Err(Error::TypeNotFound(_))
        ));
    }

    #[test]
    fn test_import_method_reuses_reference() {
        let mut section = Section::new("App.dll");
        let base = section.add_type_ref("Forms", "Xamarin.Forms", "ContentPage");
        let sig = MethodSig::instance_void();

        let first = section.import_method(base, CONSTRUCTOR_NAME, &sig);
        let again = section.import_method(base, CONSTRUCTOR_NAME, &sig);
        assert_eq!(first, again);
        assert_eq!(first, Token::new(0x0A00_0001));
        assert_eq!(section.member_refs.len(), 1);

        let other = section.add_type_ref("Forms", "Xamarin.Forms", "ContentView");
        assert_ne!(section.import_method(other, CONSTRUCTOR_NAME, &sig), first);
        assert_eq!(
            section.add_type_ref("Forms", "Xamarin.Forms", "ContentPage"),
            base
        );
    }
}
