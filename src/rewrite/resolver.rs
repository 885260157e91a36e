//! Type and base constructor resolution.

use crate::{
    codec::ExternalResolver,
    metadata::{method::CONSTRUCTOR_NAME, token::Token, Section},
    Error, Result,
};

/// Placeholder used in diagnostics for a type without base type.
const NO_BASE: &str = "<none>";

/// Token of the type `class_name` in `section`, or `None` if the section does not define it.
#[must_use]
pub fn find_target_type(section: &Section, class_name: &str) -> Option<Token> {
    let found = section.find_type(class_name).map(|t| t.token);
    if found.is_none() {
        log::debug!("No type '{}' in {}", class_name, section.name);
    }
    found
}

/// Token to call for the parameterless constructor of the base type of `type_token`.
///
/// A base type defined in `section` yields its `MethodDef` token. A base type defined in
/// another assembly is resolved through `external` and its constructor imported into
/// `section` as a `MemberRef`.
///
/// # Errors
/// - [`Error::BaseConstructorNotFound`] if there is no base type, it lacks a parameterless
///   instance constructor, or it is not a `TypeDef` or `TypeRef` (generic bases included)
/// - [`Error::AssemblyNotFound`] if the base type's assembly cannot be located
pub fn base_constructor(
    external: &ExternalResolver<'_>,
    section: &mut Section,
    type_token: Token,
) -> Result<Token> {
    let type_def = section
        .type_def(type_token)
        .ok_or(Error::TypeNotFound(type_token))?;
    let type_name = section
        .type_name(type_token)
        .unwrap_or_else(|| type_def.qualified_name());

    let not_found = |base: String| Error::BaseConstructorNotFound {
        type_name: type_name.clone(),
        base,
    };

    let Some(base) = type_def.extends else {
        return Err(not_found(NO_BASE.to_string()));
    };
    let base_name = section
        .type_name(base)
        .unwrap_or_else(|| base.to_string());

    match base.table() {
        Token::TYPE_DEF => section
            .type_def(base)
            .and_then(|t| t.parameterless_constructor())
            .map(|ctor| ctor.token)
            .ok_or_else(|| not_found(base_name)),
        Token::TYPE_REF => {
            let type_ref = section.type_ref(base).ok_or(Error::TypeNotFound(base))?;
            let (scope, qualified) = (type_ref.scope.clone(), type_ref.qualified_name());

            let resolved = external.resolve_type(&scope, &qualified)?;
            let Some(ctor) = resolved.as_ref().and_then(|t| t.parameterless_constructor()) else {
                return Err(not_found(base_name));
            };

            let token = section.import_method(base, CONSTRUCTOR_NAME, &ctor.signature);
            log::trace!("Imported {}::{} as {}", base_name, CONSTRUCTOR_NAME, token);
            Ok(token)
        }
        Token::TYPE_SPEC => Err(not_found(format!(
            "{base} (generic instantiation, not supported)"
        ))),
        table => Err(not_found(format!(
            "{base} (unsupported table 0x{table:02X})"
        ))),
    }
}
