//! Locates the two initializers of a XAML class, splitting the original one if needed.

use crate::{
    assembly::InstructionSequence,
    metadata::{
        method::{MethodBody, MethodDef},
        signature::MethodSig,
        token::Token,
        Section,
    },
    rewrite::{PRECOMPILED_INITIALIZER, RUNTIME_INITIALIZER},
    Error, Result,
};

/// The initializers a flag constructor dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Initializers {
    /// `InitializeComponent()`, run when the flag is true
    pub precompiled: Token,
    /// `__InitComponentRuntime()`, run when the flag is false
    pub runtime: Token,
    /// True if `InitializeComponent()` was created empty during this run
    pub placeholder_created: bool,
}

fn is_initializer(name: &'static str) -> impl Fn(&MethodDef) -> bool {
    move |method| method.name == name && method.is_parameterless()
}

/// Finds the initializers of `type_token`.
///
/// Returns `Ok(None)` if the type has no `InitializeComponent()`. When there is no
/// `__InitComponentRuntime()` yet, the existing `InitializeComponent()` is renamed to it,
/// keeping its token and body, and an empty `InitializeComponent()` with the same
/// attributes and return type is added.
///
/// # Errors
/// Returns [`Error::TypeNotFound`] if `type_token` is not defined in `section`.
pub fn locate(section: &mut Section, type_token: Token) -> Result<Option<Initializers>> {
    let type_def = section
        .type_def(type_token)
        .ok_or(Error::TypeNotFound(type_token))?;

    let Some(original) = type_def.find_method(is_initializer(PRECOMPILED_INITIALIZER)) else {
        log::debug!("No {} in {}", PRECOMPILED_INITIALIZER, type_def.name);
        return Ok(None);
    };
    let precompiled = original.token;

    if let Some(runtime) = type_def.find_method(is_initializer(RUNTIME_INITIALIZER)) {
        return Ok(Some(Initializers {
            precompiled,
            runtime: runtime.token,
            placeholder_created: false,
        }));
    }

    log::debug!(
        "Renaming {0}.{1}() into {0}.{2}()",
        type_def.name,
        PRECOMPILED_INITIALIZER,
        RUNTIME_INITIALIZER
    );
    let renamed = section.type_mut(type_token)?.method_mut(precompiled)?;
    renamed.name = RUNTIME_INITIALIZER.to_string();

    let placeholder = MethodDef::new(
        Token::default(),
        PRECOMPILED_INITIALIZER,
        renamed.flags,
        MethodSig {
            has_this: renamed.signature.has_this,
            return_type: renamed.signature.return_type.clone(),
            params: Vec::new(),
        },
    )
    .with_impl_flags(renamed.impl_flags)
    .with_body(MethodBody::new(InstructionSequence::empty_body()));

    let placeholder = section.add_method(type_token, placeholder)?;
    log::debug!("Recreated empty {} as {}", PRECOMPILED_INITIALIZER, placeholder);

    Ok(Some(Initializers {
        precompiled: placeholder,
        runtime: precompiled,
        placeholder_created: true,
    }))
}
