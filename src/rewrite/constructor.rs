//! Synthesis of the `.ctor(bool)` that dispatches between the two initializers.
//!
//! The generated body is:
//!
//! ```text
//!     ldarg.0
//!     call      instance void <base>::.ctor()
//!     nop
//!     ldarg.1
//!     brfalse   RUNTIME
//!     ldarg.0
//!     callvirt  instance void InitializeComponent()
//!     br        END
//! RUNTIME:
//!     ldarg.0
//!     callvirt  instance void __InitComponentRuntime()
//! END:
//!     ret
//! ```
//!
//! Branch widths are left to the encoder.

use crate::{
    assembly::{CallSite, InstructionSequence, OpCode, SequenceBuilder},
    codec::ExternalResolver,
    metadata::{
        method::{MethodAttributes, MethodBody, MethodDef, CONSTRUCTOR_NAME},
        signature::{MethodSig, TypeSig},
        token::Token,
        Section,
    },
    rewrite::{locator::Initializers, resolver, FLAG_PARAMETER},
    Error, Result,
};

/// The flag constructor after rewriting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagConstructor {
    /// Constructor token
    pub token: Token,
    /// True if the constructor was added, false if its body was replaced
    pub created: bool,
}

/// Builds the dual-dispatch body.
///
/// `base_ctor` is called with `call`; the initializers are called with `callvirt` and
/// their stack effect taken from their call sites.
///
/// # Errors
/// Propagates builder errors; none occur for well-formed call sites.
pub fn dual_dispatch_body(
    base_ctor: Token,
    precompiled: CallSite,
    runtime: CallSite,
) -> Result<InstructionSequence> {
    let mut il = SequenceBuilder::new();
    let runtime_path = il.label();
    let end = il.label();

    il.emit_ldarg(0)?;
    il.emit_instance_call(OpCode::Call, base_ctor)?;
    il.emit(OpCode::Nop)?;
    il.emit_ldarg(1)?;
    il.branch(OpCode::Brfalse, runtime_path)?;

    il.emit_ldarg(0)?;
    il.emit_call(OpCode::Callvirt, precompiled)?;
    il.branch(OpCode::Br, end)?;

    let runtime_start = il.emit_ldarg(0)?;
    il.emit_call(OpCode::Callvirt, runtime)?;
    let ret = il.emit(OpCode::Ret)?;

    il.bind(runtime_path, runtime_start)?;
    il.bind(end, ret)?;
    il.finish()
}

fn call_site(section: &Section, type_token: Token, method: Token) -> Result<CallSite> {
    let signature = &section
        .type_def(type_token)
        .and_then(|t| t.method(method))
        .ok_or(Error::MethodNotFound(method))?
        .signature;

    let pops = u8::try_from(signature.call_pops())
        .map_err(|_| malformed_error!("Too many parameters on {}", method))?;
    Ok(CallSite {
        method,
        pops,
        pushes: u8::from(signature.returns_value()),
    })
}

/// Adds or rewrites the flag constructor of `type_token`.
///
/// An existing instance constructor whose only parameter is a `bool` keeps its token,
/// attributes and parameter name; only its body is replaced, and its sequence points are
/// reduced to a single hidden one.
///
/// # Errors
/// Returns [`Error::BaseConstructorNotFound`] if the base type cannot be constructed without
/// arguments, and any error of base type resolution.
pub fn rewrite_flag_constructor(
    external: &ExternalResolver<'_>,
    section: &mut Section,
    type_token: Token,
    initializers: &Initializers,
) -> Result<FlagConstructor> {
    let base_ctor = resolver::base_constructor(external, section, type_token)?;
    let body = dual_dispatch_body(
        base_ctor,
        call_site(section, type_token, initializers.precompiled)?,
        call_site(section, type_token, initializers.runtime)?,
    )?;

    let type_def = section.type_mut(type_token)?;
    let existing = type_def
        .find_method(|m| m.is_instance_constructor() && m.has_params(&[TypeSig::Boolean]))
        .map(|m| m.token);

    if let Some(token) = existing {
        let type_name = type_def.name.clone();
        let ctor = type_def.method_mut(token)?;
        log::debug!(
            "Replacing body of {0}.{0}(bool {1})",
            type_name,
            ctor.params.first().map_or("", |p| p.name.as_str())
        );
        ctor.body = Some(MethodBody::new(body));
        if let Some(symbols) = section.symbols.as_mut() {
            symbols.hide_method(token);
        }
        return Ok(FlagConstructor {
            token,
            created: false,
        });
    }

    log::debug!("Adding {0}.{0}(bool {1})", type_def.name, FLAG_PARAMETER);
    let ctor = MethodDef::new(
        Token::default(),
        CONSTRUCTOR_NAME,
        MethodAttributes::INSTANCE_CONSTRUCTOR,
        MethodSig::instance_with_params(vec![TypeSig::Boolean]),
    )
    .with_param(FLAG_PARAMETER)
    .with_body(MethodBody::new(body));

    Ok(FlagConstructor {
        token: section.add_method(type_token, ctor)?,
        created: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembly::{encode, Operand},
        test::{initializer, trace_calls},
    };

    #[test]
    fn test_body_shape() {
        let base = Token::new(0x0A00_0001);
        let precompiled = CallSite::instance_void(Token::new(0x0600_0002));
        let runtime = CallSite::instance_void(Token::new(0x0600_0001));
        let body = dual_dispatch_body(base, precompiled, runtime).unwrap();

        let opcodes: Vec<_> = body.iter().map(|i| i.opcode).collect();
        assert_eq!(
            opcodes,
            vec![
                OpCode::Ldarg0,
                OpCode::Call,
                OpCode::Nop,
                OpCode::Ldarg1,
                OpCode::Brfalse,
                OpCode::Ldarg0,
                OpCode::Callvirt,
                OpCode::Br,
                OpCode::Ldarg0,
                OpCode::Callvirt,
                OpCode::Ret,
            ]
        );

        let instructions = body.instructions();
        assert_eq!(instructions[1].call_target(), Some(base));
        assert_eq!(instructions[6].call_target(), Some(precompiled.method));
        assert_eq!(instructions[9].call_target(), Some(runtime.method));
        assert!(matches!(instructions[4].operand, Operand::Target(t) if t.index() == 8));
        assert!(matches!(instructions[7].operand, Operand::Target(t) if t.index() == 10));

        let encoded = encode(&body, false).unwrap();
        assert_eq!(encoded.max_stack, 1);
        assert_eq!(encoded.code.len(), 25);
        assert_eq!(&encoded.code[8..10], &[0x2C, 0x08]);
        assert_eq!(&encoded.code[16..18], &[0x2B, 0x06]);
    }

    #[test]
    fn test_flag_selects_one_initializer() {
        let base = Token::new(0x0A00_0001);
        let precompiled = CallSite::instance_void(Token::new(0x0600_0002));
        let runtime = CallSite::instance_void(Token::new(0x0600_0001));
        let body = dual_dispatch_body(base, precompiled, runtime).unwrap();

        assert_eq!(trace_calls(&body, true), vec![base, precompiled.method]);
        assert_eq!(trace_calls(&body, false), vec![base, runtime.method]);
    }

    #[test]
    fn test_existing_flag_constructor_keeps_token() {
        let mut section = Section::new("App.dll");
        let base = section.define_type("App", "PageBase", None);
        let base_ctor = MethodDef::new(
            Token::default(),
            CONSTRUCTOR_NAME,
            MethodAttributes::INSTANCE_CONSTRUCTOR,
            MethodSig::instance_void(),
        );
        section.add_method(base, base_ctor).unwrap();

        let page = section.define_type("App", "Page1", Some(base));
        let runtime = section
            .add_method(page, initializer(crate::rewrite::RUNTIME_INITIALIZER))
            .unwrap();
        let precompiled = section
            .add_method(page, initializer(crate::rewrite::PRECOMPILED_INITIALIZER))
            .unwrap();
        let existing = MethodDef::new(
            Token::default(),
            CONSTRUCTOR_NAME,
            MethodAttributes::INSTANCE_CONSTRUCTOR,
            MethodSig::instance_with_params(vec![TypeSig::Boolean]),
        )
        .with_param("compiled");
        let existing = section.add_method(page, existing).unwrap();

        let store = crate::codec::MemoryStore::new();
        let origin = std::path::PathBuf::from("App.dll");
        let external = ExternalResolver::new(&store, &origin, &[]);
        let initializers = Initializers {
            precompiled,
            runtime,
            placeholder_created: false,
        };

        let ctor = rewrite_flag_constructor(&external, &mut section, page, &initializers).unwrap();
        assert_eq!(ctor.token, existing);
        assert!(!ctor.created);

        let type_def = section.type_def(page).unwrap();
        assert_eq!(type_def.count_named(CONSTRUCTOR_NAME), 1);
        let method = type_def.method(existing).unwrap();
        assert_eq!(method.params[0].name, "compiled");
        let body = &method.body.as_ref().unwrap().instructions;
        assert_eq!(
            trace_calls(body, true),
            vec![Token::new(0x0600_0001), precompiled]
        );
    }

    #[test]
    fn test_missing_base_constructor() {
        let mut section = Section::new("App.dll");
        let page = section.define_type("App", "Page1", None);
        let initializers = Initializers {
            precompiled: Token::new(0x0600_0002),
            runtime: Token::new(0x0600_0001),
            placeholder_created: false,
        };

        let store = crate::codec::MemoryStore::new();
        let origin = std::path::PathBuf::from("App.dll");
        let external = ExternalResolver::new(&store, &origin, &[]);
        let result = rewrite_flag_constructor(&external, &mut section, page, &initializers);
        assert!(matches!(
            result,
            Err(Error::BaseConstructorNotFound { ref base, .. }) if base == "<none>"
        ));
        assert!(section.type_def(page).unwrap().methods.is_empty());
    }

    #[test]
    fn test_generic_base_is_named_in_error() {
        let mut section = Section::new("App.dll");
        let generic_base = Token::from_parts(Token::TYPE_SPEC, 1);
        let page = section.define_type("App", "Page1", Some(generic_base));
        let initializers = Initializers {
            precompiled: Token::new(0x0600_0002),
            runtime: Token::new(0x0600_0001),
            placeholder_created: false,
        };

        let store = crate::codec::MemoryStore::new();
        let origin = std::path::PathBuf::from("App.dll");
        let external = ExternalResolver::new(&store, &origin, &[]);
        let error = rewrite_flag_constructor(&external, &mut section, page, &initializers)
            .unwrap_err();
        match error {
            Error::BaseConstructorNotFound { type_name, base } => {
                assert_eq!(type_name, "App.Page1");
                assert!(base.contains("generic instantiation"), "{base}");
                assert!(base.starts_with(&generic_base.to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
