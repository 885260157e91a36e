//! Method definitions, their attributes and bodies.

use bitflags::bitflags;

use crate::{
    assembly::InstructionSequence,
    metadata::{
        signature::{MethodSig, TypeSig},
        token::Token,
    },
};

/// Name of instance constructors.
pub const CONSTRUCTOR_NAME: &str = ".ctor";

/// Name of type initializers.
pub const TYPE_INITIALIZER_NAME: &str = ".cctor";

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// `MethodDef` attribute flags (ECMA-335 II.23.1.10)
    pub struct MethodAttributes: u16 {
        /// Mask for the member access bits
        const ACCESS_MASK = 0x0007;
        /// Accessible only by the parent type
        const PRIVATE = 0x0001;
        /// Accessible by sub-types only in this assembly
        const FAM_AND_ASSEM = 0x0002;
        /// Accessible by anyone in the assembly
        const ASSEM = 0x0003;
        /// Accessible only by type and sub-types
        const FAMILY = 0x0004;
        /// Accessible by sub-types anywhere, plus anyone in the assembly
        const FAM_OR_ASSEM = 0x0005;
        /// Accessible by anyone who has visibility to this scope
        const PUBLIC = 0x0006;
        /// Defined on type, else per instance
        const STATIC = 0x0010;
        /// Method may not be overridden
        const FINAL = 0x0020;
        /// Method is virtual
        const VIRTUAL = 0x0040;
        /// Method hides by name and signature, else just by name
        const HIDE_BY_SIG = 0x0080;
        /// Method always gets a new vtable slot
        const NEW_SLOT = 0x0100;
        /// Method can only be overridden if also accessible
        const STRICT = 0x0200;
        /// Method does not provide an implementation
        const ABSTRACT = 0x0400;
        /// Method is special, name describes how
        const SPECIAL_NAME = 0x0800;
        /// Runtime should check the name encoding
        const RT_SPECIAL_NAME = 0x1000;
        /// Implementation is forwarded through PInvoke
        const PINVOKE_IMPL = 0x2000;
        /// Method has security associated with it
        const HAS_SECURITY = 0x4000;
        /// Method calls another method containing security code
        const REQUIRE_SEC_OBJECT = 0x8000;
    }
}

impl MethodAttributes {
    /// Attributes of a generated instance constructor:
    /// `public hidebysig specialname rtspecialname`.
    pub const INSTANCE_CONSTRUCTOR: MethodAttributes = MethodAttributes::PUBLIC
        .union(MethodAttributes::HIDE_BY_SIG)
        .union(MethodAttributes::SPECIAL_NAME)
        .union(MethodAttributes::RT_SPECIAL_NAME);

    /// The member access bits only.
    #[must_use]
    pub fn access(self) -> MethodAttributes {
        self.intersection(MethodAttributes::ACCESS_MASK)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// `MethodDef` implementation flags (ECMA-335 II.23.1.11)
    pub struct MethodImplAttributes: u16 {
        /// Method impl is native
        const NATIVE = 0x0001;
        /// Method impl is provided by the runtime
        const RUNTIME = 0x0003;
        /// Method impl is unmanaged, otherwise managed
        const UNMANAGED = 0x0004;
        /// Method cannot be inlined
        const NO_INLINING = 0x0008;
        /// Method is defined; used primarily in merge scenarios
        const FORWARD_REF = 0x0010;
        /// Method is single threaded through the body
        const SYNCHRONIZED = 0x0020;
        /// Method will not be optimized when generating native code
        const NO_OPTIMIZATION = 0x0040;
        /// Method signature is exported exactly as declared
        const PRESERVE_SIG = 0x0080;
        /// Method should be inlined if possible
        const AGGRESSIVE_INLINING = 0x0100;
        /// Internal call
        const INTERNAL_CALL = 0x1000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// Method body header flags
    pub struct MethodBodyFlags: u16 {
        /// Tiny method header format
        const TINY_FORMAT = 0x2;
        /// Fat method header format
        const FAT_FORMAT = 0x3;
        /// More data sections follow the code
        const MORE_SECTS = 0x8;
        /// Call the default constructor on all local variables
        const INIT_LOCALS = 0x10;
    }
}

/// A named method parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    /// 1-based position in the signature
    pub sequence: u16,
    /// Parameter name
    pub name: String,
}

/// A method body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodBody {
    /// The instructions
    pub instructions: InstructionSequence,
    /// Zero-initialize locals
    pub init_locals: bool,
}

impl MethodBody {
    /// Body without locals.
    #[must_use]
    pub fn new(instructions: InstructionSequence) -> Self {
        MethodBody {
            instructions,
            init_locals: false,
        }
    }
}

/// A method definition owned by a [`crate::metadata::TypeDef`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDef {
    /// `MethodDef` token
    pub token: Token,
    /// Method name
    pub name: String,
    /// Method attributes
    pub flags: MethodAttributes,
    /// Implementation flags
    pub impl_flags: MethodImplAttributes,
    /// Signature
    pub signature: MethodSig,
    /// Named parameters
    pub params: Vec<Param>,
    /// Body, absent for abstract and runtime-provided methods
    pub body: Option<MethodBody>,
}

impl MethodDef {
    /// Creates a method without parameter names or body.
    #[must_use]
    pub fn new(token: Token, name: &str, flags: MethodAttributes, signature: MethodSig) -> Self {
        MethodDef {
            token,
            name: name.to_string(),
            flags,
            impl_flags: MethodImplAttributes::empty(),
            signature,
            params: Vec::new(),
            body: None,
        }
    }

    /// Adds a parameter name for the next signature position.
    #[must_use]
    pub fn with_param(mut self, name: &str) -> Self {
        let sequence = u16::try_from(self.params.len() + 1).unwrap_or(u16::MAX);
        self.params.push(Param {
            sequence,
            name: name.to_string(),
        });
        self
    }

    /// Sets the implementation flags.
    #[must_use]
    pub fn with_impl_flags(mut self, impl_flags: MethodImplAttributes) -> Self {
        self.impl_flags = impl_flags;
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: MethodBody) -> Self {
        self.body = Some(body);
        self
    }

    /// Returns true for instance and type constructors.
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        (self.name == CONSTRUCTOR_NAME || self.name == TYPE_INITIALIZER_NAME)
            && self
                .flags
                .contains(MethodAttributes::SPECIAL_NAME | MethodAttributes::RT_SPECIAL_NAME)
    }

    /// Returns true for instance constructors.
    #[must_use]
    pub fn is_instance_constructor(&self) -> bool {
        self.name == CONSTRUCTOR_NAME
            && self.is_constructor()
            && !self.flags.contains(MethodAttributes::STATIC)
            && self.signature.has_this
    }

    /// Returns true if the signature has no parameters.
    #[must_use]
    pub fn is_parameterless(&self) -> bool {
        self.signature.params.is_empty()
    }

    /// Returns true if the signature consists of exactly `params`.
    #[must_use]
    pub fn has_params(&self, params: &[TypeSig]) -> bool {
        self.signature.params == params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_constructor_flags() {
        let ctor = MethodDef::new(
            Token::new(0x0600_0001),
            CONSTRUCTOR_NAME,
            MethodAttributes::INSTANCE_CONSTRUCTOR,
            MethodSig::instance_with_params(vec![TypeSig::Boolean]),
        )
        .with_param("useCompiledXaml");

        assert!(ctor.is_constructor());
        assert!(ctor.is_instance_constructor());
        assert!(ctor.has_params(&[TypeSig::Boolean]));
        assert!(!ctor.is_parameterless());
        assert_eq!(ctor.params[0].sequence, 1);
        assert_eq!(ctor.flags.access(), MethodAttributes::PUBLIC);
        assert_eq!(ctor.flags.bits(), 0x1886);
    }

    #[test]
    fn test_static_and_plain_methods() {
        let cctor = MethodDef::new(
            Token::new(0x0600_0002),
            TYPE_INITIALIZER_NAME,
            MethodAttributes::PRIVATE
                | MethodAttributes::STATIC
                | MethodAttributes::SPECIAL_NAME
                | MethodAttributes::RT_SPECIAL_NAME,
            MethodSig {
                has_this: false,
                return_type: TypeSig::Void,
                params: Vec::new(),
            },
        );
        assert!(cctor.is_constructor());
        assert!(!cctor.is_instance_constructor());

        let named_ctor = MethodDef::new(
            Token::new(0x0600_0003),
            CONSTRUCTOR_NAME,
            MethodAttributes::PUBLIC,
            MethodSig::instance_void(),
        );
        assert!(!named_ctor.is_constructor());
    }
}
