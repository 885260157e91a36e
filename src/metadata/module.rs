use crate::metadata::section::Section;

/// An assembly opened for rewriting, made of one or more [`Section`]s.
///
/// The first section is the manifest module.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Module {
    /// Assembly name
    pub name: String,
    /// Modules of the assembly, manifest module first
    pub sections: Vec<Section>,
}

impl Module {
    /// Creates an assembly with a single manifest module of the same name.
    #[must_use]
    pub fn new(name: &str, section: Section) -> Self {
        Module {
            name: name.to_string(),
            sections: vec![section],
        }
    }

    /// The manifest module.
    #[must_use]
    pub fn manifest(&self) -> Option<&Section> {
        self.sections.first()
    }

    /// Returns true if any section carries symbols.
    #[must_use]
    pub fn has_symbols(&self) -> bool {
        self.sections.iter().any(|s| s.symbols.is_some())
    }
}
