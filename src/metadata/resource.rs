//! Manifest resources.

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// `ManifestResource` attribute flags (ECMA-335 II.23.1.9)
    pub struct ManifestResourceAttributes: u32 {
        /// The resource is exported from the assembly
        const PUBLIC = 0x0001;
        /// The resource is private to the assembly
        const PRIVATE = 0x0002;
    }
}

/// Where the bytes of a resource live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceData {
    /// Stored in the module itself
    Embedded(Vec<u8>),
    /// Stored in a separate file of the assembly
    Linked {
        /// File name
        file: String,
    },
    /// Stored in another assembly
    AssemblyLinked {
        /// Assembly name
        assembly: String,
    },
}

/// A named resource of a section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Resource name, usually `<RootNamespace>.<path>.<file>`
    pub name: String,
    /// Resource attributes
    pub flags: ManifestResourceAttributes,
    /// Resource contents or location
    pub data: ResourceData,
}

impl Resource {
    /// Creates a public embedded resource.
    #[must_use]
    pub fn embedded(name: &str, data: impl Into<Vec<u8>>) -> Self {
        Resource {
            name: name.to_string(),
            flags: ManifestResourceAttributes::PUBLIC,
            data: ResourceData::Embedded(data.into()),
        }
    }

    /// Creates a public resource stored in a separate file.
    #[must_use]
    pub fn linked(name: &str, file: &str) -> Self {
        Resource {
            name: name.to_string(),
            flags: ManifestResourceAttributes::PUBLIC,
            data: ResourceData::Linked {
                file: file.to_string(),
            },
        }
    }

    /// Bytes of an embedded resource.
    #[must_use]
    pub fn embedded_data(&self) -> Option<&[u8]> {
        match &self.data {
            ResourceData::Embedded(data) => Some(data),
            ResourceData::Linked { .. } | ResourceData::AssemblyLinked { .. } => None,
        }
    }
}
