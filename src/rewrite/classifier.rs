//! Recognizes XAML resources and the class they were compiled for.
//!
//! A resource is a XAML descriptor when it is embedded, its name ends with `.xaml` and its
//! root element carries an `x:Class` attribute in one of the XAML language namespaces.
//! Only the document prologue and root start tag are read.

use quick_xml::{
    events::{BytesStart, Event},
    name::ResolveResult,
    reader::NsReader,
};

use crate::metadata::Resource;

/// XAML 2006 language namespace.
pub const XAML_2006_NAMESPACE: &str = "http://schemas.microsoft.com/winfx/2006/xaml";

/// XAML 2009 language namespace.
pub const XAML_2009_NAMESPACE: &str = "http://schemas.microsoft.com/winfx/2009/xaml";

const XAML_EXTENSION: &str = ".xaml";
const CLASS_ATTRIBUTE: &[u8] = b"Class";

/// Returns the class name a XAML resource targets, or `None` if it is not a descriptor.
///
/// An empty `x:Class` still marks a descriptor; no type will match it.
///
/// Resources whose header cannot be parsed are reported at warn level and treated as
/// non-descriptors.
#[must_use]
pub fn classify(resource: &Resource) -> Option<String> {
    if !resource.name.ends_with(XAML_EXTENSION) {
        return None;
    }
    let data = resource.embedded_data()?;

    match root_class(data) {
        Ok(class_name) => class_name,
        Err(error) => {
            log::warn!("Unreadable XAML header in '{}': {}", resource.name, error);
            None
        }
    }
}

fn root_class(data: &[u8]) -> Result<Option<String>, quick_xml::Error> {
    let mut reader = NsReader::from_reader(data);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(root) | Event::Empty(root) => return class_attribute(&reader, &root),
            Event::Eof => return Ok(None),
            _ => {}
        }
        buf.clear();
    }
}

fn class_attribute(
    reader: &NsReader<&[u8]>,
    root: &BytesStart<'_>,
) -> Result<Option<String>, quick_xml::Error> {
    let mut xaml_2006 = None;
    let mut xaml_2009 = None;

    for attribute in root.attributes() {
        let attribute = attribute?;
        let (namespace, local) = reader.resolve_attribute(attribute.key);
        if local.as_ref() != CLASS_ATTRIBUTE {
            continue;
        }
        let ResolveResult::Bound(namespace) = namespace else {
            continue;
        };

        if namespace.as_ref() == XAML_2006_NAMESPACE.as_bytes() {
            xaml_2006 = Some(attribute.unescape_value()?.into_owned());
        } else if namespace.as_ref() == XAML_2009_NAMESPACE.as_bytes() {
            xaml_2009 = Some(attribute.unescape_value()?.into_owned());
        }
    }

    Ok(xaml_2006.or(xaml_2009))
}
