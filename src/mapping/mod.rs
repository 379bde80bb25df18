//! Mapping-file writers.
//!
//! The obfuscation map is exported in first-touch order either as a plain text report or
//! as an XML document, so a rename table can be archived next to each shipped build and
//! stack traces can be translated back.

use std::io::Write;

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::Writer;

use crate::{
    rename::{ObfuscationMap, ObfuscationStatus},
    Result,
};

/// A sink for the obfuscation map.
pub trait MapWriter {
    /// Write the complete map.
    ///
    /// # Errors
    /// I/O or serialization faults of the underlying sink.
    fn write_map(&mut self, map: &ObfuscationMap) -> Result<()>;
}

/// Plain text mapping writer: one `kind: old -> new` / `kind: old skipped (reason)`
/// line per symbol, grouped into a renamed and a skipped section.
pub struct TextMapWriter<W: Write> {
    out: W,
}

impl<W: Write> TextMapWriter<W> {
    /// Wrap a sink.
    pub fn new(out: W) -> Self {
        TextMapWriter { out }
    }

    fn write_section(
        &mut self,
        header: &str,
        entries: &[(String, String, &ObfuscationStatus)],
        renamed: bool,
    ) -> Result<()> {
        writeln!(self.out, "{header}")?;
        for (kind, display, status) in entries {
            match status {
                ObfuscationStatus::Renamed(name) | ObfuscationStatus::WillRename(name)
                    if renamed =>
                {
                    writeln!(self.out, "\t{kind}: {display} -> {name}")?;
                }
                ObfuscationStatus::Skipped(reason) if !renamed => {
                    writeln!(self.out, "\t{kind}: {display} ({reason})")?;
                }
                _ => {}
            }
        }
        Ok(())
    }
}

impl<W: Write> MapWriter for TextMapWriter<W> {
    fn write_map(&mut self, map: &ObfuscationMap) -> Result<()> {
        let entries = collect_entries(map);
        self.write_section("Renamed:", &entries, true)?;
        self.write_section("Skipped:", &entries, false)?;
        self.out.flush()?;
        Ok(())
    }
}

/// XML mapping writer.
///
/// ```xml
/// <mapping>
///   <renamed kind="type" oldName="[Lib]Ns.Widget" newName="[Lib]a.A" />
///   <skipped kind="method" name="..." reason="external base class or interface" />
/// </mapping>
/// ```
pub struct XmlMapWriter<W: Write> {
    writer: Writer<W>,
}

impl<W: Write> XmlMapWriter<W> {
    /// Wrap a sink.
    pub fn new(out: W) -> Self {
        XmlMapWriter {
            writer: Writer::new_with_indent(out, b' ', 2),
        }
    }
}

impl<W: Write> MapWriter for XmlMapWriter<W> {
    fn write_map(&mut self, map: &ObfuscationMap) -> Result<()> {
        self.writer
            .write_event(Event::Start(BytesStart::new("mapping")))?;

        for (kind, display, status) in collect_entries(map) {
            match status {
                ObfuscationStatus::Renamed(name) | ObfuscationStatus::WillRename(name) => {
                    let mut element = BytesStart::new("renamed");
                    element.push_attribute(("kind", kind.as_str()));
                    element.push_attribute(("oldName", display.as_str()));
                    element.push_attribute(("newName", name.as_str()));
                    self.writer.write_event(Event::Empty(element))?;
                }
                ObfuscationStatus::Skipped(reason) => {
                    let mut element = BytesStart::new("skipped");
                    element.push_attribute(("kind", kind.as_str()));
                    element.push_attribute(("name", display.as_str()));
                    element.push_attribute(("reason", reason.as_str()));
                    self.writer.write_event(Event::Empty(element))?;
                }
                ObfuscationStatus::Unknown => {}
            }
        }

        self.writer
            .write_event(Event::End(BytesEnd::new("mapping")))?;
        Ok(())
    }
}

/// Flatten the map into `(kind, display, status)` rows, preserving section order:
/// types, methods, fields, properties, events, resources.
fn collect_entries(map: &ObfuscationMap) -> Vec<(String, String, &ObfuscationStatus)> {
    let mut out = Vec::new();
    for (key, status) in map.types() {
        out.push(("type".to_string(), key.to_string(), status));
    }
    for (key, status) in map.methods() {
        out.push(("method".to_string(), key.to_string(), status));
    }
    for (key, status) in map.fields() {
        out.push(("field".to_string(), key.to_string(), status));
    }
    for (key, status) in map.properties() {
        out.push(("property".to_string(), key.to_string(), status));
    }
    for (key, status) in map.events() {
        out.push(("event".to_string(), key.to_string(), status));
    }
    for (name, status) in map.resources() {
        out.push(("resource".to_string(), name.clone(), status));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{ParamSig, TypeKey};

    fn sample_map() -> ObfuscationMap {
        let mut map = ObfuscationMap::new();
        map.update_type(
            &TypeKey::new("Lib", "Ns", "Widget"),
            ObfuscationStatus::Renamed("[Lib]a.A".to_string()),
        );
        map.update_method(
            &crate::metadata::MethodKey::new(
                TypeKey::new("Lib", "Ns", "Widget"),
                "Dispose",
                ParamSig::new(&[], "System.Void"),
            ),
            ObfuscationStatus::Skipped("external base class or interface".to_string()),
        );
        map.add_resource(
            "Ns.Widget.resources",
            ObfuscationStatus::Renamed("a.A.resources".to_string()),
        );
        map
    }

    #[test]
    fn test_text_writer_sections() {
        let mut out = Vec::new();
        TextMapWriter::new(&mut out).write_map(&sample_map()).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("Renamed:"));
        assert!(text.contains("type: [Lib]Ns.Widget -> [Lib]a.A"));
        assert!(text.contains("Skipped:"));
        assert!(text.contains("external base class or interface"));
        assert!(text.contains("resource: Ns.Widget.resources -> a.A.resources"));
    }

    #[test]
    fn test_xml_writer_shape() {
        let mut out = Vec::new();
        XmlMapWriter::new(&mut out).write_map(&sample_map()).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("<mapping>"));
        assert!(text.trim_end().ends_with("</mapping>"));
        assert!(text.contains(r#"<renamed kind="type" oldName="[Lib]Ns.Widget" newName="[Lib]a.A"/>"#));
        assert!(text.contains(r#"reason="external base class or interface""#));
    }
}
