//! SOAP/XML plumbing shared by the transformers
//!
//! Documents are rewritten as quick-xml event streams: every event is copied to the
//! output unless a transformer replaces it. Elements are matched on resolved
//! namespace URI plus local name, so any prefix a camera picks works.

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::{NsReader, Writer};

use crate::error::SoapError;

pub const SOAP12_ENV_NS: &str = "http://www.w3.org/2003/05/soap-envelope";
pub const SOAP11_ENV_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const TT_NS: &str = "http://www.onvif.org/ver10/schema";
pub const TPTZ_NS: &str = "http://www.onvif.org/ver20/ptz/wsdl";

/// Namespace-qualified element name, owned so it outlives the reader borrow
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ElementName {
    namespace: Option<String>,
    local: String,
}

impl ElementName {
    pub fn resolve(ns: &ResolveResult, local: &[u8]) -> Self {
        let namespace = match ns {
            ResolveResult::Bound(Namespace(uri)) => Some(String::from_utf8_lossy(uri).into_owned()),
            _ => None,
        };
        Self {
            namespace,
            local: String::from_utf8_lossy(local).into_owned(),
        }
    }

    pub fn is(&self, namespace: &str, local: &str) -> bool {
        self.local == local && self.namespace.as_deref() == Some(namespace)
    }

    /// SOAP envelope element of either protocol version
    pub fn is_envelope(&self, local: &str) -> bool {
        self.is(SOAP12_ENV_NS, local) || self.is(SOAP11_ENV_NS, local)
    }

    pub fn local(&self) -> &str {
        &self.local
    }
}

/// Stack of open elements while walking a document
#[derive(Debug, Default)]
pub(crate) struct ElementPath(Vec<ElementName>);

impl ElementPath {
    pub fn push(&mut self, name: ElementName) {
        self.0.push(name);
    }

    pub fn pop(&mut self) -> Option<ElementName> {
        self.0.pop()
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Innermost open element
    pub fn parent(&self) -> Option<&ElementName> {
        self.0.last()
    }

    pub fn inside(&self, namespace: &str, local: &str) -> bool {
        self.0.iter().any(|n| n.is(namespace, local))
    }
}

/// Namespace-resolving event reader over a borrowed document
pub(crate) struct Events<'i> {
    reader: NsReader<&'i [u8]>,
}

impl<'i> Events<'i> {
    pub fn new(input: &'i str) -> Self {
        Self {
            reader: NsReader::from_str(input),
        }
    }

    /// Next event with its element name (for Start/Empty/End), or `None` at EOF
    pub fn next(&mut self) -> Result<Option<(Option<ElementName>, Event<'i>)>, SoapError> {
        let (ns, event) = self.reader.read_resolved_event()?;
        let name = match &event {
            Event::Start(e) | Event::Empty(e) => {
                Some(ElementName::resolve(&ns, e.local_name().as_ref()))
            }
            Event::End(e) => Some(ElementName::resolve(&ns, e.local_name().as_ref())),
            Event::Eof => return Ok(None),
            _ => None,
        };
        Ok(Some((name, event)))
    }
}

/// Event-stream rewriter: reads `input`, lets the caller decide per event what to
/// write, and returns the produced document.
pub(crate) struct Rewriter<'i> {
    events: Events<'i>,
    writer: Writer<Vec<u8>>,
}

impl<'i> Rewriter<'i> {
    pub fn new(input: &'i str) -> Self {
        Self {
            events: Events::new(input),
            writer: Writer::new(Vec::with_capacity(input.len() + 256)),
        }
    }

    pub fn next(&mut self) -> Result<Option<(Option<ElementName>, Event<'i>)>, SoapError> {
        self.events.next()
    }

    pub fn write(&mut self, event: Event<'_>) -> Result<(), SoapError> {
        self.writer.write_event(event)?;
        Ok(())
    }

    /// Write raw, already well-formed markup
    pub fn write_raw(&mut self, markup: &str) {
        self.writer.get_mut().extend_from_slice(markup.as_bytes());
    }

    pub fn finish(self) -> Result<String, SoapError> {
        Ok(String::from_utf8(self.writer.into_inner())?)
    }
}

/// Qualified-name prefix of an element including the colon (`"tt:"`), or empty
pub(crate) fn prefix_of(e: &BytesStart<'_>) -> String {
    match e.name().prefix() {
        Some(p) => format!("{}:", String::from_utf8_lossy(p.as_ref())),
        None => String::new(),
    }
}

/// Value of an attribute matched by local name, unescaped
pub(crate) fn attribute(e: &BytesStart<'_>, local: &str) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == local.as_bytes())
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Copy of `e` with the given attributes replaced in place, or appended when absent
pub(crate) fn with_attributes(e: &BytesStart<'_>, updates: &[(&str, &str)]) -> BytesStart<'static> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut out = BytesStart::new(name);
    let mut applied = vec![false; updates.len()];

    for attr in e.attributes().flatten() {
        let key = attr.key.local_name();
        match updates
            .iter()
            .position(|(k, _)| attr.key.prefix().is_none() && key.as_ref() == k.as_bytes())
        {
            Some(i) => {
                out.push_attribute(updates[i]);
                applied[i] = true;
            }
            None => out.push_attribute(attr),
        }
    }
    for (i, update) in updates.iter().enumerate() {
        if !applied[i] {
            out.push_attribute(*update);
        }
    }
    out
}

/// Extract the operation name (local name of the first Body child) from a SOAP envelope
pub fn extract_soap_action(xml: &str) -> Option<String> {
    let mut reader = NsReader::from_str(xml);
    let mut in_body = false;

    loop {
        match reader.read_resolved_event() {
            Ok((ns, Event::Start(e))) | Ok((ns, Event::Empty(e))) => {
                let name = ElementName::resolve(&ns, e.local_name().as_ref());
                if in_body {
                    return Some(name.local().to_string());
                }
                if name.is_envelope("Body") {
                    in_body = true;
                }
            }
            Ok((ns, Event::End(e))) => {
                if ElementName::resolve(&ns, e.local_name().as_ref()).is_envelope("Body") {
                    in_body = false;
                }
            }
            Ok((_, Event::Eof)) => break,
            Err(_) => break,
            _ => {}
        }
    }

    None
}

/// True when the document carries a SOAP Fault element
pub fn contains_fault(xml: &str) -> bool {
    let mut reader = NsReader::from_str(xml);
    loop {
        match reader.read_resolved_event() {
            Ok((ns, Event::Start(e))) | Ok((ns, Event::Empty(e))) => {
                if ElementName::resolve(&ns, e.local_name().as_ref()).is_envelope("Fault") {
                    return true;
                }
            }
            Ok((_, Event::Eof)) | Err(_) => return false,
            _ => {}
        }
    }
}
