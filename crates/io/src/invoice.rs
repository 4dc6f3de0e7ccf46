//! Fiscal-invoice (NF-e) line-item extraction.
//!
//! The document is parsed into a small element tree whose tags are
//! qualified the ElementTree way (`{uri}local`). Extraction runs twice at
//! most:
//!
//! 1. namespaced: every path step is qualified with the default namespace
//!    of the root element;
//! 2. stripped: if step 1 found no items, namespace qualifiers are removed
//!    from every tag and the same paths are walked unqualified.
//!
//! Both passes build the same [`InvoiceDocument`].

use std::borrow::Cow;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use salesrecon_core::normalize::{normalize_date, Locale};
use salesrecon_core::{RawRow, RawTable, RowOrigin};
use thiserror::Error;

/// Field names line items are exposed under, in table order.
pub const INVOICE_FIELDS: [&str; 6] = ["cProd", "xProd", "qCom", "vUnCom", "vProd", "dhEmi"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvoiceError {
    #[error("not well-formed XML: {0}")]
    Parse(String),
    #[error("no det/prod items under either namespace mode")]
    NoItems,
    #[error("no document id (infNFe@Id or chNFe)")]
    MissingId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceHeader {
    /// Access key without the `NFe` prefix.
    pub id: String,
    /// Raw `dhEmi`/`dEmi` text.
    pub emission_date: Option<String>,
}

/// One `det/prod` node. Values are kept as document text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItem {
    pub number: usize,
    pub sku: String,
    pub description: String,
    pub quantity: String,
    pub unit_value: String,
    pub total_value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceDocument {
    pub header: InvoiceHeader,
    pub items: Vec<LineItem>,
}

impl InvoiceDocument {
    /// One raw row per line item, every row carrying the emission month.
    /// An absent or unreadable emission date leaves the period unresolved.
    pub fn into_table(self, source: &str) -> RawTable {
        let period = self
            .header
            .emission_date
            .as_deref()
            .and_then(|d| normalize_date(d, Locale::PtBr));
        let emission = self.header.emission_date.unwrap_or_default();

        let rows = self
            .items
            .into_iter()
            .map(|item| {
                let values = [
                    item.sku,
                    item.description,
                    item.quantity,
                    item.unit_value,
                    item.total_value,
                    emission.clone(),
                ];
                let fields = INVOICE_FIELDS
                    .iter()
                    .zip(values)
                    .map(|(name, value)| (name.to_string(), value))
                    .collect();
                let mut row = RawRow::new(
                    RowOrigin {
                        source: source.to_string(),
                        sheet: Some(self.header.id.clone()),
                        line: item.number,
                    },
                    fields,
                );
                row.period = period;
                row
            })
            .collect();

        RawTable {
            source: source.to_string(),
            sheet: Some(self.header.id),
            headers: INVOICE_FIELDS.iter().map(|s| s.to_string()).collect(),
            rows,
        }
    }
}

/// Parse one invoice document.
pub fn extract(xml: &str) -> Result<InvoiceDocument, InvoiceError> {
    let mut root = parse_tree(xml)?;

    let mut doc = None;
    if let Some(ns) = root.namespace().map(str::to_string) {
        let found = traverse(&root, &|local| format!("{{{ns}}}{local}"));
        if !found.items.is_empty() {
            doc = Some(found);
        }
    }
    let doc = match doc {
        Some(doc) => doc,
        None => {
            tracing::debug!("no items in namespaced mode; retrying with namespaces stripped");
            root.strip_namespaces();
            traverse(&root, &|local| local.to_string())
        }
    };

    if doc.items.is_empty() {
        return Err(InvoiceError::NoItems);
    }
    let id = doc.id.ok_or(InvoiceError::MissingId)?;
    Ok(InvoiceDocument {
        header: InvoiceHeader {
            id,
            emission_date: doc.emission_date,
        },
        items: doc.items,
    })
}

struct Traversal {
    id: Option<String>,
    emission_date: Option<String>,
    items: Vec<LineItem>,
}

fn traverse(root: &Element, q: &dyn Fn(&str) -> String) -> Traversal {
    let id = root
        .descendants(&q("infNFe"))
        .into_iter()
        .find_map(|inf| inf.attr("Id"))
        .map(|id| id.strip_prefix("NFe").unwrap_or(id).trim().to_string())
        .filter(|id| !id.is_empty())
        .or_else(|| {
            root.descendants(&q("chNFe"))
                .into_iter()
                .find_map(|ch| non_empty(ch.text.trim()))
        });

    let emission_date = root
        .descendants(&q("ide"))
        .into_iter()
        .find_map(|ide| ide.child_text(&q("dhEmi")).or_else(|| ide.child_text(&q("dEmi"))));

    let items = root
        .descendants(&q("det"))
        .into_iter()
        .enumerate()
        .filter_map(|(idx, det)| {
            let prod = det.child(&q("prod"))?;
            let text = |local: &str| prod.child_text(&q(local)).unwrap_or_default();
            Some(LineItem {
                number: det
                    .attr("nItem")
                    .and_then(|n| n.trim().parse().ok())
                    .unwrap_or(idx + 1),
                sku: text("cProd"),
                description: text("xProd"),
                quantity: text("qCom"),
                unit_value: text("vUnCom"),
                total_value: text("vProd"),
            })
        })
        .collect();

    Traversal { id, emission_date, items }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// Element tree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
struct Element {
    tag: String,
    attrs: Vec<(String, String)>,
    text: String,
    children: Vec<Element>,
}

impl Element {
    /// Namespace URI of a `{uri}local` tag.
    fn namespace(&self) -> Option<&str> {
        let rest = self.tag.strip_prefix('{')?;
        let (uri, _) = rest.split_once('}')?;
        non_empty_str(uri)
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    fn child(&self, tag: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.tag == tag)
    }

    fn child_text(&self, tag: &str) -> Option<String> {
        self.child(tag).and_then(|c| non_empty(c.text.trim()))
    }

    /// Every element below this one named `tag`, in document order.
    fn descendants(&self, tag: &str) -> Vec<&Element> {
        let mut out = Vec::new();
        self.collect(tag, &mut out);
        out
    }

    fn collect<'a>(&'a self, tag: &str, out: &mut Vec<&'a Element>) {
        for child in &self.children {
            if child.tag == tag {
                out.push(child);
            }
            child.collect(tag, out);
        }
    }

    fn strip_namespaces(&mut self) {
        self.tag = local_name(&self.tag).to_string();
        for child in &mut self.children {
            child.strip_namespaces();
        }
    }
}

fn non_empty_str(s: &str) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// `{uri}local` or `prefix:local` → `local`.
fn local_name(tag: &str) -> &str {
    let tag = tag.rsplit_once('}').map_or(tag, |(_, l)| l);
    tag.rsplit_once(':').map_or(tag, |(_, l)| l)
}

/// Namespace declarations made on one element: `(prefix, uri)`, with the
/// empty prefix standing for the default namespace.
type Scope = Vec<(String, String)>;

fn parse_tree(xml: &str) -> Result<Element, InvoiceError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    let mut stack: Vec<(Element, Scope)> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let opened = open_element(e, &stack)?;
                stack.push(opened);
            }
            Ok(Event::Empty(ref e)) => {
                let (element, _) = open_element(e, &stack)?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::End(_)) => {
                let (element, _) = stack
                    .pop()
                    .ok_or_else(|| InvoiceError::Parse("unexpected closing tag".into()))?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::Text(ref e)) => push_text(&mut stack, String::from_utf8_lossy(e.as_ref())),
            Ok(Event::CData(ref e)) => push_text(&mut stack, String::from_utf8_lossy(e.as_ref())),
            Ok(Event::GeneralRef(ref e)) => {
                let resolved = match e.resolve_char_ref() {
                    Ok(Some(c)) => Cow::Owned(c.to_string()),
                    _ => {
                        let name = String::from_utf8_lossy(e.as_ref()).to_string();
                        Cow::Borrowed(quick_xml::escape::resolve_predefined_entity(&name).unwrap_or(""))
                    }
                };
                push_text(&mut stack, resolved);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(InvoiceError::Parse(format!(
                    "at byte {}: {e}",
                    reader.buffer_position()
                )))
            }
        }
        buf.clear();
    }

    if let Some((open, _)) = stack.last() {
        return Err(InvoiceError::Parse(format!("unclosed element <{}>", open.tag)));
    }
    root.ok_or_else(|| InvoiceError::Parse("no root element".into()))
}

fn open_element(e: &BytesStart<'_>, stack: &[(Element, Scope)]) -> Result<(Element, Scope), InvoiceError> {
    let mut scope = Scope::new();
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| InvoiceError::Parse(err.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = String::from_utf8_lossy(&attr.value).to_string();
        if key == "xmlns" {
            scope.push((String::new(), value));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            scope.push((prefix.to_string(), value));
        } else {
            attrs.push((local_name(&key).to_string(), value));
        }
    }

    let raw = String::from_utf8_lossy(e.name().as_ref()).to_string();
    let (prefix, local) = raw.split_once(':').unwrap_or(("", raw.as_str()));
    let uri = std::iter::once(&scope)
        .chain(stack.iter().rev().map(|(_, s)| s))
        .flat_map(|s| s.iter().rev())
        .find(|(p, _)| p == prefix)
        .map(|(_, uri)| uri.as_str());

    let tag = match uri {
        Some(uri) if !uri.is_empty() => format!("{{{uri}}}{local}"),
        // Unbound prefixes are kept verbatim; only stripped mode can see them.
        _ => raw.clone(),
    };
    Ok((
        Element {
            tag,
            attrs,
            text: String::new(),
            children: Vec::new(),
        },
        scope,
    ))
}

fn attach(
    stack: &mut [(Element, Scope)],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), InvoiceError> {
    match stack.last_mut() {
        Some((parent, _)) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(InvoiceError::Parse("more than one root element".into())),
    }
    Ok(())
}

fn push_text(stack: &mut [(Element, Scope)], text: Cow<'_, str>) {
    if let Some((element, _)) = stack.last_mut() {
        element.text.push_str(&text);
    }
}
