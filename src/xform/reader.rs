//! Parsing of the `<itext>` block out of an XForm document.
//!
//! Values are stored as raw XML fragments, sliced straight out of the
//! input, so embedded markup such as `<output value="/data/q1" />` and
//! pre-escaped entities survive a round trip byte-for-byte.

use std::collections::HashMap;

use roxmltree::{Document, Node};

use crate::error::ItextError;
use crate::model::{ItextModel, ItextRef};
use crate::sync::default_itext_id;
use crate::tree::{FormTree, ItextSlot, MugId};

/// Result of parsing an `<itext>` block: the items in document order,
/// an id index for re-linking tree slots, and any non-fatal warnings.
///
/// Parsed items start with a reference count of zero; each slot that
/// resolves to an item through [`ParsedItext::resolve`] adds one.
#[derive(Debug, Default)]
pub struct ParsedItext {
    items: Vec<ItextRef>,
    by_id: HashMap<String, ItextRef>,
    pub warnings: Vec<String>,
}

impl ParsedItext {
    pub fn items(&self) -> &[ItextRef] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&ItextRef> {
        self.by_id.get(id)
    }

    /// Link one itext slot of a mug to the item named by `id`.
    ///
    /// A known id reuses the parsed item, increments its reference
    /// count, and pins `auto_id` off when the id differs from the one
    /// the mug's path would derive. An unknown or empty id mints a
    /// fresh item instead.
    pub fn resolve(
        &mut self,
        tree: &mut FormTree,
        model: &mut ItextModel,
        mug_id: MugId,
        slot: ItextSlot,
        id: &str,
    ) -> ItextRef {
        let auto = id.is_empty() || id == default_itext_id(tree, mug_id, slot);
        let item = match self.by_id.get(id).filter(|_| !id.is_empty()) {
            Some(item) => {
                {
                    let mut item = item.borrow_mut();
                    if !auto {
                        item.auto_id = false;
                    }
                    item.ref_count += 1;
                }
                item.clone()
            }
            None => model.create_item(id, auto, false),
        };
        tree.mug_mut(mug_id).set_itext(slot, Some(item.clone()));
        item
    }
}

/// Parse the first `<itext>` block found in `xml` into `model`.
///
/// When `langs` is non-empty it acts as a whitelist: its languages are
/// registered up front (the first one becomes the default) and any
/// `<translation>` for a language outside it is dropped with a warning.
/// With an empty whitelist the block's own languages are taken as-is
/// and the `default` attribute picks the default.
pub fn parse_itext_block(
    xml: &str,
    model: &mut ItextModel,
    langs: &[String],
) -> Result<ParsedItext, ItextError> {
    let doc = Document::parse(xml).map_err(|source| ItextError::XmlParseError { source })?;
    let mut parsed = ParsedItext::default();

    for lang in langs {
        model.add_language(lang);
    }
    if let Some(first) = langs.first() {
        model.set_default_language(first);
    }

    let block = doc
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "itext");
    let block = match block {
        Some(block) => block,
        None => return Ok(parsed),
    };

    for translation in block
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "translation")
    {
        let lang = translation
            .attribute("lang")
            .ok_or(ItextError::MissingTranslationLang)?;
        if !langs.is_empty() && !langs.iter().any(|l| l == lang) {
            parsed.warnings.push(format!(
                "form language \"{lang}\" is not in the configured language list \
                 and will be dropped on save"
            ));
            continue;
        }
        model.add_language(lang);
        if langs.is_empty() && translation.has_attribute("default") {
            model.set_default_language(lang);
        }

        for text in translation
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == "text")
        {
            let id = text.attribute("id").ok_or_else(|| ItextError::MissingTextId {
                lang: lang.to_string(),
            })?;
            let item = match parsed.by_id.get(id) {
                Some(item) => item.clone(),
                None => {
                    let item = model.create_item(id, true, false);
                    item.borrow_mut().ref_count = 0;
                    parsed.items.push(item.clone());
                    parsed.by_id.insert(id.to_string(), item.clone());
                    item
                }
            };
            let mut item = item.borrow_mut();
            for value in text
                .children()
                .filter(|n| n.is_element() && n.tag_name().name() == "value")
            {
                let content = inner_xml(xml, value);
                match value.attribute("form") {
                    None => {
                        // markdown and default share storage; markdown wins
                        if !item.has_markdown {
                            item.set_in("default", lang, &content);
                        }
                    }
                    Some("markdown") => {
                        item.has_markdown = true;
                        item.set_in("default", lang, &content);
                    }
                    Some(form) => item.set_in(form, lang, &content),
                }
            }
        }
    }

    Ok(parsed)
}

/// The raw markup between an element's start and end tags.
fn inner_xml(doc_text: &str, node: Node) -> String {
    match (node.first_child(), node.last_child()) {
        (Some(first), Some(last)) => doc_text[first.range().start..last.range().end].to_string(),
        _ => String::new(),
    }
}
