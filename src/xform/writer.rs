//! Generation of the `<itext>` block.
//!
//! Values are stored as pre-escaped XML fragments (see the reader), so
//! they are written raw rather than re-escaped; embedded `<output>` tags
//! come out as markup, not entity soup.

use std::io::Cursor;
use std::io::Write;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::ItextError;
use crate::model::{ItextModel, ItextRef};

/// Write the `<itext>` block for the given already-deduplicated items:
/// one `<translation>` per active language (the default one marked),
/// one `<text>` per item, one `<value>` per form. Nothing is written
/// when no language is configured.
///
/// Per-form values go through the fallback chain so a language with no
/// text of its own still shows the best available translation. A
/// markdown-flagged item additionally gets a `<value form="markdown">`
/// carrying the default form's raw text for that language only.
pub fn write_itext_block<W: Write>(
    writer: &mut Writer<W>,
    model: &ItextModel,
    items: &[ItextRef],
) -> Result<(), ItextError> {
    if model.languages().is_empty() {
        return Ok(());
    }
    write_event(writer, Event::Start(BytesStart::new("itext")))?;
    for lang in model.languages() {
        let mut translation = BytesStart::new("translation");
        translation.push_attribute(("lang", lang.as_str()));
        if lang == model.default_language() {
            translation.push_attribute(("default", ""));
        }
        write_event(writer, Event::Start(translation))?;
        for item in items {
            let item = item.borrow();
            let text = BytesStart::new("text").with_attributes([("id", item.id.as_str())]);
            write_event(writer, Event::Start(text))?;
            for form in item.forms() {
                let mut value = BytesStart::new("value");
                if form.name != "default" {
                    value.push_attribute(("form", form.name.as_str()));
                }
                write_event(writer, Event::Start(value))?;
                write_raw_text(writer, form.value_or_default(model, lang))?;
                write_event(writer, Event::End(BytesEnd::new("value")))?;
            }
            if item.has_markdown {
                let value = BytesStart::new("value").with_attributes([("form", "markdown")]);
                write_event(writer, Event::Start(value))?;
                write_raw_text(writer, item.get("default", lang).unwrap_or(""))?;
                write_event(writer, Event::End(BytesEnd::new("value")))?;
            }
            write_event(writer, Event::End(BytesEnd::new("text")))?;
        }
        write_event(writer, Event::End(BytesEnd::new("translation")))?;
    }
    write_event(writer, Event::End(BytesEnd::new("itext")))?;
    Ok(())
}

/// Render the block to a string with two-space indentation.
pub fn itext_block_to_string(model: &ItextModel, items: &[ItextRef]) -> Result<String, ItextError> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    write_itext_block(&mut writer, model, items)?;
    String::from_utf8(writer.into_inner().into_inner()).map_err(|e| {
        ItextError::XmlGenerationError {
            message: e.to_string(),
        }
    })
}

fn write_event<W: Write>(writer: &mut Writer<W>, event: Event) -> Result<(), ItextError> {
    writer
        .write_event(event)
        .map_err(|e| ItextError::XmlGenerationError {
            message: e.to_string(),
        })
}

/// Write a stored value without re-escaping it.
fn write_raw_text<W: Write>(writer: &mut Writer<W>, value: &str) -> Result<(), ItextError> {
    write_event(writer, Event::Text(BytesText::from_escaped(value)))
}
