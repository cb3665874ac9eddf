//! Bulk translation transfer as tab-separated text.
//!
//! A lossy, human-editable companion format: one header row (`label`
//! plus `form_lang` columns), then one row per item with the item id in
//! the first cell. Cells containing tabs, newlines, or quotes are
//! quoted with doubled-quote escapes.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::model::{ItextModel, ItextRef, OUTPUT_TAG_RE};
use crate::sync::{resolve_and_assign_ids, resolve_items_by_id};
use crate::tree::FormTree;

/// The form columns the tabular format carries. Media forms beyond
/// these travel only through the XML format.
pub const BULK_FORMS: [&str; 4] = ["default", "audio", "image", "video"];

/// Outcome of a bulk import. Unknown ids do not fail the import; they
/// are collected here so the caller can surface them.
#[derive(Debug, Default)]
pub struct BulkImportStats {
    pub updated_cells: usize,
    pub skipped_ids: Vec<String>,
}

/// Header cell of the shape `{form}-{lang}` or `{form}_{lang}`.
/// `None` for anything else; such columns are ignored entirely.
fn parse_header_cell(cell: &str, model: &ItextModel) -> Option<(String, String)> {
    let (form, lang) = cell.split_once(['-', '_'])?;
    if !BULK_FORMS.contains(&form) || !model.has_language(lang) {
        return None;
    }
    Some((form.to_string(), lang.to_string()))
}

static ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^&(#[0-9]+|#x[0-9a-fA-F]+|\w+);").unwrap());

/// Bring a table cell into the stored-fragment convention: values are
/// kept as XML fragments, so a bare `&` or `<` from a translator must
/// be escaped here or it would corrupt the re-emitted block. Entity
/// references and embedded output tags pass through untouched.
fn escape_fragment(value: &str) -> String {
    if !value.contains(['&', '<']) {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len());
    let mut last = 0;
    for tag in OUTPUT_TAG_RE.find_iter(value) {
        escape_text_into(&mut out, &value[last..tag.start()]);
        out.push_str(tag.as_str());
        last = tag.end();
    }
    escape_text_into(&mut out, &value[last..]);
    out
}

fn escape_text_into(out: &mut String, text: &str) {
    for (i, c) in text.char_indices() {
        match c {
            '&' if !ENTITY_RE.is_match(&text[i..]) => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            _ => out.push(c),
        }
    }
}

/// Apply a tab-separated translation table onto items looked up by id.
///
/// A cell for a form the item already has always overwrites; a cell for
/// a missing form creates it only when non-blank, so blank columns do
/// not litter items with empty forms. Cells are stored as XML
/// fragments; stray markup characters are escaped on the way in (see
/// [`escape_fragment`]).
pub fn apply_xls_itext(
    items: &HashMap<String, ItextRef>,
    text: &str,
    model: &ItextModel,
) -> BulkImportStats {
    let mut stats = BulkImportStats::default();
    let mut rows = parse_tsv(text).into_iter();
    let header: Vec<Option<(String, String)>> = match rows.next() {
        Some(cells) => cells
            .iter()
            .map(|cell| parse_header_cell(cell, model))
            .collect(),
        None => return stats,
    };

    for cells in rows {
        let id = match cells.first() {
            Some(id) => id.as_str(),
            None => continue,
        };
        let item = match items.get(id) {
            Some(item) => item,
            None => {
                stats.skipped_ids.push(id.to_string());
                continue;
            }
        };
        let mut item = item.borrow_mut();
        for (cell, head) in cells.iter().zip(&header).skip(1) {
            if let Some((form, lang)) = head {
                let cell = escape_fragment(cell);
                if let Some(existing) = item.form_mut(form) {
                    existing.set_value(lang, &cell);
                } else if !cell.trim().is_empty() {
                    item.get_or_create_form(form).set_value(lang, &cell);
                } else {
                    continue;
                }
                stats.updated_cells += 1;
            }
        }
    }
    stats
}

/// Import a translation table against the live items of a tree (lookup
/// mode resolution, so empty items can receive text too).
pub fn parse_xls_itext(tree: &FormTree, text: &str, model: &ItextModel) -> BulkImportStats {
    apply_xls_itext(&resolve_items_by_id(tree), text, model)
}

/// Render items to the tabular format: `label` header plus one
/// `form_lang` column per bulk form and active language. Empty string
/// when no language is configured.
pub fn items_to_xls(items: &[ItextRef], model: &ItextModel) -> String {
    let languages = model.languages();
    if languages.is_empty() {
        return String::new();
    }
    let mut rows: Vec<Vec<String>> = Vec::with_capacity(items.len() + 1);

    let mut header = vec!["label".to_string()];
    for form in BULK_FORMS {
        for lang in languages {
            header.push(format!("{form}_{lang}"));
        }
    }
    rows.push(header);

    for item in items {
        let item = item.borrow();
        let mut row = vec![item.id.clone()];
        for form in BULK_FORMS {
            for lang in languages {
                // raw values, no fallback: the table mirrors what is
                // actually stored
                let cell = if item.has_form(form) {
                    item.get(form, lang).unwrap_or("")
                } else {
                    ""
                };
                row.push(cell.to_string());
            }
        }
        rows.push(row);
    }
    tab_delimit(&rows)
}

/// Export the non-empty live items of a tree in walk order.
pub fn generate_itext_xls(tree: &FormTree, model: &ItextModel) -> String {
    items_to_xls(&resolve_and_assign_ids(tree), model)
}

fn needs_quoting(value: &str) -> bool {
    value
        .chars()
        .any(|c| matches!(c, '\r' | '\n' | '\u{2028}' | '\u{2029}' | '"' | '\t'))
}

fn escape_cell(value: &str) -> String {
    if needs_quoting(value) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn tab_delimit(rows: &[Vec<String>]) -> String {
    rows.iter()
        .map(|row| {
            row.iter()
                .map(|cell| escape_cell(cell))
                .collect::<Vec<String>>()
                .join("\t")
        })
        .collect::<Vec<String>>()
        .join("\n")
}

/// Split tab-separated text into rows of cells, understanding quoted
/// cells with `""` escapes. Line separators are LF, CRLF, CR, or the
/// Unicode line/paragraph separators.
fn parse_tsv(text: &str) -> Vec<Vec<String>> {
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut cell = String::new();
    let mut at_cell_start = true;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if at_cell_start && c == '"' {
            loop {
                match chars.next() {
                    Some('"') => {
                        if chars.peek() == Some(&'"') {
                            chars.next();
                            cell.push('"');
                        } else {
                            break;
                        }
                    }
                    Some(other) => cell.push(other),
                    None => break,
                }
            }
            at_cell_start = false;
        } else if c == '\t' {
            row.push(std::mem::take(&mut cell));
            at_cell_start = true;
        } else if matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}') {
            if c == '\r' && chars.peek() == Some(&'\n') {
                chars.next();
            }
            row.push(std::mem::take(&mut cell));
            rows.push(std::mem::take(&mut row));
            at_cell_start = true;
        } else {
            cell.push(c);
            at_cell_start = false;
        }
    }
    if !cell.is_empty() || !row.is_empty() {
        row.push(cell);
        rows.push(row);
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::ItextSlot;
    use pretty_assertions::assert_eq;

    fn model_en_fr() -> ItextModel {
        let mut model = ItextModel::new();
        model.add_language("en");
        model.add_language("fr");
        model
    }

    #[test]
    fn test_parse_tsv_plain_and_quoted_cells() {
        let rows = parse_tsv("a\tb\n\"x\ty\"\t\"he said \"\"hi\"\"\"\nlast");
        assert_eq!(
            rows,
            vec![
                vec!["a".to_string(), "b".to_string()],
                vec!["x\ty".to_string(), "he said \"hi\"".to_string()],
                vec!["last".to_string()],
            ]
        );
    }

    #[test]
    fn test_tsv_escape_round_trip() {
        let cells = vec![vec![
            "plain".to_string(),
            "tab\there".to_string(),
            "line\nbreak".to_string(),
            "quote\"inside".to_string(),
        ]];
        let rows = parse_tsv(&tab_delimit(&cells));
        assert_eq!(rows, cells);
    }

    #[test]
    fn test_header_cell_parsing() {
        let model = model_en_fr();
        assert_eq!(
            parse_header_cell("default_en", &model),
            Some(("default".to_string(), "en".to_string()))
        );
        assert_eq!(
            parse_header_cell("audio-fr", &model),
            Some(("audio".to_string(), "fr".to_string()))
        );
        assert_eq!(parse_header_cell("default_de", &model), None);
        assert_eq!(parse_header_cell("hint_en", &model), None);
        assert_eq!(parse_header_cell("label", &model), None);
    }

    fn tree_with_items(model: &mut ItextModel) -> FormTree {
        let mut tree = FormTree::new("data");
        let q1 = tree.add_question(None, "q1");
        let q2 = tree.add_question(None, "q2");
        let label1 = model.create_item("", true, false);
        label1.borrow_mut().set(model, "default", "first");
        let label2 = model.create_item("", true, false);
        label2.borrow_mut().set(model, "default", "second");
        label2.borrow_mut().set_in("image", "en", "jr://file/q2.png");
        tree.mug_mut(q1).set_itext(ItextSlot::Label, Some(label1));
        tree.mug_mut(q2).set_itext(ItextSlot::Label, Some(label2));
        tree
    }

    #[test]
    fn test_generate_header_and_rows() {
        let mut model = model_en_fr();
        let tree = tree_with_items(&mut model);
        let text = generate_itext_xls(&tree, &model);
        let rows = parse_tsv(&text);
        assert_eq!(rows[0][0], "label");
        assert_eq!(rows[0][1], "default_en");
        assert_eq!(rows[0][2], "default_fr");
        assert_eq!(rows[0][3], "audio_en");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1][0], "q1-label");
        assert_eq!(rows[1][1], "first");
        // q2's image column, en
        let image_en = rows[0].iter().position(|h| h == "image_en").unwrap();
        assert_eq!(rows[2][image_en], "jr://file/q2.png");
    }

    #[test]
    fn test_import_overwrites_and_creates_non_blank_only() {
        let mut model = model_en_fr();
        let tree = tree_with_items(&mut model);
        let text = "label\tdefault_en\taudio_en\nq1-label\tchanged\t\nq2-label\tsecond\tjr://audio/q2.mp3";
        let stats = parse_xls_itext(&tree, text, &model);
        assert!(stats.skipped_ids.is_empty());

        let by_id = resolve_items_by_id(&tree);
        let q1 = by_id["q1-label"].borrow();
        assert_eq!(q1.get("default", "en"), Some("changed"));
        // blank audio cell did not create an audio form
        assert!(!q1.has_form("audio"));
        let q2 = by_id["q2-label"].borrow();
        assert_eq!(q2.get("audio", "en"), Some("jr://audio/q2.mp3"));
    }

    #[test]
    fn test_escape_fragment() {
        assert_eq!(escape_fragment("plain text"), "plain text");
        assert_eq!(escape_fragment("Tom & Jerry < 3"), "Tom &amp; Jerry &lt; 3");
        assert_eq!(escape_fragment("5 &amp; 6 &#233; &#x41;"), "5 &amp; 6 &#233; &#x41;");
        assert_eq!(
            escape_fragment(r#"see <output value="/data/q1" /> & more"#),
            r#"see <output value="/data/q1" /> &amp; more"#
        );
        assert_eq!(
            escape_fragment(r#"a <output ref="/data/q2"></output> b"#),
            r#"a <output ref="/data/q2"></output> b"#
        );
    }

    #[test]
    fn test_import_escapes_stray_markup_characters() {
        let mut model = model_en_fr();
        let tree = tree_with_items(&mut model);
        let text = "label\tdefault_en\nq1-label\tfish & chips < 5";
        parse_xls_itext(&tree, text, &model);

        let by_id = resolve_items_by_id(&tree);
        assert_eq!(
            by_id["q1-label"].borrow().get("default", "en"),
            Some("fish &amp; chips &lt; 5")
        );

        // the re-emitted block stays well formed
        let items = resolve_and_assign_ids(&tree);
        let xml = crate::xform::itext_block_to_string(&model, &items).unwrap();
        let mut reparsed = ItextModel::new();
        let parsed = crate::xform::parse_itext_block(&xml, &mut reparsed, &[]).unwrap();
        assert_eq!(
            parsed.get("q1-label").unwrap().borrow().get("default", "en"),
            Some("fish &amp; chips &lt; 5")
        );
    }

    #[test]
    fn test_import_keeps_output_markup_in_cells() {
        let mut model = model_en_fr();
        let tree = tree_with_items(&mut model);
        let text = "label\tdefault_en\nq1-label\t\"see <output value=\"\"/data/q2\"\" />\"";
        parse_xls_itext(&tree, text, &model);

        let by_id = resolve_items_by_id(&tree);
        assert_eq!(
            by_id["q1-label"].borrow().get("default", "en"),
            Some(r#"see <output value="/data/q2" />"#)
        );
    }

    #[test]
    fn test_import_collects_unknown_ids() {
        let mut model = model_en_fr();
        let tree = tree_with_items(&mut model);
        let text = "label\tdefault_en\nno-such-id\tvalue\nq1-label\tnew";
        let stats = parse_xls_itext(&tree, text, &model);
        assert_eq!(stats.skipped_ids, vec!["no-such-id".to_string()]);
        assert_eq!(stats.updated_cells, 1);
    }

    #[test]
    fn test_import_ignores_unrecognized_columns() {
        let mut model = model_en_fr();
        let tree = tree_with_items(&mut model);
        let text = "label\tmystery_en\tdefault_en\nq1-label\tjunk\tkept";
        parse_xls_itext(&tree, text, &model);
        let by_id = resolve_items_by_id(&tree);
        let q1 = by_id["q1-label"].borrow();
        assert_eq!(q1.get("default", "en"), Some("kept"));
        assert!(!q1.has_form("mystery"));
    }

    #[test]
    fn test_export_import_round_trip_is_stable() {
        let mut model = model_en_fr();
        let tree = tree_with_items(&mut model);
        let exported = generate_itext_xls(&tree, &model);
        let stats = parse_xls_itext(&tree, &exported, &model);
        assert!(stats.skipped_ids.is_empty());
        assert_eq!(generate_itext_xls(&tree, &model), exported);
    }

    #[test]
    fn test_export_without_languages_is_empty() {
        let model = ItextModel::new();
        let tree = FormTree::new("data");
        assert_eq!(generate_itext_xls(&tree, &model), "");
    }
}
