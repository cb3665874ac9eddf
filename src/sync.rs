//! Synchronization between the form tree and the translation model:
//! tree walks, derived item ids, id deduplication, and rewriting of
//! embedded `<output>` path references when a question is renamed.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::sync::LazyLock;

use regex::Regex;

use crate::model::{ItemKey, ItextModel, ItextRef, OUTPUT_TAG_RE};
use crate::tree::{FormTree, ItextSlot, MugId};

static INVALID_ID_CHAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w.\-]").unwrap());

/// Visit every itext item reachable from the tree exactly once, in tree
/// walk order. An item shared by several mugs is visited only at its
/// first occurrence, tracked by identity key, so the visit sees a stable
/// (mug, slot) attribution even if ids change mid-walk.
pub fn for_each_itext_item<F>(tree: &FormTree, mut visit: F)
where
    F: FnMut(&ItextRef, MugId, ItextSlot),
{
    let mut seen: HashSet<ItemKey> = HashSet::new();
    for mug_id in tree.walk_order() {
        for slot in ItextSlot::ALL {
            if let Some(item) = tree.mug(mug_id).itext(slot) {
                if seen.insert(item.borrow().key()) {
                    visit(item, mug_id, slot);
                }
            }
        }
    }
}

/// Derived id root for a mug: its rootless tree path, except for choices,
/// which have no path and instead chain the parent's root with their own
/// sanitized short name.
pub fn default_itext_root(tree: &FormTree, mug_id: MugId) -> String {
    let mug = tree.mug(mug_id);
    if mug.options().is_choice {
        let name = INVALID_ID_CHAR_RE.replace_all(mug.node_id(), "_");
        match mug.parent() {
            Some(parent) => format!("{}-{}", default_itext_root(tree, parent), name),
            None => name.into_owned(),
        }
    } else {
        tree.path_no_root(mug_id)
            .unwrap_or_else(|| mug.node_id().to_string())
    }
}

/// Derived item id for one slot of a mug, e.g. `question1-label`.
pub fn default_itext_id(tree: &FormTree, mug_id: MugId, slot: ItextSlot) -> String {
    format!("{}-{}", default_itext_root(tree, mug_id), slot.suffix())
}

/// Deduplicate the live items and assign each its final serialized id.
///
/// Items marked `auto_id` (or with no id at all) get their id derived
/// from the referencing mug's path; literal ids are kept. Collisions
/// between distinct non-empty items resolve by numeric suffixing in walk
/// order (`id`, `id2`, `id3`, ...); a collision with the same item or
/// with an empty item drops the later entry as already merged.
///
/// This pass is NOT read-only: resolved ids are written back onto the
/// items. Callers needing an untouched model must copy first.
fn resolve_items(tree: &FormTree, include_empty: bool) -> (Vec<ItextRef>, HashMap<String, ItextRef>) {
    let mut ordered: Vec<ItextRef> = Vec::new();
    let mut by_id: HashMap<String, ItextRef> = HashMap::new();
    for_each_itext_item(tree, |item, mug_id, slot| {
        let item_is_empty = item.borrow().is_empty();
        if item_is_empty && !include_empty {
            return;
        }
        let candidate = {
            let item = item.borrow();
            if item.auto_id || item.id.is_empty() {
                default_itext_id(tree, mug_id, slot)
            } else {
                item.id.clone()
            }
        };
        if let Some(holder) = by_id.get(&candidate) {
            if item_is_empty || Rc::ptr_eq(holder, item) || holder.borrow().is_empty() {
                return;
            }
        }
        let mut id = candidate.clone();
        let mut count = 2;
        while by_id.contains_key(&id) {
            id = format!("{candidate}{count}");
            count += 1;
        }
        item.borrow_mut().id = id.clone();
        by_id.insert(id, Rc::clone(item));
        ordered.push(Rc::clone(item));
    });
    (ordered, by_id)
}

/// Export mode: the non-empty live items in walk order, each with its
/// final id assigned (mutating, see [`resolve_items`]).
pub fn resolve_and_assign_ids(tree: &FormTree) -> Vec<ItextRef> {
    resolve_items(tree, false).0
}

/// Lookup mode: every live item, empties included, keyed by final id
/// (mutating, see [`resolve_items`]). Used by the bulk importer.
pub fn resolve_items_by_id(tree: &FormTree) -> HashMap<String, ItextRef> {
    resolve_items(tree, true).1
}

/// The literal inline markup embedding a path reference in translation
/// text.
pub fn output_ref(path: &str) -> String {
    format!(r#"<output value="{path}" />"#)
}

/// Rewrite every embedded `<output>` reference from `old_path` to
/// `new_path` across all live items, forms, and languages. The old path
/// matches only as a whole path segment, so `/data/q1` does not touch a
/// reference to `/data/q1foo` or `/data/q1/child`. For special groups
/// the path is instead matched as a prefix (children's references begin
/// with it). Text outside output tags is never modified.
pub fn handle_mug_rename(
    tree: &FormTree,
    model: &ItextModel,
    old_path: &str,
    new_path: &str,
    special_group: bool,
) {
    let pattern = if special_group {
        format!(r"{}(/)", regex::escape(old_path))
    } else {
        format!(r"{}([^\w/\-]|$)", regex::escape(old_path))
    };
    let path_re = Regex::new(&pattern).expect("escaped path forms a valid pattern");
    let languages: Vec<String> = model.languages().to_vec();
    for_each_itext_item(tree, |item, _, _| {
        let mut item = item.borrow_mut();
        for form in item.forms_mut() {
            for lang in &languages {
                let rewritten = form
                    .value(lang)
                    .and_then(|value| rewrite_output_paths(value, &path_re, new_path));
                if let Some(rewritten) = rewritten {
                    form.set_value(lang, &rewritten);
                }
            }
        }
    });
}

/// Apply the path rewrite inside each output tag's expression, leaving
/// all surrounding text byte-for-byte intact. `None` when nothing
/// matched.
fn rewrite_output_paths(value: &str, path_re: &Regex, new_path: &str) -> Option<String> {
    let mut out = String::with_capacity(value.len());
    let mut last = 0;
    let mut changed = false;
    for caps in OUTPUT_TAG_RE.captures_iter(value) {
        let expr = match caps.get(1) {
            Some(expr) => expr,
            None => continue,
        };
        let rewritten = path_re.replace_all(expr.as_str(), |c: &regex::Captures| {
            format!("{}{}", new_path, c.get(1).map_or("", |m| m.as_str()))
        });
        if rewritten != expr.as_str() {
            changed = true;
        }
        out.push_str(&value[last..expr.start()]);
        out.push_str(&rewritten);
        last = expr.end();
    }
    if !changed {
        return None;
    }
    out.push_str(&value[last..]);
    Some(out)
}
