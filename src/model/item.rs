//! A named bundle of translated strings, potentially shared by several
//! form fields.
//!
//! Two identities live on every item. `id` is the persisted resource name
//! written to the `<itext>` block; it is mutable, may be regenerated from
//! the owning field's path (`auto_id`), and may transiently collide with
//! other items until deduplication runs. `key` is an opaque in-process
//! identity minted by the owning model and never reused; tree walks use it
//! to visit a shared item exactly once even when `id` changes mid-walk.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::LazyLock;

use regex::Regex;

use super::{ItextForm, ItextModel};

/// Shared handle to an item. Items are referenced from multiple field
/// slots; the editing model is single-threaded.
pub type ItextRef = Rc<RefCell<ItextItem>>;

/// Process-unique item identity, distinct from the persisted `id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemKey(pub(crate) u64);

#[derive(Debug, Clone)]
pub struct ItextItem {
    /// Persisted resource id, e.g. `question1-label`.
    pub id: String,
    /// When set, `id` is regenerated from the referencing field's tree
    /// path instead of being kept literal.
    pub auto_id: bool,
    pub has_markdown: bool,
    /// Number of distinct (field, property) slots pointing at this item.
    pub ref_count: usize,
    key: ItemKey,
    forms: Vec<ItextForm>,
}

impl ItextItem {
    pub(crate) fn new(key: ItemKey, id: &str, auto_id: bool, has_markdown: bool) -> Self {
        ItextItem {
            id: id.to_string(),
            auto_id,
            has_markdown,
            ref_count: 1,
            key,
            forms: vec![ItextForm::default()],
        }
    }

    pub fn key(&self) -> ItemKey {
        self.key
    }

    pub fn forms(&self) -> &[ItextForm] {
        &self.forms
    }

    pub fn forms_mut(&mut self) -> &mut [ItextForm] {
        &mut self.forms
    }

    pub fn form_names(&self) -> Vec<&str> {
        self.forms.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn has_form(&self, name: &str) -> bool {
        self.forms.iter().any(|f| f.name == name)
    }

    pub fn form(&self, name: &str) -> Option<&ItextForm> {
        self.forms.iter().find(|f| f.name == name)
    }

    pub fn form_mut(&mut self, name: &str) -> Option<&mut ItextForm> {
        self.forms.iter_mut().find(|f| f.name == name)
    }

    /// Append a new empty form, unless one of that name already exists.
    /// Returns the new form, or `None` when the name was taken.
    pub fn add_form(&mut self, name: &str) -> Option<&mut ItextForm> {
        if self.has_form(name) {
            return None;
        }
        self.forms.push(ItextForm::new(name));
        self.forms.last_mut()
    }

    pub fn get_or_create_form(&mut self, name: &str) -> &mut ItextForm {
        if !self.has_form(name) {
            self.forms.push(ItextForm::new(name));
        }
        let index = self
            .forms
            .iter()
            .position(|f| f.name == name)
            .expect("form exists or was just appended");
        &mut self.forms[index]
    }

    pub fn remove_form(&mut self, name: &str) {
        self.forms.retain(|f| f.name != name);
    }

    /// Deep-copy one form's values into a newly appended form under a
    /// different name (e.g. materialize a custom form from `long`). The
    /// source form is created empty if absent; no-op when the target
    /// name is already taken.
    pub fn clone_form(&mut self, clone_from: &str, clone_to: &str) {
        if self.has_form(clone_to) {
            return;
        }
        let mut copy = self.get_or_create_form(clone_from).clone();
        copy.name = clone_to.to_string();
        self.forms.push(copy);
    }

    /// Raw value for (form, language); no fallback.
    pub fn get(&self, form: &str, lang: &str) -> Option<&str> {
        self.form(form).and_then(|f| f.value(lang))
    }

    /// Value of the default form in the model's default language.
    pub fn default_value<'a>(&'a self, model: &ItextModel) -> Option<&'a str> {
        self.get("default", model.default_language())
    }

    /// Set a form's value in the model's default language, propagating to
    /// every other active language whose current value is empty or equal
    /// to the previous default value. Languages that were manually
    /// diverged keep their text; this keeps translations in sync until a
    /// translator takes over.
    pub fn set(&mut self, model: &ItextModel, form_name: &str, value: &str) {
        let default_lang = model.default_language().to_string();
        let languages: Vec<String> = model.languages().to_vec();
        let form = self.get_or_create_form(form_name);
        let old_default = form
            .value(&default_lang)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        form.set_value(&default_lang, value);
        for lang in &languages {
            let diverged = match form.value(lang).filter(|v| !v.is_empty()) {
                Some(old) => Some(old) != old_default.as_deref(),
                None => false,
            };
            if !diverged {
                form.set_value(lang, value);
            }
        }
    }

    /// Set the value for a single (form, language) pair, creating the
    /// form if needed. Never touches other languages.
    pub fn set_in(&mut self, form_name: &str, lang: &str, value: &str) {
        self.get_or_create_form(form_name).set_value(lang, value);
    }

    pub fn is_empty(&self) -> bool {
        self.forms.iter().all(|f| f.is_empty())
    }

    /// Whether the item carries a text form a person could read, as
    /// opposed to media-only content.
    pub fn has_human_readable_itext(&self) -> bool {
        ["default", "long", "short"].iter().any(|f| self.has_form(f))
    }

    /// Clone with a fresh identity key, independently owned form data,
    /// and `ref_count` reset to 1 (the clone itself is a single new
    /// reference; the caller registers it wherever needed).
    pub fn deep_clone(&self, model: &mut ItextModel) -> ItextRef {
        Rc::new(RefCell::new(ItextItem {
            id: self.id.clone(),
            auto_id: self.auto_id,
            has_markdown: self.has_markdown,
            ref_count: 1,
            key: model.next_key(),
            forms: self.forms.clone(),
        }))
    }
}

static MARKDOWN_RE: LazyLock<Regex> = LazyLock::new(|| {
    // ordered lists, unordered lists, strikethrough, headings,
    // italics/bold, links
    Regex::new(r"(?m)^\d+[.)] |^\* |~~.+~~|# |\*{1,3}\S.*\*{1,3}|\[.+\]\(\S+\)").unwrap()
});

static MARKDOWN_TABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(\|[^\n]+\|\r?\n)((?:\|\s*:?-+:?\s*)+\|)(\n(?:\|[^\n]+\|\r?\n?)*)?$")
        .unwrap()
});

/// Heuristic check used to decide whether imported text should flip an
/// item's `has_markdown` flag.
pub fn looks_like_markdown(val: &str, support_tables: bool) -> bool {
    MARKDOWN_RE.is_match(val) || (support_tables && MARKDOWN_TABLE_RE.is_match(val))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model_en_fr() -> ItextModel {
        let mut model = ItextModel::new();
        model.add_language("en");
        model.add_language("fr");
        model
    }

    #[test]
    fn test_add_form_rejects_duplicate_names() {
        let mut model = ItextModel::new();
        let item = model.create_item("q1-label", false, false);
        let mut item = item.borrow_mut();
        assert!(item.add_form("long").is_some());
        assert!(item.add_form("long").is_none());
        assert_eq!(item.form_names(), vec!["default", "long"]);
    }

    #[test]
    fn test_remove_form() {
        let mut model = ItextModel::new();
        let item = model.create_item("q1-label", false, false);
        let mut item = item.borrow_mut();
        item.add_form("short");
        item.remove_form("short");
        assert!(!item.has_form("short"));
        // removing a missing form is a no-op
        item.remove_form("short");
    }

    #[test]
    fn test_clone_form_copies_values() {
        let mut model = model_en_fr();
        let item = model.create_item("q1-label", false, false);
        let mut item = item.borrow_mut();
        item.set_in("long", "en", "the long text");
        item.clone_form("long", "custom-x");
        assert_eq!(item.get("custom-x", "en"), Some("the long text"));
        // diverging the copy leaves the source alone
        item.set_in("custom-x", "en", "changed");
        assert_eq!(item.get("long", "en"), Some("the long text"));
    }

    #[test]
    fn test_clone_form_missing_source_creates_empty() {
        let mut model = model_en_fr();
        let item = model.create_item("q1-label", false, false);
        let mut item = item.borrow_mut();
        item.clone_form("long", "custom-x");
        assert!(item.has_form("long"));
        assert!(item.has_form("custom-x"));
        assert!(item.form("custom-x").map_or(false, |f| f.is_empty()));
    }

    #[test]
    fn test_set_cascades_to_empty_languages() {
        let mut model = model_en_fr();
        let item = model.create_item("q1-label", false, false);
        let mut item = item.borrow_mut();
        item.set(&model, "default", "A");
        assert_eq!(item.get("default", "en"), Some("A"));
        assert_eq!(item.get("default", "fr"), Some("A"));
    }

    #[test]
    fn test_set_cascades_to_languages_matching_old_default() {
        let mut model = model_en_fr();
        let item = model.create_item("q1-label", false, false);
        let mut item = item.borrow_mut();
        item.set(&model, "default", "A");
        item.set(&model, "default", "B");
        // fr tracked the default through both writes
        assert_eq!(item.get("default", "fr"), Some("B"));
    }

    #[test]
    fn test_set_preserves_diverged_language() {
        let mut model = model_en_fr();
        let item = model.create_item("q1-label", false, false);
        let mut item = item.borrow_mut();
        item.set(&model, "default", "A");
        item.set_in("default", "fr", "X");
        item.set(&model, "default", "B");
        assert_eq!(item.get("default", "en"), Some("B"));
        assert_eq!(item.get("default", "fr"), Some("X"));
    }

    #[test]
    fn test_set_with_explicit_language_is_surgical() {
        let mut model = model_en_fr();
        let item = model.create_item("q1-label", false, false);
        let mut item = item.borrow_mut();
        item.set_in("default", "fr", "bonjour");
        assert_eq!(item.get("default", "en"), None);
        assert_eq!(item.get("default", "fr"), Some("bonjour"));
    }

    #[test]
    fn test_has_human_readable_itext() {
        let mut model = model_en_fr();
        let item = model.create_item("q1-label", false, false);
        let mut item = item.borrow_mut();
        assert!(item.has_human_readable_itext());
        item.remove_form("default");
        item.add_form("audio");
        assert!(!item.has_human_readable_itext());
        item.add_form("short");
        assert!(item.has_human_readable_itext());
    }

    #[test]
    fn test_deep_clone_is_independent() {
        let mut model = model_en_fr();
        let item = model.create_item("q1-label", false, true);
        item.borrow_mut().set(&model, "default", "A");
        item.borrow_mut().ref_count = 2;

        let clone = item.borrow().deep_clone(&mut model);
        assert_eq!(clone.borrow().id, "q1-label");
        assert!(clone.borrow().has_markdown);
        assert_eq!(clone.borrow().ref_count, 1);
        assert_ne!(clone.borrow().key(), item.borrow().key());

        clone.borrow_mut().set_in("default", "en", "B");
        assert_eq!(item.borrow().get("default", "en"), Some("A"));
        // and the original's count was not disturbed
        assert_eq!(item.borrow().ref_count, 2);
    }

    #[test]
    fn test_is_empty() {
        let mut model = model_en_fr();
        let item = model.create_item("q1-label", false, false);
        assert!(item.borrow().is_empty());
        item.borrow_mut().set_in("default", "en", "x");
        assert!(!item.borrow().is_empty());
    }

    #[test]
    fn test_looks_like_markdown() {
        assert!(looks_like_markdown("# heading", false));
        assert!(looks_like_markdown("* bullet", false));
        assert!(looks_like_markdown("1. ordered", false));
        assert!(looks_like_markdown("[link](http://x)", false));
        assert!(!looks_like_markdown("plain text", false));
        assert!(looks_like_markdown("|a|b|\n|-|-|", true));
        assert!(!looks_like_markdown("|a|b|\n|-|-|", false));
    }
}
