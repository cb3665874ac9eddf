//! Container for the active language list and the item factory.

use std::cell::RefCell;
use std::rc::Rc;

use super::{ItemKey, ItextItem, ItextRef};
use crate::tree::{ItextSlot, Mug, Presence};

/// Languages plus the counter that mints process-unique item keys.
///
/// The language list keeps declaration order. The default language is
/// designated separately and falls back to the first language when
/// unset or removed; it always names a member of the list.
#[derive(Debug, Default)]
pub struct ItextModel {
    languages: Vec<String>,
    default_language: Option<String>,
    next_key: u64,
}

impl ItextModel {
    pub fn new() -> Self {
        ItextModel::default()
    }

    pub fn languages(&self) -> &[String] {
        &self.languages
    }

    pub fn has_language(&self, lang: &str) -> bool {
        self.languages.iter().any(|l| l == lang)
    }

    /// Add a language to the active set; duplicates are ignored.
    pub fn add_language(&mut self, lang: &str) {
        if !self.has_language(lang) {
            self.languages.push(lang.to_string());
        }
    }

    /// Remove a language. Removing the current default clears the
    /// designation, so the default falls back to the first remaining
    /// language.
    pub fn remove_language(&mut self, lang: &str) {
        self.languages.retain(|l| l != lang);
        if self.default_language.as_deref() == Some(lang) {
            self.default_language = None;
        }
    }

    /// The fallback language used when a specific one has no value:
    /// the designated default, else the first language, else `""` when
    /// no language is configured yet.
    pub fn default_language(&self) -> &str {
        self.default_language
            .as_deref()
            .or_else(|| self.languages.first().map(String::as_str))
            .unwrap_or("")
    }

    /// Designate `lang` as the default. The language list keeps its
    /// declaration order. No-op when the language is not in the list.
    pub fn set_default_language(&mut self, lang: &str) {
        if self.has_language(lang) {
            self.default_language = Some(lang.to_string());
        }
    }

    pub(crate) fn next_key(&mut self) -> ItemKey {
        self.next_key += 1;
        ItemKey(self.next_key)
    }

    /// Mint a new item with a fresh key and a ref count of 1.
    pub fn create_item(&mut self, id: &str, auto_id: bool, has_markdown: bool) -> ItextRef {
        let key = self.next_key();
        Rc::new(RefCell::new(ItextItem::new(key, id, auto_id, has_markdown)))
    }

    /// Ensure a field has every itext slot its kind calls for. Label gets
    /// seeded with the field's default label text; hint, help and
    /// constraint message start empty. Idempotent: occupied slots and
    /// disallowed slots are left alone. Created items carry no literal id
    /// and pick one up from the field's path at serialization time.
    pub fn update_for_mug(&mut self, mug: &mut Mug, default_label_value: &str) {
        if !mug.options().is_data_only {
            if mug.itext(ItextSlot::Label).is_none()
                && mug.presence(ItextSlot::Label) != Presence::NotAllowed
            {
                let item = self.create_item("", true, false);
                item.borrow_mut().set(self, "default", default_label_value);
                mug.set_itext(ItextSlot::Label, Some(item));
            }
            for slot in [ItextSlot::Hint, ItextSlot::Help] {
                if mug.itext(slot).is_none() && mug.presence(slot) != Presence::NotAllowed {
                    let item = self.create_item("", true, false);
                    mug.set_itext(slot, Some(item));
                }
            }
        }
        if !mug.options().is_control_only
            && mug.itext(ItextSlot::ConstraintMsg).is_none()
            && mug.presence(ItextSlot::ConstraintMsg) != Presence::NotAllowed
        {
            let item = self.create_item("", true, false);
            mug.set_itext(ItextSlot::ConstraintMsg, Some(item));
        }
    }
}
