//! A single named variant ("form") of a translated string.
//!
//! Every Itext item holds one or more forms: `default` plain text, `long`
//! and `short` alternates, media references (`image`, `audio`, `video`),
//! or user-defined custom forms. A form maps language codes to raw values;
//! an empty value and a missing value are equivalent.

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use regex::Regex;

use super::ItextModel;

/// Matches literal `<output value="…"/>` or `<output ref="…">…</output>`
/// tags embedded in translation text. Only this fixed tag shape is
/// recognized; similar-looking text is never treated as an output tag.
pub(crate) static OUTPUT_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<output\s+(?:value|ref)="([^"]*)"\s*(?:/>|>\s*</output\s*>)"#).unwrap()
});

#[derive(Debug, Clone)]
pub struct ItextForm {
    pub name: String,
    data: BTreeMap<String, String>,
    /// Per-language output reference expressions, recomputed lazily and
    /// invalidated on every write.
    output_expressions: Option<HashMap<String, Vec<String>>>,
}

impl Default for ItextForm {
    fn default() -> Self {
        ItextForm::new("default")
    }
}

impl ItextForm {
    pub fn new(name: &str) -> Self {
        ItextForm {
            name: name.to_string(),
            data: BTreeMap::new(),
            output_expressions: None,
        }
    }

    /// Raw stored value for a language. No fallback; `Some("")` is
    /// possible and means the same thing as `None`.
    pub fn value(&self, lang: &str) -> Option<&str> {
        self.data.get(lang).map(|s| s.as_str())
    }

    pub fn set_value(&mut self, lang: &str, value: &str) {
        self.data.insert(lang.to_string(), value.to_string());
        self.output_expressions = None;
    }

    /// Languages with a stored (possibly empty) value, with the value.
    pub fn values(&self) -> impl Iterator<Item = (&str, &str)> {
        self.data.iter().map(|(l, v)| (l.as_str(), v.as_str()))
    }

    /// Best-effort value for a language: the language itself, then the
    /// model's default language, then any non-empty value, then `""`.
    /// Never fails.
    pub fn value_or_default(&self, model: &ItextModel, lang: &str) -> &str {
        if let Some(val) = self.data.get(lang).filter(|v| !v.is_empty()) {
            return val;
        }
        let default_lang = model.default_language();
        if lang != default_lang {
            if let Some(val) = self.data.get(default_lang).filter(|v| !v.is_empty()) {
                return val;
            }
        }
        for val in self.data.values() {
            if !val.is_empty() {
                return val;
            }
        }
        ""
    }

    pub fn is_empty(&self) -> bool {
        self.data.values().all(|v| v.is_empty())
    }

    /// Path expressions embedded in `<output>` tags, per language, in
    /// document order. The result is cached until the next `set_value`.
    pub fn output_ref_expressions(&mut self) -> &HashMap<String, Vec<String>> {
        if self.output_expressions.is_none() {
            self.output_expressions = Some(extract_output_refs(&self.data));
        }
        self.output_expressions
            .as_ref()
            .expect("output expression cache populated above")
    }
}

fn extract_output_refs(data: &BTreeMap<String, String>) -> HashMap<String, Vec<String>> {
    let mut refs = HashMap::new();
    for (lang, text) in data {
        if text.is_empty() {
            continue;
        }
        let exprs: Vec<String> = OUTPUT_TAG_RE
            .captures_iter(text)
            .map(|caps| caps[1].to_string())
            .collect();
        refs.insert(lang.clone(), exprs);
    }
    refs
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
    fn test_value_or_default_prefers_own_language() {
        let model = model_en_fr();
        let mut form = ItextForm::new("default");
        form.set_value("en", "hello");
        form.set_value("fr", "bonjour");
        assert_eq!(form.value_or_default(&model, "fr"), "bonjour");
    }

    #[test]
    fn test_value_or_default_falls_back_to_default_language() {
        let model = model_en_fr();
        let mut form = ItextForm::new("default");
        form.set_value("en", "hello");
        assert_eq!(form.value_or_default(&model, "fr"), "hello");
    }

    #[test]
    fn test_value_or_default_falls_back_to_any_nonempty() {
        let mut model = model_en_fr();
        model.add_language("es");
        let mut form = ItextForm::new("default");
        form.set_value("es", "hola");
        // default language (en) has no value either
        assert_eq!(form.value_or_default(&model, "fr"), "hola");
    }

    #[test]
    fn test_value_or_default_empty_form() {
        let model = model_en_fr();
        let mut form = ItextForm::new("default");
        form.set_value("en", "");
        assert_eq!(form.value_or_default(&model, "fr"), "");
    }

    #[test]
    fn test_is_empty_treats_blank_as_absent() {
        let mut form = ItextForm::new("default");
        assert!(form.is_empty());
        form.set_value("en", "");
        assert!(form.is_empty());
        form.set_value("en", "x");
        assert!(!form.is_empty());
    }

    #[test]
    fn test_output_ref_extraction() {
        let mut form = ItextForm::new("default");
        form.set_value(
            "en",
            r#"a <output value="/data/q1" /> b <output ref="/data/q2"></output> c"#,
        );
        let refs = form.output_ref_expressions();
        assert_eq!(refs["en"], vec!["/data/q1", "/data/q2"]);
    }

    #[test]
    fn test_output_ref_ignores_lookalike_text() {
        let mut form = ItextForm::new("default");
        form.set_value("en", "the output value=/data/q1 of <output> is not a tag");
        let refs = form.output_ref_expressions();
        assert!(refs["en"].is_empty());
    }

    #[test]
    fn test_output_ref_cache_invalidated_on_write() {
        let mut form = ItextForm::new("default");
        form.set_value("en", r#"<output value="/data/a" />"#);
        assert_eq!(form.output_ref_expressions()["en"], vec!["/data/a"]);
        form.set_value("en", r#"<output value="/data/b" />"#);
        assert_eq!(form.output_ref_expressions()["en"], vec!["/data/b"]);
    }
}
