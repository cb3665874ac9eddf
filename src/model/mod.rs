mod form;
mod item;
mod itext_model;

pub use form::ItextForm;
pub(crate) use form::OUTPUT_TAG_RE;
pub use item::{looks_like_markdown, ItemKey, ItextItem, ItextRef};
pub use itext_model::ItextModel;
