pub mod reader;
pub mod writer;

pub use reader::{parse_itext_block, ParsedItext};
pub use writer::{itext_block_to_string, write_itext_block};
