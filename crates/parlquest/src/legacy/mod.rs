pub mod labels;
mod parser;

pub use parser::parse_legacy_question;
