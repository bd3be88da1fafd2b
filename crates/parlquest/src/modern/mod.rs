mod parser;

pub use parser::parse_modern_question;
