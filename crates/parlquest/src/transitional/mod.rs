mod parser;

pub use parser::parse_transitional_question;
