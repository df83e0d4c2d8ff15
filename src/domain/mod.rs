pub mod lead;
pub mod prompt;
pub mod response_parser;
pub mod search_query;
