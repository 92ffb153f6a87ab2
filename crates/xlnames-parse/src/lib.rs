pub mod parser;
pub mod reference;
pub mod tokenizer;

pub use parser::{ASTNode, ASTNodeType, Parser, ParserError, parse};
pub use reference::{
    CellRef, MAX_COLS, MAX_ROWS, Reference, ReferenceError, column_to_number, is_cell_reference,
    is_r1c1_reference, number_to_column, quote_sheet_name, sheet_needs_quotes,
};
pub use tokenizer::{Token, TokenSubType, TokenType, Tokenizer, TokenizerError};

pub use xlnames_common::{ErrorKind, Value};
