mod dispatch;
mod emit;

use relex_codegen::OutputFile;
use relex_lexer::{CompiledBlock, LexerCodeGen};

pub use dispatch::{select_dispatch, Dispatch, TreeNode};

/// C back-end: emits a goto-based matcher driven by the host-program macro
/// contract (`YYPEEK`, `YYSKIP`, `YYFILL`, ...).
pub struct CLexerCodeGen;

impl CLexerCodeGen {
    pub fn new() -> Self {
        CLexerCodeGen
    }
}

impl Default for CLexerCodeGen {
    fn default() -> Self {
        Self::new()
    }
}

impl LexerCodeGen for CLexerCodeGen {
    fn generate_block(&self, block: &CompiledBlock, out: &mut OutputFile) {
        emit::emit_block(block, out);
    }
}
