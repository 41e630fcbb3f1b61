use relex_codegen::OutputFile;

use crate::compile::CompiledBlock;

/// Target-language seam: walks a compiled block's automata and writes
/// fragments into the output file.
pub trait LexerCodeGen {
    fn generate_block(&self, block: &CompiledBlock, out: &mut OutputFile);
}
