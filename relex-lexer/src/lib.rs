mod alphabet;
mod codegen;
mod compile;
mod dfa;
mod nfa;

pub use alphabet::Alphabet;
pub use codegen::LexerCodeGen;
pub use compile::{compile_block, Action, CompileError, CompiledBlock, CondDfa, Rule};
pub use dfa::{undefined_control_flow, Fill, TableDfa, TableState, DEAD};
pub use nfa::build_nfa;
