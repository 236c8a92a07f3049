//! DSL (Domain Specific Language) parser for circuit descriptions.
//!
//! A SPICE-inspired, line-oriented netlist language for switched power
//! circuits.
//!
//! # Grammar Overview
//!
//! ```text
//! circuit     = { line }
//! line        = comment | directive | component | empty
//! comment     = ('#' | ';' | '*' at line start) { any_char }
//! directive   = '.' directive_name { argument }
//! component   = (prefix_name | keyword name) node+ { value | keyword | model_ref | param }
//! param       = identifier '=' value
//!
//! directive_name = "model" | "tran" | "probe" | "end"
//! value       = number [unit_suffix]
//! unit_suffix = 'f' | 'p' | 'n' | 'u' | 'm' | 'k' | 'M' | "meg" | 'G'
//! ```
//!
//! # Component Types
//!
//! | Type | Description | Syntax |
//! |------|-------------|--------|
//! | R | Resistor | `R<name> <n+> <n-> <value>` |
//! | C | Capacitor | `C<name> <n+> <n-> <value> [ic=<v0>]` |
//! | L | Inductor | `L<name> <n+> <n-> <value> [ic=<i0>]` |
//! | V | Voltage source | `V<name> <n+> <n-> [DC] <v>` or `AC <amp> <freq> [phase]` |
//! | I | Current source | `I<name> <n+> <n-> [DC] <i>` or `AC <amp> <freq> [phase]` |
//! | E | VCVS | `E<name> <n+> <n-> <c+> <c-> <gain>` |
//! | D | Diode | `D<name> <anode> <cathode> [model] [ron= roff= vf=]` |
//! | S | Ideal switch | `S<name> <n1> <n2> [model] [gate]` |
//! | M | MOSFET | `M<name> <drain> <source> [model] [gate]` |
//! | IGBT | IGBT | `IGBT <name> <collector> <emitter> [model] [gate]` |
//! | THY | Thyristor | `THY <name> <anode> <cathode> [model] [gate]` |
//! | K | Coupling | `K<name> <L1> <L2> <k>` |
//!
//! A gate is either `gate=<level>` or a pulse train
//! `freq=<Hz> [duty=<0..1>] [delay=<s>]`.
//!
//! # Directives
//!
//! | Directive | Description | Syntax |
//! |-----------|-------------|--------|
//! | .model | Switch/diode parameters | `.model <name> <D|S|MOSFET|IGBT|THY> (<params>)` |
//! | .tran | Step width and duration | `.tran <dt> <duration> [be|trz|gs]` |
//! | .probe | Logged signals | `.probe <node>... I(<element>)...` |
//! | .end | Ignore the rest of the file | `.end` |
//!
//! # Example
//!
//! ```text
//! * RC charging
//! .tran 1u 5m be
//! .probe out
//!
//! V1 in  0   DC 10
//! R1 in  out 1k
//! C1 out 0   1u
//! ```

mod ast;
mod lexer;
mod parser;

pub use ast::*;
pub use lexer::{parse_value, Lexer, Token, TokenKind};
pub use parser::Parser;

use std::path::Path;

use crate::error::{Result, SimError};

/// Parse a circuit DSL string into an AST.
pub fn parse(input: &str) -> Result<CircuitAst> {
    let lexer = Lexer::new(input);
    let mut parser = Parser::new(lexer)?;
    parser.parse()
}

/// Parse a circuit DSL file.
pub fn parse_file(path: &Path) -> Result<CircuitAst> {
    let content = std::fs::read_to_string(path).map_err(|e| SimError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    parse(&content)
}
