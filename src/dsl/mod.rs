//! DSL (Domain Specific Language) parser for power-tree netlists.
//!
//! This module provides a line-oriented, human-editable text format for
//! describing a power tree: sources, converters, switches, losses and loads,
//! plus load phases, interpolation tables and operating limits.
//!
//! # Grammar Overview
//!
//! ```text
//! netlist     = { line }
//! line        = comment | directive | component | empty
//! comment     = ('#' | ';') { any_char }
//! directive   = '.' directive_name { argument }
//! component   = KIND name { key '=' value }
//!
//! KIND        = "SOURCE" | "PLOAD" | "ILOAD" | "RLOAD" | "RLOSS" | "VLOSS"
//!             | "CONVERTER" | "LINREG" | "PSWITCH" | "PMUX" | "RECTIFIER"
//! key         = "parent" | "rail" | "group" | parameter
//! value       = number [unit_suffix] | identifier
//! list        = '(' { number } ')'
//!
//! number      = ['-'] digit+ ['.' digit+] [('e'|'E') ['-'|'+'] digit+]
//! unit_suffix = 'p' | 'n' | 'u' | 'm' | 'k' | 'M' | 'G'
//! ```
//!
//! # Directives
//!
//! | Directive | Description | Syntax |
//! |-----------|-------------|--------|
//! | .system | System name | `.system <name>` |
//! | .phases | Load phases and durations (s) | `.phases <name>=<t> ...` |
//! | .table | Interpolation table | `.table <name> vi=(..) io=(..) data=(..)` |
//! | .active | Phases a component is on in | `.active <comp> <phase> ...` |
//! | .phase | Phase-specific load values | `.phase <comp> <phase>=<value> ...` |
//! | .limits | Operating limits | `.limits <comp> <metric>=(<min> <max>) ...` |
//!
//! A parameter given as an identifier refers to a `.table`. The `parent`
//! key names a component or a rail and is repeated for a PMUX.
//!
//! # Example
//!
//! ```text
//! .system sensor
//! .phases run=10 sleep=590
//!
//! SOURCE    BAT  vo=3.7 rs=0.1 rail=VBAT
//! CONVERTER BUCK parent=VBAT vo=1.8 eff=0.88 iq=12u rail=1V8
//! PLOAD     MCU  parent=1V8 pwr=30m
//! .phase MCU run=30m sleep=20u
//! ```

mod ast;
mod lexer;
mod parser;

pub use ast::*;
pub use lexer::{parse_value, Lexer, Token, TokenKind};
pub use parser::Parser;

use crate::error::Result;

/// Parse a netlist DSL string into an AST.
pub fn parse(input: &str) -> Result<NetlistAst> {
    let lexer = Lexer::new(input);
    let mut parser = Parser::new(lexer);
    parser.parse()
}

/// Parse a netlist DSL file.
#[cfg(feature = "cli")]
pub fn parse_file(path: &std::path::Path) -> Result<NetlistAst> {
    let content =
        std::fs::read_to_string(path).map_err(|e| crate::error::PowerTreeError::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;
    parse(&content)
}
