//! Parser for the power-tree DSL.

use std::collections::HashMap;

use super::ast::*;
use super::lexer::{parse_value, Lexer, Token, TokenKind};
use crate::components::{InterpTable, Metric, PhaseConfig};
use crate::error::{PowerTreeError, Result};

/// Parser for netlist DSL.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
}

impl<'a> Parser<'a> {
    /// Create a new parser with the given lexer.
    pub fn new(lexer: Lexer<'a>) -> Self {
        Self {
            lexer,
            current: Token {
                kind: TokenKind::Newline,
                text: String::new(),
                line: 1,
                column: 1,
            },
        }
    }

    /// Parse the entire netlist.
    pub fn parse(&mut self) -> Result<NetlistAst> {
        let mut ast = NetlistAst::new();
        self.advance()?;

        while self.current.kind != TokenKind::Eof {
            match &self.current.kind {
                TokenKind::Newline => {
                    self.advance()?;
                    continue;
                }
                TokenKind::Directive => self.parse_directive(&mut ast)?,
                TokenKind::Identifier => {
                    let component = self.parse_component()?;
                    ast.components.push(component);
                }
                _ => {
                    return Err(PowerTreeError::parse(
                        self.current.line,
                        format!("unexpected token: {:?}", self.current.text),
                    ));
                }
            }
            self.end_of_line()?;
        }

        Ok(ast)
    }

    fn advance(&mut self) -> Result<()> {
        self.current = self.lexer.next_token()?;
        Ok(())
    }

    fn at_line_end(&self) -> bool {
        matches!(self.current.kind, TokenKind::Newline | TokenKind::Eof)
    }

    fn end_of_line(&mut self) -> Result<()> {
        match self.current.kind {
            TokenKind::Newline => self.advance(),
            TokenKind::Eof => Ok(()),
            _ => Err(PowerTreeError::parse(
                self.current.line,
                format!("unexpected token at end of line: {:?}", self.current.text),
            )),
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token> {
        if self.current.kind == kind {
            let tok = self.current.clone();
            self.advance()?;
            Ok(tok)
        } else {
            Err(PowerTreeError::parse(
                self.current.line,
                format!("expected {:?}, got {:?}", kind, self.current.kind),
            ))
        }
    }

    /// A name: identifiers, and numbers used as names (`.phases 1=10`).
    fn expect_name(&mut self) -> Result<String> {
        match self.current.kind {
            TokenKind::Identifier | TokenKind::Number => {
                let text = self.current.text.clone();
                self.advance()?;
                Ok(text)
            }
            _ => Err(PowerTreeError::parse(
                self.current.line,
                format!("expected name, got {:?}", self.current.kind),
            )),
        }
    }

    fn expect_number(&mut self) -> Result<f64> {
        let tok = self.expect(TokenKind::Number)?;
        parse_value(&tok.text)
            .ok_or_else(|| PowerTreeError::parse(tok.line, format!("invalid number: {}", tok.text)))
    }

    /// `( number* )`
    fn parse_list(&mut self) -> Result<Vec<f64>> {
        self.expect(TokenKind::OpenParen)?;
        let mut values = Vec::new();
        while self.current.kind != TokenKind::CloseParen {
            if self.at_line_end() {
                return Err(PowerTreeError::parse(self.current.line, "unterminated list"));
            }
            values.push(self.expect_number()?);
        }
        self.advance()?;
        Ok(values)
    }

    fn parse_directive(&mut self, ast: &mut NetlistAst) -> Result<()> {
        let directive = self.current.text.clone();
        let line = self.current.line;
        self.advance()?;

        match directive.to_lowercase().as_str() {
            ".system" => {
                ast.name = Some(self.expect_name()?);
            }
            ".phases" => {
                while !self.at_line_end() {
                    let name = self.expect_name()?;
                    self.expect(TokenKind::Equals)?;
                    let duration = self.expect_number()?;
                    ast.phases.push((name, duration));
                }
            }
            ".table" => {
                let name = self.expect_name()?;
                if ast.tables.contains_key(&name) {
                    return Err(PowerTreeError::DuplicateName { name });
                }
                let table = self.parse_table(&name, line)?;
                ast.tables.insert(name, table);
            }
            ".active" => {
                let component = self.expect_name()?;
                let mut phases = Vec::new();
                while !self.at_line_end() {
                    phases.push(self.expect_name()?);
                }
                ast.phase_configs.push(PhaseDef {
                    component,
                    config: PhaseConfig::Active(phases),
                    line,
                });
            }
            ".phase" => {
                let component = self.expect_name()?;
                let mut values = HashMap::new();
                while !self.at_line_end() {
                    let phase = self.expect_name()?;
                    self.expect(TokenKind::Equals)?;
                    values.insert(phase, self.expect_number()?);
                }
                ast.phase_configs.push(PhaseDef {
                    component,
                    config: PhaseConfig::Values(values),
                    line,
                });
            }
            ".limits" => {
                let component = self.expect_name()?;
                let mut ranges = Vec::new();
                while !self.at_line_end() {
                    let key = self.expect_name()?;
                    let metric = Metric::from_name(&key).ok_or_else(|| {
                        PowerTreeError::parse(line, format!("unknown limit metric: {}", key))
                    })?;
                    self.expect(TokenKind::Equals)?;
                    let pair = self.parse_list()?;
                    if pair.len() != 2 {
                        return Err(PowerTreeError::InvalidLimits {
                            component,
                            metric: key,
                            message: format!("expected (min max), got {} values", pair.len()),
                        });
                    }
                    ranges.push((metric, pair[0], pair[1]));
                }
                ast.limits.push(LimitDef {
                    component,
                    ranges,
                    line,
                });
            }
            _ => {
                return Err(PowerTreeError::parse(
                    line,
                    format!("unknown directive: {}", directive),
                ));
            }
        }

        Ok(())
    }

    /// `vi=(...) io=(...) data=(...)`, data row-major with one row per vi.
    fn parse_table(&mut self, name: &str, line: usize) -> Result<InterpTable> {
        let mut vi = None;
        let mut io = None;
        let mut data = None;
        while !self.at_line_end() {
            let key = self.expect(TokenKind::Identifier)?.text;
            self.expect(TokenKind::Equals)?;
            let values = self.parse_list()?;
            match key.to_lowercase().as_str() {
                "vi" => vi = Some(values),
                "io" => io = Some(values),
                "data" => data = Some(values),
                _ => {
                    return Err(PowerTreeError::parse(
                        line,
                        format!("unknown table field '{}' in table {}", key, name),
                    ))
                }
            }
        }

        let io = io.ok_or_else(|| PowerTreeError::parse(line, format!("table {} has no io axis", name)))?;
        let data = data.ok_or_else(|| PowerTreeError::parse(line, format!("table {} has no data", name)))?;
        let vi = vi.unwrap_or_else(|| vec![0.0]);

        if io.is_empty() || data.len() != vi.len() * io.len() {
            return Err(PowerTreeError::parse(
                line,
                format!(
                    "table {} needs {} x {} data values, got {}",
                    name,
                    vi.len(),
                    io.len(),
                    data.len()
                ),
            ));
        }
        let rows = data.chunks(io.len()).map(|row| row.to_vec()).collect();
        Ok(InterpTable::new(vi, io, rows))
    }

    fn parse_component(&mut self) -> Result<ComponentDef> {
        let keyword = self.current.text.clone();
        let line = self.current.line;
        self.advance()?;

        let component_type =
            ComponentType::from_keyword(&keyword).ok_or_else(|| PowerTreeError::UnknownComponentType {
                component_type: keyword.clone(),
                line,
            })?;
        let name = self.expect_name()?;

        let mut parents = Vec::new();
        let mut rail = None;
        let mut group = None;
        let mut params = HashMap::new();

        while !self.at_line_end() {
            let key = self.expect(TokenKind::Identifier)?.text.to_lowercase();
            self.expect(TokenKind::Equals)?;
            let value = match self.current.kind {
                TokenKind::Number => {
                    let tok = self.current.clone();
                    ParamValue::Number(parse_value(&tok.text).ok_or_else(|| {
                        PowerTreeError::parse(line, format!("invalid number: {}", tok.text))
                    })?)
                }
                TokenKind::Identifier => ParamValue::Ref(self.current.text.clone()),
                _ => {
                    return Err(PowerTreeError::invalid_component(
                        &name,
                        line,
                        format!("expected value for '{}'", key),
                    ))
                }
            };
            let text = self.current.text.clone();
            self.advance()?;

            match key.as_str() {
                "parent" => parents.push(text),
                "rail" => rail = Some(text),
                "group" => group = Some(text),
                _ => {
                    if params.insert(key.clone(), value).is_some() {
                        return Err(PowerTreeError::invalid_component(
                            &name,
                            line,
                            format!("parameter '{}' given twice", key),
                        ));
                    }
                }
            }
        }

        if component_type == ComponentType::Source && !parents.is_empty() {
            return Err(PowerTreeError::invalid_component(&name, line, "a source has no parent"));
        }
        if component_type != ComponentType::Source && parents.is_empty() {
            return Err(PowerTreeError::invalid_component(&name, line, "missing 'parent'"));
        }
        if component_type != ComponentType::PMux && parents.len() > 1 {
            return Err(PowerTreeError::invalid_component(
                &name,
                line,
                "only a PMUX takes several parents",
            ));
        }

        Ok(ComponentDef {
            component_type,
            name,
            parents,
            rail,
            group,
            params,
            line,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Result<NetlistAst> {
        super::super::parse(input)
    }

    #[test]
    fn test_parse_component() {
        let ast = parse("SOURCE BAT vo=3.7 rs=50m rail=VBAT\nPLOAD MCU parent=VBAT pwr=10m").unwrap();
        assert_eq!(ast.components.len(), 2);
        let bat = &ast.components[0];
        assert_eq!(bat.component_type, ComponentType::Source);
        assert_eq!(bat.rail.as_deref(), Some("VBAT"));
        assert_eq!(bat.params["rs"], ParamValue::Number(0.05));
        let mcu = &ast.components[1];
        assert_eq!(mcu.parents, vec!["VBAT"]);
        assert_eq!(mcu.line, 2);
    }

    #[test]
    fn test_parse_mux_parents() {
        let ast = parse("PMUX MUX parent=A parent=B rs=0.1").unwrap();
        assert_eq!(ast.components[0].parents, vec!["A", "B"]);
    }

    #[test]
    fn test_parse_table_rows() {
        let ast = parse(".table EFF vi=(5 12) io=(0.1 1) data=(0.8 0.9 0.7 0.85)").unwrap();
        let t = &ast.tables["EFF"];
        assert_eq!(t.vi, vec![5.0, 12.0]);
        assert_eq!(t.data, vec![vec![0.8, 0.9], vec![0.7, 0.85]]);
    }

    #[test]
    fn test_parse_table_shape_mismatch() {
        assert!(parse(".table EFF vi=(5 12) io=(0.1 1) data=(0.8 0.9 0.7)").is_err());
    }

    #[test]
    fn test_parse_phase_directives() {
        let input = ".phases run=10 sleep=3590\n.active BUCK run\n.phase MCU run=0.2 sleep=1m\n.limits MCU vi=(3 3.6)";
        let ast = parse(input).unwrap();
        assert_eq!(ast.phases, vec![("run".to_string(), 10.0), ("sleep".to_string(), 3590.0)]);
        assert!(matches!(&ast.phase_configs[0].config, PhaseConfig::Active(p) if p == &["run"]));
        assert!(matches!(&ast.phase_configs[1].config, PhaseConfig::Values(v) if v["sleep"] == 1e-3));
        assert_eq!(ast.limits[0].ranges, vec![(Metric::Vi, 3.0, 3.6)]);
    }

    #[test]
    fn test_unknown_keyword() {
        let err = parse("RESISTOR R1 parent=BAT").unwrap_err();
        assert!(matches!(err, PowerTreeError::UnknownComponentType { line: 1, .. }));
    }

    #[test]
    fn test_parse_with_comments() {
        let input = "# battery\nSOURCE BAT vo=3.7 ; inline comment style\n\n";
        let ast = parse(input).unwrap();
        assert_eq!(ast.components.len(), 1);
    }

    #[test]
    fn test_missing_parent() {
        assert!(parse("PLOAD MCU pwr=1").is_err());
    }
}
