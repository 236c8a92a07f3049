//! Parser for the circuit DSL.

use std::collections::HashMap;

use super::ast::*;
use super::lexer::{parse_value, Lexer, Token, TokenKind};
use crate::error::{Result, SimError};
use crate::solver::SolverType;

/// Parser for circuit DSL.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    peeked: Option<Token>,
}

impl<'a> Parser<'a> {
    /// Create a new parser with the given lexer.
    pub fn new(mut lexer: Lexer<'a>) -> Result<Self> {
        let current = lexer.next_token()?;
        Ok(Self {
            lexer,
            current,
            peeked: None,
        })
    }

    /// Parse the entire circuit description.
    pub fn parse(&mut self) -> Result<CircuitAst> {
        let mut ast = CircuitAst::new();

        while self.current.kind != TokenKind::Eof {
            match self.current.kind {
                TokenKind::Newline => {
                    self.advance()?;
                    continue;
                }
                TokenKind::Directive => self.parse_directive(&mut ast)?,
                TokenKind::Identifier => {
                    let component = self.parse_component()?;
                    Self::add_component(&mut ast, component)?;
                }
                _ => {
                    return Err(SimError::parse(
                        self.current.line,
                        format!("unexpected token: {:?}", self.current.text),
                    ));
                }
            }

            match self.current.kind {
                TokenKind::Newline => self.advance()?,
                TokenKind::Eof => {}
                _ => {
                    return Err(SimError::parse(
                        self.current.line,
                        format!("unexpected token at end of line: {:?}", self.current.text),
                    ));
                }
            }
        }

        Ok(ast)
    }

    fn add_component(ast: &mut CircuitAst, component: ComponentDef) -> Result<()> {
        let duplicate = ast.components.iter().any(|c| c.name == component.name)
            || ast.couplings.iter().any(|c| c.name == component.name);
        if duplicate {
            return Err(SimError::DuplicateComponent { name: component.name });
        }

        if component.component_type == ComponentType::Coupling {
            let coefficient = component.value().ok_or_else(|| {
                SimError::invalid_component(
                    &component.name,
                    component.line,
                    "missing coupling coefficient",
                )
            })?;
            let mut inductors = component.nodes.into_iter();
            let (inductor_a, inductor_b) = match (inductors.next(), inductors.next()) {
                (Some(a), Some(b)) => (a, b),
                _ => return Err(SimError::parse(component.line, "coupling needs two inductors")),
            };
            ast.couplings.push(CouplingDef {
                name: component.name,
                inductor_a,
                inductor_b,
                coefficient,
                line: component.line,
            });
            return Ok(());
        }

        for node in &component.nodes {
            ast.add_node(node);
        }
        ast.components.push(component);
        Ok(())
    }

    fn advance(&mut self) -> Result<()> {
        self.current = match self.peeked.take() {
            Some(tok) => tok,
            None => self.lexer.next_token()?,
        };
        Ok(())
    }

    fn peek_kind(&mut self) -> Result<TokenKind> {
        if let Some(tok) = &self.peeked {
            return Ok(tok.kind);
        }
        let tok = self.lexer.next_token()?;
        let kind = tok.kind;
        self.peeked = Some(tok);
        Ok(kind)
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token> {
        if self.current.kind == kind {
            let tok = self.current.clone();
            self.advance()?;
            Ok(tok)
        } else {
            Err(SimError::parse(
                self.current.line,
                format!("expected {:?}, got {:?}", kind, self.current.kind),
            ))
        }
    }

    /// Identifier or number used as a name (node names may be numeric).
    fn expect_name(&mut self) -> Result<String> {
        match self.current.kind {
            TokenKind::Identifier | TokenKind::Number => {
                let text = self.current.text.clone();
                self.advance()?;
                Ok(text)
            }
            kind => Err(SimError::parse(
                self.current.line,
                format!("expected a name, got {:?}", kind),
            )),
        }
    }

    fn expect_value(&mut self) -> Result<f64> {
        let line = self.current.line;
        let text = self.expect_name()?;
        parse_value(&text).ok_or_else(|| SimError::parse(line, format!("invalid number: {}", text)))
    }

    fn at_line_end(&self) -> bool {
        matches!(self.current.kind, TokenKind::Newline | TokenKind::Eof)
    }

    fn parse_directive(&mut self, ast: &mut CircuitAst) -> Result<()> {
        let directive = self.current.text.clone();
        let line = self.current.line;
        self.advance()?;

        match directive.to_lowercase().as_str() {
            ".model" => {
                let model = self.parse_model_def(line)?;
                if ast.models.contains_key(&model.name) {
                    return Err(SimError::DuplicateModel { name: model.name });
                }
                ast.models.insert(model.name.clone(), model);
            }
            ".tran" => {
                if ast.tran.is_some() {
                    return Err(SimError::parse(line, "duplicate .tran directive"));
                }
                let dt = self.expect_value()?;
                let duration = self.expect_value()?;
                let solver = if self.current.kind == TokenKind::Identifier {
                    let name = self.expect(TokenKind::Identifier)?.text;
                    let solver = name
                        .parse::<SolverType>()
                        .map_err(|e| SimError::parse(line, e.to_string()))?;
                    Some(solver)
                } else {
                    None
                };
                ast.tran = Some(TranDef { dt, duration, solver });
            }
            ".probe" => {
                if self.at_line_end() {
                    return Err(SimError::parse(line, ".probe needs at least one signal"));
                }
                while !self.at_line_end() {
                    let probe = self.parse_probe()?;
                    if !ast.probes.contains(&probe) {
                        ast.probes.push(probe);
                    }
                }
            }
            ".end" => {
                while self.current.kind != TokenKind::Eof {
                    self.advance()?;
                }
            }
            _ => {
                return Err(SimError::parse(line, format!("unknown directive: {}", directive)));
            }
        }

        Ok(())
    }

    fn parse_probe(&mut self) -> Result<ProbeDef> {
        let name = self.expect_name()?;
        if name.eq_ignore_ascii_case("i") && self.current.kind == TokenKind::OpenParen {
            self.advance()?;
            let element = self.expect_name()?;
            self.expect(TokenKind::CloseParen)?;
            return Ok(ProbeDef::Current(element));
        }
        Ok(ProbeDef::Node(name))
    }

    fn parse_model_def(&mut self, line: usize) -> Result<ModelDef> {
        let name = self.expect(TokenKind::Identifier)?.text;
        let type_str = self.expect(TokenKind::Identifier)?.text;

        let model_type = ModelType::parse(&type_str)
            .ok_or_else(|| SimError::parse(line, format!("unknown model type: {}", type_str)))?;

        let mut params = HashMap::new();

        // (param=value param2=value2)
        if self.current.kind == TokenKind::OpenParen {
            self.advance()?;

            while self.current.kind != TokenKind::CloseParen {
                if self.at_line_end() {
                    return Err(SimError::parse(line, "missing ')' in .model"));
                }
                let param_name = self.expect(TokenKind::Identifier)?.text;
                self.expect(TokenKind::Equals)?;
                let value = self.expect_value()?;
                params.insert(param_name.to_lowercase(), value);
            }
            self.advance()?;
        }

        Ok(ModelDef {
            name,
            model_type,
            params,
            line,
        })
    }

    fn parse_component(&mut self) -> Result<ComponentDef> {
        let first_token = self.current.text.clone();
        let line = self.current.line;
        self.advance()?;

        // Keywords first, so IGBT is not read as a current source named "IGBT"
        let (component_type, name) = match ComponentType::from_keyword(&first_token) {
            Some(ct) => (ct, self.expect_name()?),
            None => {
                let first_char = first_token.chars().next().unwrap_or('?');
                let ct = ComponentType::from_prefix(first_char).ok_or_else(|| {
                    SimError::UnknownComponentType {
                        component_type: first_token.clone(),
                        line,
                    }
                })?;
                (ct, first_token)
            }
        };

        let expected_nodes = component_type.expected_node_count();
        let mut nodes = Vec::with_capacity(expected_nodes);
        let mut values = Vec::new();
        let mut source = None;
        let mut model_ref = None;
        let mut params = HashMap::new();

        while !self.at_line_end() {
            let tok = self.current.clone();
            let assignment =
                tok.kind == TokenKind::Identifier && self.peek_kind()? == TokenKind::Equals;
            match tok.kind {
                TokenKind::Identifier if assignment => {
                    self.advance()?; // name
                    self.advance()?; // '='
                    let value = self.expect_value()?;
                    params.insert(tok.text.to_lowercase(), value);
                }
                TokenKind::Identifier | TokenKind::Number if nodes.len() < expected_nodes => {
                    self.advance()?;
                    nodes.push(if is_ground(&tok.text) { "0".to_string() } else { tok.text });
                }
                TokenKind::Identifier => {
                    self.advance()?;
                    match tok.text.to_ascii_uppercase().as_str() {
                        "DC" => source = Some(SourceForm::Dc),
                        "AC" | "SIN" => source = Some(SourceForm::Ac),
                        _ if model_ref.is_none() && values.is_empty() => model_ref = Some(tok.text),
                        _ => {
                            return Err(SimError::invalid_component(
                                &name,
                                line,
                                format!("unexpected token '{}'", tok.text),
                            ));
                        }
                    }
                }
                TokenKind::Number => {
                    self.advance()?;
                    let value = parse_value(&tok.text).ok_or_else(|| {
                        SimError::parse(line, format!("invalid number: {}", tok.text))
                    })?;
                    values.push(value);
                }
                _ => {
                    return Err(SimError::invalid_component(
                        &name,
                        line,
                        format!("unexpected token '{}'", tok.text),
                    ));
                }
            }
        }

        if nodes.len() < expected_nodes {
            return Err(SimError::invalid_component(
                &name,
                line,
                format!("expected {} nodes, got {}", expected_nodes, nodes.len()),
            ));
        }

        let needs_value = matches!(
            component_type,
            ComponentType::Resistor
                | ComponentType::Capacitor
                | ComponentType::Inductor
                | ComponentType::VoltageSource
                | ComponentType::CurrentSource
                | ComponentType::Vcvs
                | ComponentType::Coupling
        );
        if needs_value && values.is_empty() {
            return Err(SimError::invalid_component(&name, line, "missing value"));
        }
        if source == Some(SourceForm::Ac) && values.len() < 2 {
            return Err(SimError::invalid_component(
                &name,
                line,
                "AC source needs amplitude and frequency",
            ));
        }

        Ok(ComponentDef {
            component_type,
            name,
            nodes,
            values,
            source,
            model_ref,
            params,
            line,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::parse;
    use super::*;

    #[test]
    fn test_parse_resistor() {
        let ast = parse("R1 in out 10k").unwrap();
        assert_eq!(ast.components.len(), 1);
        assert_eq!(ast.components[0].component_type, ComponentType::Resistor);
        assert_eq!(ast.components[0].name, "R1");
        assert_eq!(ast.components[0].nodes, vec!["in", "out"]);
        assert_eq!(ast.components[0].value(), Some(10_000.0));
        assert_eq!(ast.nodes, vec!["in", "out"]);
    }

    #[test]
    fn test_parse_sources() {
        let ast = parse("V1 in 0 DC 10\nV2 a GND AC 325 50 0.5\nI1 0 b 2").unwrap();
        let v1 = &ast.components[0];
        assert_eq!(v1.source, Some(SourceForm::Dc));
        assert_eq!(v1.nodes, vec!["in", "0"]);
        assert_eq!(v1.values, vec![10.0]);

        let v2 = &ast.components[1];
        assert_eq!(v2.source, Some(SourceForm::Ac));
        assert_eq!(v2.values, vec![325.0, 50.0, 0.5]);
        assert_eq!(ast.components[2].source, None);
        assert_eq!(ast.nodes, vec!["in", "a", "b"]);
    }

    #[test]
    fn test_parse_switches_and_models() {
        let input = "\
.model T IGBT (ron=10m roff=1meg vf=1.2)
IGBT Q1 dc sw T gate=1
THY X1 a k freq=50 duty=0.1
M1 d s ron=5m
D1 k a
";
        let ast = parse(input).unwrap();
        let model = &ast.models["T"];
        assert_eq!(model.model_type, ModelType::Igbt);
        assert!((model.params["roff"] - 1e6).abs() < 1e-6);

        let q1 = &ast.components[0];
        assert_eq!(q1.component_type, ComponentType::Igbt);
        assert_eq!(q1.name, "Q1");
        assert_eq!(q1.model_ref.as_deref(), Some("T"));
        assert_eq!(q1.param("gate"), Some(1.0));

        assert_eq!(ast.components[1].component_type, ComponentType::Thyristor);
        assert_eq!(ast.components[1].param("freq"), Some(50.0));
        assert_eq!(ast.components[2].component_type, ComponentType::Mosfet);
        assert_eq!(ast.components[3].component_type, ComponentType::Diode);
    }

    #[test]
    fn test_parse_vcvs_and_coupling() {
        let ast = parse("E1 out 0 in 0 10\nL1 a 0 1m\nL2 b 0 4m\nK1 L1 L2 0.9").unwrap();
        assert_eq!(ast.components[0].nodes, vec!["out", "0", "in", "0"]);
        assert_eq!(ast.components.len(), 3);
        assert_eq!(
            ast.couplings,
            vec![CouplingDef {
                name: "K1".into(),
                inductor_a: "L1".into(),
                inductor_b: "L2".into(),
                coefficient: 0.9,
                line: 4,
            }]
        );
        assert!(!ast.nodes.contains(&"L1".to_string()));
    }

    #[test]
    fn test_parse_directives() {
        let ast = parse(".tran 1u 5m trz\n.probe out I(R1) 3\nR1 out 3 1k").unwrap();
        let tran = ast.tran.unwrap();
        assert!((tran.dt - 1e-6).abs() < 1e-18);
        assert!((tran.duration - 5e-3).abs() < 1e-15);
        assert_eq!(tran.solver, Some(SolverType::Trapezoidal));
        assert_eq!(
            ast.probes,
            vec![
                ProbeDef::Node("out".into()),
                ProbeDef::Current("R1".into()),
                ProbeDef::Node("3".into())
            ]
        );
    }

    #[test]
    fn test_parse_with_comments() {
        let ast = parse("* title\n# comment\nR1 in out 1k ; inline\n.end\nR2 ignored 0 1").unwrap();
        assert_eq!(ast.components.len(), 1);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse("R1 a"), Err(SimError::InvalidComponent { line: 1, .. })));
        assert!(matches!(parse("R1 a b"), Err(SimError::InvalidComponent { .. })));
        assert!(matches!(parse("X1 a b 1"), Err(SimError::UnknownComponentType { .. })));
        assert!(matches!(parse("R1 a b 1\nR1 b 0 1"), Err(SimError::DuplicateComponent { .. })));
        assert!(matches!(parse(".foo 1"), Err(SimError::ParseError { line: 1, .. })));
        assert!(matches!(parse("\n.tran 1u 1m euler"), Err(SimError::ParseError { line: 2, .. })));
        assert!(matches!(parse(".model A D (ron=1"), Err(SimError::ParseError { .. })));
        assert!(matches!(parse("V1 a 0 AC 1"), Err(SimError::InvalidComponent { .. })));
    }
}
