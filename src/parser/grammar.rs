//! Recursive-descent parser turning a token stream into a [`ParsedGame`]:
//! an untyped syntax tree over identifiers, resolved into a real
//! [`crate::game::Game`] (with [`crate::formula::Formula`] leaves bound
//! to concrete ids) by `game::mod`'s semantic pass. Keeping this
//! boundary means every "undefined variable"/"out of range parameter"
//! diagnosis lives in one place (`crate::error::SemanticError`) instead
//! of being duplicated across syntax and semantics.
//!
//! Concrete syntax (spec §6):
//!
//! ```text
//! VARS { a, b, c, d };
//! RESTRICTION: a -> b & (c -> d) & (!b | !d);
//! ALPHABET { x, y, z };
//! MAPPING f { a, b, c };
//! EXPERIMENT query(2) {
//!     PARAMS_DISTINCT { 0, 1 };
//!     PARAMS_SORTED { 0, 1 };
//!     OUTCOME yes: f$1;
//!     FINAL OUTCOME no: !f$1;
//! }
//! ```

use crate::error::ParseError;

use super::tokenizer::{tokenize, Spanned, Token};

/// A formula over names rather than resolved ids, as produced directly
/// by the grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawFormula {
    /// A bare identifier: a variable reference (outside of an
    /// experiment) or a zero-arity... there is no zero-arity case; bare
    /// identifiers only ever name variables.
    Var(String),
    /// `ident$n`: a mapping reference at 0-based parameter position
    /// `n - 1`.
    Param(String, usize),
    Not(Box<RawFormula>),
    And(Vec<RawFormula>),
    Or(Vec<RawFormula>),
    Implies(Box<RawFormula>, Box<RawFormula>),
    Equiv(Box<RawFormula>, Box<RawFormula>),
    Count(RawCountKind, usize, Vec<RawFormula>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawCountKind {
    AtLeast,
    AtMost,
    Exactly,
}

impl std::fmt::Display for RawCountKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::AtLeast => "AtLeast",
            Self::AtMost => "AtMost",
            Self::Exactly => "Exactly",
        };
        write!(f, "{name}")
    }
}

/// Pretty-prints in the same fully-parenthesized shape as
/// [`crate::formula::Formula`]'s `Display`, but over source names
/// instead of resolved ids, so a parse/print/reparse cycle is checkable
/// before any semantic resolution happens (spec §8, "Parser / AST").
impl std::fmt::Display for RawFormula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Var(name) => write!(f, "{name}"),
            Self::Param(name, pos) => write!(f, "{name}${}", pos + 1),
            Self::Not(c) => write!(f, "!{c}"),
            Self::And(cs) => write!(f, "({})", join(cs, " & ")),
            Self::Or(cs) => write!(f, "({})", join(cs, " | ")),
            Self::Implies(l, r) => write!(f, "({l} -> {r})"),
            Self::Equiv(l, r) => write!(f, "({l} <-> {r})"),
            Self::Count(kind, k, cs) => write!(f, "{kind}-{k}({})", join(cs, ", ")),
        }
    }
}

fn join(items: &[RawFormula], sep: &str) -> String {
    items.iter().map(ToString::to_string).collect::<Vec<_>>().join(sep)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedOutcome {
    pub name: String,
    pub formula: RawFormula,
    pub is_final: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedExperiment {
    pub name: String,
    pub arity: usize,
    /// Each entry is a set of positions required pairwise distinct.
    pub params_distinct: Vec<Vec<usize>>,
    /// Each entry is a chain `i0 < i1 < ... < ik` of positions.
    pub params_sorted: Vec<Vec<usize>>,
    pub outcomes: Vec<ParsedOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedGame {
    pub variables: Vec<String>,
    pub restriction: RawFormula,
    /// Every `ALPHABET { ... };` block encountered, in declaration order.
    /// Exactly one is expected; more than one is a semantic error (spec
    /// §7, "alphabet redefinition"), diagnosed by `game::mod` rather than
    /// here so every name-resolution error lives in one place.
    pub alphabets: Vec<Vec<String>>,
    pub mappings: Vec<(String, Vec<String>)>,
    pub experiments: Vec<ParsedExperiment>,
}

/// Tokenizes and parses `src` into a [`ParsedGame`].
pub fn parse_game(src: &str) -> Result<ParsedGame, ParseError> {
    let tokens = tokenize(src)?;
    let mut parser = Parser { tokens, pos: 0 };
    let game = parser.parse_game()?;
    parser.expect(&Token::Eof)?;
    Ok(game)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn current(&self) -> &Spanned {
        &self.tokens[self.pos]
    }

    fn bump(&mut self) -> Token {
        let tok = self.tokens[self.pos].token.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        let cur = self.current();
        ParseError::new(cur.line, cur.col, message)
    }

    fn expect(&mut self, tok: &Token) -> Result<(), ParseError> {
        if &self.current().token == tok {
            self.bump();
            Ok(())
        } else {
            Err(self.error(format!("expected '{tok}', found '{}'", self.current().token)))
        }
    }

    fn peek_is_keyword(&self, keyword: &str) -> bool {
        matches!(&self.current().token, Token::Ident(s) if s == keyword)
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), ParseError> {
        if self.peek_is_keyword(keyword) {
            self.bump();
            Ok(())
        } else {
            Err(self.error(format!("expected keyword '{keyword}', found '{}'", self.current().token)))
        }
    }

    fn expect_ident(&mut self) -> Result<String, ParseError> {
        match self.bump() {
            Token::Ident(s) => Ok(s),
            other => Err(ParseError::new(
                self.current().line,
                self.current().col,
                format!("expected an identifier, found '{other}'"),
            )),
        }
    }

    fn expect_number(&mut self) -> Result<usize, ParseError> {
        match self.bump() {
            Token::Number(n) => Ok(n),
            other => Err(ParseError::new(
                self.current().line,
                self.current().col,
                format!("expected a number, found '{other}'"),
            )),
        }
    }

    fn parse_braced_list<T>(&mut self, mut parse_item: impl FnMut(&mut Self) -> Result<T, ParseError>) -> Result<Vec<T>, ParseError> {
        self.expect(&Token::LBrace)?;
        let mut items = Vec::new();
        if self.current().token != Token::RBrace {
            items.push(parse_item(self)?);
            while self.current().token == Token::Comma {
                self.bump();
                items.push(parse_item(self)?);
            }
        }
        self.expect(&Token::RBrace)?;
        Ok(items)
    }

    fn parse_ident_list(&mut self) -> Result<Vec<String>, ParseError> {
        self.parse_braced_list(|p| p.expect_ident())
    }

    fn parse_number_list(&mut self) -> Result<Vec<usize>, ParseError> {
        self.parse_braced_list(|p| p.expect_number())
    }

    fn parse_game(&mut self) -> Result<ParsedGame, ParseError> {
        self.expect_keyword("VARS")?;
        let variables = self.parse_ident_list()?;
        self.expect(&Token::Semi)?;

        self.expect_keyword("RESTRICTION")?;
        self.expect(&Token::Colon)?;
        let restriction = self.parse_formula()?;
        self.expect(&Token::Semi)?;

        let mut alphabets = Vec::new();
        self.expect_keyword("ALPHABET")?;
        alphabets.push(self.parse_ident_list()?);
        self.expect(&Token::Semi)?;
        while self.peek_is_keyword("ALPHABET") {
            self.bump();
            alphabets.push(self.parse_ident_list()?);
            self.expect(&Token::Semi)?;
        }

        let mut mappings = Vec::new();
        while self.peek_is_keyword("MAPPING") {
            self.bump();
            let name = self.expect_ident()?;
            let targets = self.parse_ident_list()?;
            self.expect(&Token::Semi)?;
            mappings.push((name, targets));
        }

        let mut experiments = Vec::new();
        while self.peek_is_keyword("EXPERIMENT") {
            experiments.push(self.parse_experiment()?);
        }

        Ok(ParsedGame {
            variables,
            restriction,
            alphabets,
            mappings,
            experiments,
        })
    }

    fn parse_experiment(&mut self) -> Result<ParsedExperiment, ParseError> {
        self.expect_keyword("EXPERIMENT")?;
        let name = self.expect_ident()?;
        self.expect(&Token::LParen)?;
        let arity = self.expect_number()?;
        self.expect(&Token::RParen)?;
        self.expect(&Token::LBrace)?;

        let mut params_distinct = Vec::new();
        let mut params_sorted = Vec::new();
        let mut outcomes = Vec::new();

        loop {
            if self.peek_is_keyword("PARAMS_DISTINCT") {
                self.bump();
                params_distinct.push(self.parse_number_list()?);
                self.expect(&Token::Semi)?;
            } else if self.peek_is_keyword("PARAMS_SORTED") {
                self.bump();
                params_sorted.push(self.parse_number_list()?);
                self.expect(&Token::Semi)?;
            } else if self.peek_is_keyword("FINAL") || self.peek_is_keyword("OUTCOME") {
                let is_final = if self.peek_is_keyword("FINAL") {
                    self.bump();
                    true
                } else {
                    false
                };
                self.expect_keyword("OUTCOME")?;
                let oname = self.expect_ident()?;
                self.expect(&Token::Colon)?;
                let formula = self.parse_formula()?;
                self.expect(&Token::Semi)?;
                outcomes.push(ParsedOutcome {
                    name: oname,
                    formula,
                    is_final,
                });
            } else {
                break;
            }
        }

        self.expect(&Token::RBrace)?;

        Ok(ParsedExperiment {
            name,
            arity,
            params_distinct,
            params_sorted,
            outcomes,
        })
    }

    // Precedence, loosest to tightest: <-> , -> , | , & , ! , atom.
    fn parse_formula(&mut self) -> Result<RawFormula, ParseError> {
        self.parse_equiv()
    }

    fn parse_equiv(&mut self) -> Result<RawFormula, ParseError> {
        let mut left = self.parse_implies()?;
        while self.current().token == Token::DoubleArrow {
            self.bump();
            let right = self.parse_implies()?;
            left = RawFormula::Equiv(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_implies(&mut self) -> Result<RawFormula, ParseError> {
        let left = self.parse_or()?;
        if self.current().token == Token::Arrow {
            self.bump();
            let right = self.parse_implies()?;
            Ok(RawFormula::Implies(Box::new(left), Box::new(right)))
        } else {
            Ok(left)
        }
    }

    fn parse_or(&mut self) -> Result<RawFormula, ParseError> {
        let mut items = vec![self.parse_and()?];
        while self.current().token == Token::Pipe {
            self.bump();
            items.push(self.parse_and()?);
        }
        Ok(if items.len() == 1 { items.pop().unwrap() } else { RawFormula::Or(items) })
    }

    fn parse_and(&mut self) -> Result<RawFormula, ParseError> {
        let mut items = vec![self.parse_unary()?];
        while self.current().token == Token::Amp {
            self.bump();
            items.push(self.parse_unary()?);
        }
        Ok(if items.len() == 1 { items.pop().unwrap() } else { RawFormula::And(items) })
    }

    fn parse_unary(&mut self) -> Result<RawFormula, ParseError> {
        if self.current().token == Token::Bang {
            self.bump();
            Ok(RawFormula::Not(Box::new(self.parse_unary()?)))
        } else {
            self.parse_atom()
        }
    }

    fn parse_atom(&mut self) -> Result<RawFormula, ParseError> {
        match self.current().token.clone() {
            Token::LParen => {
                self.bump();
                let f = self.parse_formula()?;
                self.expect(&Token::RParen)?;
                Ok(f)
            }
            Token::Ident(name) if matches!(name.as_str(), "AtLeast" | "AtMost" | "Exactly") => {
                self.bump();
                self.expect(&Token::Dash)?;
                let k = self.expect_number()?;
                self.expect(&Token::LParen)?;
                let children = self.parse_formula_list()?;
                self.expect(&Token::RParen)?;
                let kind = match name.as_str() {
                    "AtLeast" => RawCountKind::AtLeast,
                    "AtMost" => RawCountKind::AtMost,
                    _ => RawCountKind::Exactly,
                };
                Ok(RawFormula::Count(kind, k, children))
            }
            Token::Ident(name) => {
                self.bump();
                if self.current().token == Token::Dollar {
                    self.bump();
                    let n = self.expect_number()?;
                    if n == 0 {
                        return Err(self.error("parameter positions are 1-based; '$0' is not valid"));
                    }
                    Ok(RawFormula::Param(name, n - 1))
                } else {
                    Ok(RawFormula::Var(name))
                }
            }
            other => Err(self.error(format!("expected a formula, found '{other}'"))),
        }
    }

    fn parse_formula_list(&mut self) -> Result<Vec<RawFormula>, ParseError> {
        let mut items = vec![self.parse_formula()?];
        while self.current().token == Token::Comma {
            self.bump();
            items.push(self.parse_formula()?);
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_conjunction_chain() {
        let f = Parser {
            tokens: tokenize("a & b & c").unwrap(),
            pos: 0,
        }
        .parse_formula()
        .unwrap();
        match f {
            RawFormula::And(items) => assert_eq!(items.len(), 3),
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn parses_param_reference() {
        let f = Parser {
            tokens: tokenize("f$2").unwrap(),
            pos: 0,
        }
        .parse_formula()
        .unwrap();
        assert_eq!(f, RawFormula::Param("f".into(), 1));
    }

    #[test]
    fn parses_full_game_declaration() {
        let src = r#"
            VARS { a, b, c, d };
            RESTRICTION: a -> b & c -> d & (!b | !d);
            ALPHABET { x, y, z };
            MAPPING f { a, b, c };
            EXPERIMENT query(2) {
                PARAMS_DISTINCT { 0, 1 };
                PARAMS_SORTED { 0, 1 };
                OUTCOME yes: f$1;
                FINAL OUTCOME no: !f$1;
            }
        "#;
        let game = parse_game(src).unwrap();
        assert_eq!(game.variables, vec!["a", "b", "c", "d"]);
        assert_eq!(game.alphabets, vec![vec!["x".to_string(), "y".to_string(), "z".to_string()]]);
        assert_eq!(game.mappings, vec![("f".to_string(), vec!["a".to_string(), "b".to_string(), "c".to_string()])]);
        assert_eq!(game.experiments.len(), 1);
        let exp = &game.experiments[0];
        assert_eq!(exp.arity, 2);
        assert_eq!(exp.params_distinct, vec![vec![0, 1]]);
        assert_eq!(exp.params_sorted, vec![vec![0, 1]]);
        assert_eq!(exp.outcomes.len(), 2);
        assert!(!exp.outcomes[0].is_final);
        assert!(exp.outcomes[1].is_final);
    }

    #[test]
    fn a_second_alphabet_block_parses_as_a_second_entry() {
        let src = r#"
            VARS { a };
            RESTRICTION: a;
            ALPHABET { x };
            ALPHABET { y, z };
        "#;
        let game = parse_game(src).unwrap();
        assert_eq!(game.alphabets, vec![vec!["x".to_string()], vec!["y".to_string(), "z".to_string()]]);
    }

    #[test]
    fn counting_operator_parses_threshold_and_children() {
        let f = Parser {
            tokens: tokenize("Exactly-2(a, b, c)").unwrap(),
            pos: 0,
        }
        .parse_formula()
        .unwrap();
        match f {
            RawFormula::Count(RawCountKind::Exactly, 2, children) => assert_eq!(children.len(), 3),
            other => panic!("expected Exactly-2(...), got {other:?}"),
        }
    }
}
