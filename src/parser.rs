//! Reader for program and query text.
//!
//! A hand-rolled tokenizer and precedence-climbing parser producing terms
//! directly into the arena. Covers the operator table the engine dispatches
//! on, lists with `|` tails, brace terms, quoted atoms, strings, and both
//! comment styles. Each term read starts a fresh variable scope; the same
//! spelled name maps to the same variable within one term only.

use crate::symbol::{Names, SymbolStore};
use crate::term::{make_list, nil, TermId, TermStore, VarId};
use hashbrown::HashMap;
use smallvec::SmallVec;
use std::fmt;

/// Reader failures, with a character offset where useful.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadError {
    /// Input ended inside a term.
    UnexpectedEof,
    /// A character that cannot start or continue a token.
    UnexpectedChar(char, usize),
    /// The parser wanted something specific.
    Expected(&'static str, usize),
    /// Unparsable or out-of-range numeric literal.
    BadNumber(usize),
    /// A quoted atom or string ran off the end of input.
    UnterminatedQuote(usize),
    /// A `/* ... */` comment ran off the end of input.
    UnterminatedComment(usize),
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadError::UnexpectedEof => write!(f, "unexpected end of input"),
            ReadError::UnexpectedChar(c, at) => {
                write!(f, "unexpected character '{}' at offset {}", c, at)
            }
            ReadError::Expected(what, at) => write!(f, "expected {} at offset {}", what, at),
            ReadError::BadNumber(at) => write!(f, "malformed number at offset {}", at),
            ReadError::UnterminatedQuote(at) => write!(f, "unterminated quote at offset {}", at),
            ReadError::UnterminatedComment(at) => {
                write!(f, "unterminated block comment at offset {}", at)
            }
        }
    }
}

impl std::error::Error for ReadError {}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Atom(String),
    /// An atom immediately followed by `(`: a compound functor.
    Functor(String),
    Var(String),
    Int(i64),
    Float(f64),
    Str(Vec<u8>),
    Open,
    Close,
    OpenList,
    CloseList,
    OpenBrace,
    CloseBrace,
    Comma,
    Bar,
    /// Clause terminator.
    Dot,
    Eof,
}

/// Characters that glue together into symbolic atoms (`:-`, `-->`, `=:=`).
const SYMBOL_CHARS: &str = "+-*/\\^<>=~:.?@#&$";

/// Streaming term reader over a source string.
pub struct Reader<'a> {
    src: Vec<char>,
    pos: usize,
    peeked: Option<(Tok, usize)>,
    terms: &'a TermStore,
    symbols: &'a SymbolStore,
    ns: &'a Names,
    vars: HashMap<String, VarId>,
    var_order: Vec<(String, VarId)>,
}

impl<'a> Reader<'a> {
    pub fn new(
        src: &str,
        terms: &'a TermStore,
        symbols: &'a SymbolStore,
        ns: &'a Names,
    ) -> Self {
        Self {
            src: src.chars().collect(),
            pos: 0,
            peeked: None,
            terms,
            symbols,
            ns,
            vars: HashMap::new(),
            var_order: Vec::new(),
        }
    }

    /// Read the next `Term.` from the input; None at end of input.
    pub fn next_term(&mut self) -> Result<Option<TermId>, ReadError> {
        self.vars.clear();
        self.var_order.clear();

        if matches!(self.peek_tok()?.0, Tok::Eof) {
            return Ok(None);
        }
        let term = self.parse(1200)?;
        let (tok, at) = self.next_tok()?;
        if tok != Tok::Dot {
            return Err(expected("end of clause '.'", &tok, at));
        }
        Ok(Some(term))
    }

    /// The named variables of the most recent term, in first-occurrence
    /// order, as `(name, variable term)` pairs. Anonymous `_` is excluded.
    pub fn take_var_bindings(&mut self) -> Vec<(String, TermId)> {
        let order = std::mem::take(&mut self.var_order);
        order
            .into_iter()
            .map(|(name, v)| (name, self.terms.var(v)))
            .collect()
    }

    // ----- parser -----

    fn parse(&mut self, max_prec: u16) -> Result<TermId, ReadError> {
        let mut left = self.parse_primary(max_prec)?;
        loop {
            let (tok, _) = self.peek_tok()?.clone();
            match tok {
                Tok::Atom(ref name) => {
                    let Some((prec, right_prec)) = infix_op(name) else {
                        break;
                    };
                    if prec > max_prec {
                        break;
                    }
                    let functor = self.symbols.intern(name);
                    self.next_tok()?;
                    let right = self.parse(right_prec)?;
                    left = self.terms.compound2(functor, left, right);
                }
                Tok::Comma if max_prec >= 1000 => {
                    self.next_tok()?;
                    let right = self.parse(1000)?;
                    left = self.terms.compound2(self.ns.comma, left, right);
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn parse_primary(&mut self, max_prec: u16) -> Result<TermId, ReadError> {
        let (tok, at) = self.next_tok()?;
        match tok {
            Tok::Int(i) => Ok(self.terms.int(i)),
            Tok::Float(f) => Ok(self.terms.float(f)),
            Tok::Str(bytes) => Ok(self.terms.string(&bytes)),
            Tok::Var(name) => Ok(self.variable(&name)),
            Tok::Functor(name) => {
                let functor = self.symbols.intern(&name);
                let (open, open_at) = self.next_tok()?;
                if open != Tok::Open {
                    return Err(expected("'('", &open, open_at));
                }
                let mut args: SmallVec<[TermId; 4]> = SmallVec::new();
                loop {
                    args.push(self.parse(999)?);
                    let (sep, sep_at) = self.next_tok()?;
                    match sep {
                        Tok::Comma => continue,
                        Tok::Close => break,
                        _ => return Err(expected("',' or ')'", &sep, sep_at)),
                    }
                }
                Ok(self.terms.compound(functor, args))
            }
            Tok::Atom(name) => {
                // Prefix minus folds into numeric literals.
                if name == "-" && max_prec >= 200 {
                    match self.peek_tok()?.0 {
                        Tok::Int(i) => {
                            self.next_tok()?;
                            return Ok(self.terms.int(i.wrapping_neg()));
                        }
                        Tok::Float(f) => {
                            self.next_tok()?;
                            return Ok(self.terms.float(-f));
                        }
                        _ => {}
                    }
                    if starts_term(&self.peek_tok()?.0) {
                        let operand = self.parse(200)?;
                        return Ok(self.terms.compound1(self.ns.minus, operand));
                    }
                }
                if name == "\\+" && max_prec >= 900 && starts_term(&self.peek_tok()?.0) {
                    let operand = self.parse(900)?;
                    return Ok(self.terms.compound1(self.ns.naf, operand));
                }
                Ok(self.terms.atom(self.symbols.intern(&name)))
            }
            Tok::Open => {
                let inner = self.parse(1200)?;
                let (close, close_at) = self.next_tok()?;
                if close != Tok::Close {
                    return Err(expected("')'", &close, close_at));
                }
                Ok(inner)
            }
            Tok::OpenList => self.parse_list(),
            Tok::OpenBrace => {
                if self.peek_tok()?.0 == Tok::CloseBrace {
                    self.next_tok()?;
                    return Ok(self.terms.atom(self.ns.braces));
                }
                let inner = self.parse(1200)?;
                let (close, close_at) = self.next_tok()?;
                if close != Tok::CloseBrace {
                    return Err(expected("'}'", &close, close_at));
                }
                Ok(self.terms.compound1(self.ns.braces, inner))
            }
            Tok::Eof => Err(ReadError::UnexpectedEof),
            _ => Err(ReadError::Expected("a term", at)),
        }
    }

    fn parse_list(&mut self) -> Result<TermId, ReadError> {
        if self.peek_tok()?.0 == Tok::CloseList {
            self.next_tok()?;
            return Ok(nil(self.terms, self.ns));
        }
        let mut items = vec![self.parse(999)?];
        let tail;
        loop {
            let (sep, sep_at) = self.next_tok()?;
            match sep {
                Tok::Comma => items.push(self.parse(999)?),
                Tok::Bar => {
                    tail = self.parse(999)?;
                    let (close, close_at) = self.next_tok()?;
                    if close != Tok::CloseList {
                        return Err(expected("']'", &close, close_at));
                    }
                    break;
                }
                Tok::CloseList => {
                    tail = nil(self.terms, self.ns);
                    break;
                }
                _ => return Err(expected("',', '|' or ']'", &sep, sep_at)),
            }
        }
        Ok(make_list(self.terms, self.ns, &items, tail))
    }

    fn variable(&mut self, name: &str) -> TermId {
        if name == "_" {
            // Anonymous: every occurrence is a fresh variable.
            return self.terms.var(self.terms.fresh_var());
        }
        if let Some(&v) = self.vars.get(name) {
            return self.terms.var(v);
        }
        let v = self.terms.named_var(self.symbols.intern(name));
        self.vars.insert(name.to_string(), v);
        self.var_order.push((name.to_string(), v));
        self.terms.var(v)
    }

    // ----- lexer -----

    fn peek_tok(&mut self) -> Result<&(Tok, usize), ReadError> {
        if self.peeked.is_none() {
            self.peeked = Some(self.lex()?);
        }
        Ok(self.peeked.as_ref().unwrap())
    }

    fn next_tok(&mut self) -> Result<(Tok, usize), ReadError> {
        if let Some(t) = self.peeked.take() {
            return Ok(t);
        }
        self.lex()
    }

    fn peek_char(&self) -> Option<char> {
        self.src.get(self.pos).copied()
    }

    fn char_at(&self, offset: usize) -> Option<char> {
        self.src.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek_char();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_layout(&mut self) -> Result<(), ReadError> {
        loop {
            match self.peek_char() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('%') => {
                    while let Some(c) = self.bump() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                Some('/') if self.char_at(1) == Some('*') => {
                    let start = self.pos;
                    self.bump();
                    self.bump();
                    loop {
                        match self.bump() {
                            Some('*') if self.peek_char() == Some('/') => {
                                self.bump();
                                break;
                            }
                            Some(_) => {}
                            None => return Err(ReadError::UnterminatedComment(start)),
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn lex(&mut self) -> Result<(Tok, usize), ReadError> {
        self.skip_layout()?;
        let at = self.pos;
        let Some(c) = self.peek_char() else {
            return Ok((Tok::Eof, at));
        };

        match c {
            '(' => {
                self.bump();
                Ok((Tok::Open, at))
            }
            ')' => {
                self.bump();
                Ok((Tok::Close, at))
            }
            '[' => {
                self.bump();
                Ok((Tok::OpenList, at))
            }
            ']' => {
                self.bump();
                Ok((Tok::CloseList, at))
            }
            '{' => {
                self.bump();
                Ok((Tok::OpenBrace, at))
            }
            '}' => {
                self.bump();
                Ok((Tok::CloseBrace, at))
            }
            ',' => {
                self.bump();
                Ok((Tok::Comma, at))
            }
            '|' => {
                self.bump();
                Ok((Tok::Bar, at))
            }
            '!' | ';' => {
                self.bump();
                Ok((Tok::Atom(c.to_string()), at))
            }
            '\'' => {
                self.bump();
                let name = self.lex_quoted('\'', at)?;
                Ok((self.atomish(name), at))
            }
            '"' => {
                self.bump();
                let text = self.lex_quoted('"', at)?;
                Ok((Tok::Str(text.into_bytes()), at))
            }
            c if c.is_ascii_digit() => self.lex_number(at),
            c if c.is_ascii_lowercase() => {
                let name = self.lex_identifier();
                Ok((self.atomish(name), at))
            }
            c if c.is_ascii_uppercase() || c == '_' => {
                let name = self.lex_identifier();
                Ok((Tok::Var(name), at))
            }
            c if SYMBOL_CHARS.contains(c) => {
                let mut run = String::new();
                while let Some(c) = self.peek_char() {
                    if SYMBOL_CHARS.contains(c) {
                        run.push(c);
                        self.bump();
                    } else {
                        break;
                    }
                }
                // A lone dot before layout or EOF ends the clause.
                if run == "." {
                    let ends = matches!(self.peek_char(), None | Some('%'))
                        || self.peek_char().is_some_and(|c| c.is_whitespace());
                    if ends {
                        return Ok((Tok::Dot, at));
                    }
                }
                Ok((self.atomish(run), at))
            }
            other => Err(ReadError::UnexpectedChar(other, at)),
        }
    }

    /// An atom token, upgraded to a functor when `(` follows directly.
    fn atomish(&self, name: String) -> Tok {
        if self.peek_char() == Some('(') {
            Tok::Functor(name)
        } else {
            Tok::Atom(name)
        }
    }

    fn lex_identifier(&mut self) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek_char() {
            if c.is_ascii_alphanumeric() || c == '_' {
                out.push(c);
                self.bump();
            } else {
                break;
            }
        }
        out
    }

    fn lex_quoted(&mut self, quote: char, start: usize) -> Result<String, ReadError> {
        let mut out = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => {
                    // Doubled quote is an escaped quote.
                    if self.peek_char() == Some(quote) {
                        self.bump();
                        out.push(quote);
                        continue;
                    }
                    return Ok(out);
                }
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some(c) => out.push(c),
                    None => return Err(ReadError::UnterminatedQuote(start)),
                },
                Some(c) => out.push(c),
                None => return Err(ReadError::UnterminatedQuote(start)),
            }
        }
    }

    fn lex_number(&mut self, at: usize) -> Result<(Tok, usize), ReadError> {
        let mut text = String::new();
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }

        let mut is_float = false;
        if self.peek_char() == Some('.') && self.char_at(1).is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            text.push('.');
            self.bump();
            while let Some(c) = self.peek_char() {
                if c.is_ascii_digit() {
                    text.push(c);
                    self.bump();
                } else {
                    break;
                }
            }
        }
        if matches!(self.peek_char(), Some('e') | Some('E')) {
            let mut offset = 1;
            if matches!(self.char_at(1), Some('+') | Some('-')) {
                offset = 2;
            }
            if self.char_at(offset).is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                for _ in 0..offset {
                    text.push(self.bump().unwrap());
                }
                while let Some(c) = self.peek_char() {
                    if c.is_ascii_digit() {
                        text.push(c);
                        self.bump();
                    } else {
                        break;
                    }
                }
            }
        }

        if is_float {
            // The writer's special spellings are float suffixes: `1.0Inf`
            // is infinity, `1.5NaN` is NaN. The mantissa only carries the
            // sign, which the prefix-minus fold has already peeled off.
            if self.eat_float_suffix("Inf") {
                return Ok((Tok::Float(f64::INFINITY), at));
            }
            if self.eat_float_suffix("NaN") {
                return Ok((Tok::Float(f64::NAN), at));
            }
            match text.parse::<f64>() {
                Ok(f) => Ok((Tok::Float(f), at)),
                Err(_) => Err(ReadError::BadNumber(at)),
            }
        } else {
            match text.parse::<i64>() {
                Ok(i) => Ok((Tok::Int(i), at)),
                Err(_) => Err(ReadError::BadNumber(at)),
            }
        }
    }

    /// Consume `suffix` if it follows the float digits exactly and is not
    /// the start of a longer identifier (`1.0Infinity` stays a float and
    /// an identifier).
    fn eat_float_suffix(&mut self, suffix: &str) -> bool {
        for (i, c) in suffix.chars().enumerate() {
            if self.char_at(i) != Some(c) {
                return false;
            }
        }
        if self
            .char_at(suffix.len())
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return false;
        }
        self.pos += suffix.len();
        true
    }
}

/// An "expected X" failure, except that running out of input reports as
/// end-of-input so hosts can prompt for a continuation line.
fn expected(what: &'static str, tok: &Tok, at: usize) -> ReadError {
    if *tok == Tok::Eof {
        ReadError::UnexpectedEof
    } else {
        ReadError::Expected(what, at)
    }
}

/// Can this token begin a term? Used to decide whether a prefix operator
/// really has an operand.
fn starts_term(tok: &Tok) -> bool {
    matches!(
        tok,
        Tok::Atom(_)
            | Tok::Functor(_)
            | Tok::Var(_)
            | Tok::Int(_)
            | Tok::Float(_)
            | Tok::Str(_)
            | Tok::Open
            | Tok::OpenList
            | Tok::OpenBrace
    )
}

/// `(precedence, right-operand max)` for the infix operators the engine
/// recognizes. xfx operators bind their right side one level tighter.
fn infix_op(name: &str) -> Option<(u16, u16)> {
    Some(match name {
        ":-" | "-->" => (1200, 1199),
        ";" => (1100, 1100),
        "->" => (1050, 1050),
        "=" | "\\=" | "<" | ">" | "=<" | ">=" | "=:=" | "=\\=" | "is" => (700, 699),
        "+" | "-" => (500, 499),
        "*" | "/" | "//" | "div" | "mod" | "rem" => (400, 399),
        _ => return None,
    })
}
