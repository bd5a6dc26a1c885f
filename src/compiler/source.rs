//! Declarations read from unit source forms.

use super::sexpr::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pos {
    pub line: usize,
    pub column: usize,
}

impl Pos {
    pub fn of(node: &Node) -> Self {
        Self {
            line: node.line,
            column: node.column,
        }
    }
}

/// An error tied to a source position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    pub pos: Pos,
    pub message: String,
}

impl Located {
    pub fn new(pos: Pos, message: impl Into<String>) -> Self {
        Self {
            pos,
            message: message.into(),
        }
    }

    fn at(node: &Node, message: impl Into<String>) -> Self {
        Self::new(Pos::of(node), message)
    }
}

#[derive(Debug, Clone)]
pub enum UnitDecl {
    Lexer(LexerDecl),
    Parser(ParserDecl),
    Library(LibraryDecl),
}

impl UnitDecl {
    pub fn name(&self) -> &str {
        match self {
            UnitDecl::Lexer(d) => &d.name,
            UnitDecl::Parser(d) => &d.name,
            UnitDecl::Library(d) => &d.name,
        }
    }

    pub fn pos(&self) -> Pos {
        match self {
            UnitDecl::Lexer(d) => d.pos,
            UnitDecl::Parser(d) => d.pos,
            UnitDecl::Library(d) => d.pos,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LexerDecl {
    pub name: String,
    pub pos: Pos,
    pub grammar: String,
    pub case_insensitive: bool,
    pub extends: Option<(String, Pos)>,
    pub channels: Vec<String>,
    pub modes: Vec<String>,
    pub tokens: Vec<TokenDecl>,
    pub rules: Vec<LexRuleDecl>,
    pub fragments: Vec<FragmentDecl>,
}

#[derive(Debug, Clone)]
pub struct TokenDecl {
    pub token_type: i32,
    pub name: String,
    pub literal: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LexRuleDecl {
    pub name: String,
    pub pos: Pos,
    pub token_type: i32,
    pub mode: String,
    pub alts: Vec<LexAlt>,
}

#[derive(Debug, Clone)]
pub struct LexAlt {
    pub exprs: Vec<Expr>,
    pub commands: Vec<(CommandDecl, Pos)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandDecl {
    Skip,
    More,
    PopMode,
    Channel(String),
    Type(String),
    Mode(String),
    PushMode(String),
}

#[derive(Debug, Clone)]
pub struct FragmentDecl {
    pub name: String,
    pub pos: Pos,
    pub alts: Vec<Vec<Expr>>,
}

#[derive(Debug, Clone)]
pub struct ParserDecl {
    pub name: String,
    pub pos: Pos,
    pub grammar: String,
    pub vocab: (String, Pos),
    pub extends: Option<(String, Pos)>,
    pub start: Option<(String, Pos)>,
    pub rules: Vec<ParseRuleDecl>,
}

#[derive(Debug, Clone)]
pub struct ParseRuleDecl {
    pub name: String,
    pub pos: Pos,
    pub body: ParseRuleBody,
}

#[derive(Debug, Clone)]
pub enum ParseRuleBody {
    Plain(Vec<Vec<Expr>>),
    LeftRecursive {
        primaries: Vec<Vec<Expr>>,
        suffixes: Vec<(u32, Vec<Expr>)>,
    },
}

#[derive(Debug, Clone)]
pub struct LibraryDecl {
    pub name: String,
    pub pos: Pos,
    pub fragments: Vec<FragmentDecl>,
    pub rules: Vec<ParseRuleDecl>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    Optional,
    Star,
    Plus,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Empty,
    Seq(Vec<Expr>),
    Choice(Vec<Expr>),
    Repeat {
        kind: Repeat,
        lazy: bool,
        body: Box<Expr>,
    },
    Lit(String, Pos),
    Set {
        ranges: Vec<(u32, u32)>,
        negated: bool,
    },
    Any,
    Ref(String, Pos),
    Tok(String, Pos),
    NotTok(Vec<String>, Pos),
    Eof,
    Invoke(String, u32, Pos),
}

/// Interpret the forms of one unit source
pub fn parse_unit(forms: &[Node]) -> Result<UnitDecl, Located> {
    let form = match forms {
        [form] => form,
        [] => return Err(Located::new(Pos { line: 1, column: 0 }, "empty unit source")),
        [_, extra, ..] => return Err(Located::at(extra, "unexpected second top-level form")),
    };
    match form.head() {
        Some("lexer") => lexer(form).map(UnitDecl::Lexer),
        Some("parser") => parser(form).map(UnitDecl::Parser),
        Some("library") => library(form).map(UnitDecl::Library),
        _ => Err(Located::at(form, "expected (lexer ...), (parser ...) or (library ...)")),
    }
}

fn string_at(form: &Node, index: usize, what: &str) -> Result<String, Located> {
    form.args()
        .get(index)
        .and_then(Node::as_str)
        .map(str::to_string)
        .ok_or_else(|| Located::at(form, format!("expected {} string", what)))
}

fn int_at(form: &Node, index: usize, what: &str) -> Result<i64, Located> {
    form.args()
        .get(index)
        .and_then(Node::as_int)
        .ok_or_else(|| Located::at(form, format!("expected {} integer", what)))
}

fn strings(form: &Node) -> Result<Vec<String>, Located> {
    form.args()
        .iter()
        .map(|n| {
            n.as_str()
                .map(str::to_string)
                .ok_or_else(|| Located::at(n, "expected string"))
        })
        .collect()
}

fn lexer(form: &Node) -> Result<LexerDecl, Located> {
    let mut decl = LexerDecl {
        name: string_at(form, 0, "lexer name")?,
        pos: Pos::of(form),
        grammar: String::new(),
        case_insensitive: false,
        extends: None,
        channels: Vec::new(),
        modes: Vec::new(),
        tokens: Vec::new(),
        rules: Vec::new(),
        fragments: Vec::new(),
    };

    for clause in &form.args()[1..] {
        match clause.head() {
            Some("grammar") => decl.grammar = string_at(clause, 0, "grammar name")?,
            Some("case-insensitive") => decl.case_insensitive = true,
            Some("extends") => decl.extends = Some((string_at(clause, 0, "unit name")?, Pos::of(clause))),
            Some("channels") => decl.channels = strings(clause)?,
            Some("modes") => decl.modes = strings(clause)?,
            Some("token") => {
                let token_type = int_at(clause, 0, "token type")?;
                decl.tokens.push(TokenDecl {
                    token_type: i32::try_from(token_type)
                        .map_err(|_| Located::at(clause, "token type out of range"))?,
                    name: string_at(clause, 1, "token name")?,
                    literal: clause.args().get(2).and_then(Node::as_str).map(str::to_string),
                });
            }
            Some("rule") => {
                let token_type = int_at(clause, 1, "token type")?;
                let mut alts = Vec::new();
                for alt in &clause.args()[3.min(clause.args().len())..] {
                    alts.push(lexer_alt(alt)?);
                }
                decl.rules.push(LexRuleDecl {
                    name: string_at(clause, 0, "rule name")?,
                    pos: Pos::of(clause),
                    token_type: i32::try_from(token_type)
                        .map_err(|_| Located::at(clause, "token type out of range"))?,
                    mode: string_at(clause, 2, "mode name")?,
                    alts,
                });
            }
            Some("fragment") => decl.fragments.push(fragment(clause)?),
            _ => return Err(Located::at(clause, "unknown lexer clause")),
        }
    }

    if decl.modes.is_empty() {
        decl.modes.push(crate::tool::DEFAULT_MODE.to_string());
    }
    Ok(decl)
}

fn lexer_alt(form: &Node) -> Result<LexAlt, Located> {
    if form.head() != Some("alt") {
        return Err(Located::at(form, "expected (alt ...)"));
    }
    let mut alt = LexAlt {
        exprs: Vec::new(),
        commands: Vec::new(),
    };
    for item in form.args() {
        let command = match item.head() {
            Some("skip") => Some(CommandDecl::Skip),
            Some("more") => Some(CommandDecl::More),
            Some("pop-mode") => Some(CommandDecl::PopMode),
            Some("channel") => Some(CommandDecl::Channel(string_or_int(item)?)),
            Some("type") => Some(CommandDecl::Type(string_at(item, 0, "token name")?)),
            Some("mode") => Some(CommandDecl::Mode(string_at(item, 0, "mode name")?)),
            Some("push-mode") => Some(CommandDecl::PushMode(string_at(item, 0, "mode name")?)),
            _ => None,
        };
        match command {
            Some(command) => alt.commands.push((command, Pos::of(item))),
            None if alt.commands.is_empty() => alt.exprs.push(expr(item)?),
            None => return Err(Located::at(item, "expression after lexer command")),
        }
    }
    Ok(alt)
}

fn string_or_int(form: &Node) -> Result<String, Located> {
    match form.args().first() {
        Some(arg) => arg
            .as_str()
            .map(str::to_string)
            .or_else(|| arg.as_int().map(|n| n.to_string()))
            .ok_or_else(|| Located::at(arg, "expected channel name or number")),
        None => Err(Located::at(form, "missing argument")),
    }
}

fn alternatives(forms: &[Node]) -> Result<Vec<Vec<Expr>>, Located> {
    forms
        .iter()
        .map(|form| {
            if form.head() != Some("alt") {
                return Err(Located::at(form, "expected (alt ...)"));
            }
            form.args().iter().map(expr).collect()
        })
        .collect()
}

fn fragment(form: &Node) -> Result<FragmentDecl, Located> {
    Ok(FragmentDecl {
        name: string_at(form, 0, "fragment name")?,
        pos: Pos::of(form),
        alts: alternatives(&form.args()[1.min(form.args().len())..])?,
    })
}

fn parser(form: &Node) -> Result<ParserDecl, Located> {
    let name = string_at(form, 0, "parser name")?;
    let mut grammar = String::new();
    let mut vocab = None;
    let mut extends = None;
    let mut start = None;
    let mut rules = Vec::new();

    for clause in &form.args()[1..] {
        match clause.head() {
            Some("grammar") => grammar = string_at(clause, 0, "grammar name")?,
            Some("vocab") => vocab = Some((string_at(clause, 0, "lexer name")?, Pos::of(clause))),
            Some("extends") => extends = Some((string_at(clause, 0, "unit name")?, Pos::of(clause))),
            Some("start") => start = Some((string_at(clause, 0, "rule name")?, Pos::of(clause))),
            Some("rule") | Some("lrule") => rules.push(parser_rule(clause)?),
            _ => return Err(Located::at(clause, "unknown parser clause")),
        }
    }

    Ok(ParserDecl {
        name,
        pos: Pos::of(form),
        grammar,
        vocab: vocab.ok_or_else(|| Located::at(form, "parser has no (vocab ...) clause"))?,
        extends,
        start,
        rules,
    })
}

fn parser_rule(form: &Node) -> Result<ParseRuleDecl, Located> {
    let name = string_at(form, 0, "rule name")?;
    let rest = &form.args()[1..];
    let body = if form.head() == Some("rule") {
        ParseRuleBody::Plain(alternatives(rest)?)
    } else {
        let mut primaries = Vec::new();
        let mut suffixes = Vec::new();
        for part in rest {
            match part.head() {
                Some("primary") => primaries.extend(alternatives(part.args())?),
                Some("suffix") => {
                    let precedence = u32::try_from(int_at(part, 0, "precedence")?)
                        .map_err(|_| Located::at(part, "precedence out of range"))?;
                    for alt in alternatives(&part.args()[1..])? {
                        suffixes.push((precedence, alt));
                    }
                }
                _ => return Err(Located::at(part, "expected (primary ...) or (suffix ...)")),
            }
        }
        if primaries.is_empty() {
            return Err(Located::at(form, "left-recursive rule without a primary alternative"));
        }
        ParseRuleBody::LeftRecursive {
            primaries,
            suffixes,
        }
    };
    Ok(ParseRuleDecl {
        name,
        pos: Pos::of(form),
        body,
    })
}

fn library(form: &Node) -> Result<LibraryDecl, Located> {
    let mut decl = LibraryDecl {
        name: string_at(form, 0, "library name")?,
        pos: Pos::of(form),
        fragments: Vec::new(),
        rules: Vec::new(),
    };
    for clause in &form.args()[1..] {
        match clause.head() {
            Some("fragment") => decl.fragments.push(fragment(clause)?),
            Some("rule") | Some("lrule") => decl.rules.push(parser_rule(clause)?),
            _ => return Err(Located::at(clause, "unknown library clause")),
        }
    }
    Ok(decl)
}

fn expr(node: &Node) -> Result<Expr, Located> {
    let args = node.args();
    let one = |what: &str| -> Result<Expr, Located> {
        match args {
            [only] => expr(only),
            _ => Err(Located::at(node, format!("{} takes exactly one expression", what))),
        }
    };
    let repeat = |kind: Repeat, lazy: bool| -> Result<Expr, Located> {
        Ok(Expr::Repeat {
            kind,
            lazy,
            body: Box::new(one("repetition")?),
        })
    };

    match node.head() {
        Some("empty") => Ok(Expr::Empty),
        Some("seq") => Ok(Expr::Seq(args.iter().map(expr).collect::<Result<_, _>>()?)),
        Some("choice") => Ok(Expr::Choice(args.iter().map(expr).collect::<Result<_, _>>()?)),
        Some("opt") => repeat(Repeat::Optional, false),
        Some("star") => repeat(Repeat::Star, false),
        Some("plus") => repeat(Repeat::Plus, false),
        Some("opt-lazy") => repeat(Repeat::Optional, true),
        Some("star-lazy") => repeat(Repeat::Star, true),
        Some("plus-lazy") => repeat(Repeat::Plus, true),
        Some("lit") => Ok(Expr::Lit(string_at(node, 0, "literal")?, Pos::of(node))),
        Some("set") | Some("nset") => {
            let mut ranges = Vec::with_capacity(args.len());
            for range in args {
                if range.head() != Some("range") {
                    return Err(Located::at(range, "expected (range lo hi)"));
                }
                let lo = int_at(range, 0, "range start")?;
                let hi = int_at(range, 1, "range end")?;
                match (u32::try_from(lo), u32::try_from(hi)) {
                    (Ok(lo), Ok(hi)) if lo <= hi => ranges.push((lo, hi)),
                    _ => return Err(Located::at(range, "invalid character range")),
                }
            }
            Ok(Expr::Set {
                ranges,
                negated: node.head() == Some("nset"),
            })
        }
        Some("any") => Ok(Expr::Any),
        Some("eof") => Ok(Expr::Eof),
        Some("ref") => Ok(Expr::Ref(string_at(node, 0, "rule name")?, Pos::of(node))),
        Some("tok") => Ok(Expr::Tok(string_at(node, 0, "token name")?, Pos::of(node))),
        Some("ntok") => Ok(Expr::NotTok(strings(node)?, Pos::of(node))),
        Some("invoke") => {
            let precedence = match args.get(1) {
                Some(arg) => arg
                    .as_int()
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or_else(|| Located::at(arg, "invalid precedence"))?,
                None => 0,
            };
            Ok(Expr::Invoke(string_at(node, 0, "rule name")?, precedence, Pos::of(node)))
        }
        _ => Err(Located::at(node, "unknown expression form")),
    }
}
