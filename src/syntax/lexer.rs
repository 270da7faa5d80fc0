//! Lexer for C#-style sources using logos
//!
//! Unlike a compiler lexer nothing is skipped: whitespace, newlines,
//! comments and preprocessor lines come back as trivia tokens so the tree
//! built on top of them can reproduce the source byte for byte.

use logos::Logos;

use crate::error::{ParseError, Span};

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
    // Trivia
    #[regex(r"[ \t\x0C\u{FEFF}]+")]
    Whitespace,
    #[regex(r"\r\n|\n|\r")]
    Newline,
    #[regex(r"//[^\r\n]*")]
    LineComment,
    #[regex(r"/\*([^*]|\*+[^*/])*\*+/")]
    BlockComment,
    #[regex(r"#[^\r\n]*")]
    Directive,

    // Declaration keywords
    #[token("namespace")]
    Namespace,
    #[token("using")]
    Using,
    #[token("class")]
    Class,
    #[token("struct")]
    Struct,
    #[token("interface")]
    Interface,
    #[token("record")]
    Record,
    #[token("enum")]
    Enum,
    #[token("delegate")]
    Delegate,
    #[token("operator")]
    Operator,
    #[token("this")]
    This,

    // Modifiers share one kind; the grammar never needs to tell them apart
    #[token("public")]
    #[token("private")]
    #[token("protected")]
    #[token("internal")]
    #[token("static")]
    #[token("readonly")]
    #[token("const")]
    #[token("virtual")]
    #[token("override")]
    #[token("abstract")]
    #[token("sealed")]
    #[token("partial")]
    #[token("async")]
    #[token("extern")]
    #[token("volatile")]
    #[token("event")]
    #[token("new")]
    #[token("ref")]
    Modifier,
    /// `unsafe` is both a modifier and a statement keyword
    #[token("unsafe")]
    Unsafe,

    // Statement keywords
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("for")]
    For,
    #[token("foreach")]
    ForEach,
    #[token("while")]
    While,
    #[token("do")]
    Do,
    #[token("switch")]
    Switch,
    #[token("case")]
    Case,
    #[token("default")]
    Default,
    #[token("try")]
    Try,
    #[token("catch")]
    Catch,
    #[token("finally")]
    Finally,
    #[token("throw")]
    Throw,
    #[token("return")]
    Return,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("goto")]
    Goto,
    #[token("lock")]
    Lock,
    #[token("fixed")]
    Fixed,

    // Punctuation the grammar looks at
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(";")]
    Semicolon,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token(":")]
    Colon,
    #[token("::")]
    ColonColon,
    #[token("?")]
    Question,
    #[token("=")]
    Eq,
    #[token("=>")]
    FatArrow,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("*")]
    Star,
    #[token("~")]
    Tilde,

    // Every other operator; `>>` is deliberately absent so nested generic
    // argument lists close one `>` at a time
    #[token("==")]
    #[token("!=")]
    #[token("<=")]
    #[token(">=")]
    #[token("!")]
    #[token("+")]
    #[token("++")]
    #[token("+=")]
    #[token("-")]
    #[token("--")]
    #[token("-=")]
    #[token("->")]
    #[token("*=")]
    #[token("/")]
    #[token("/=")]
    #[token("%")]
    #[token("%=")]
    #[token("&")]
    #[token("&&")]
    #[token("&=")]
    #[token("|")]
    #[token("||")]
    #[token("|=")]
    #[token("^")]
    #[token("^=")]
    #[token("<<")]
    #[token("<<=")]
    #[token("??")]
    #[token("??=")]
    #[token("?.")]
    #[token("..")]
    Punct,

    // Literals - identifiers must come after keywords
    #[regex(r"@?[A-Za-z_][A-Za-z0-9_]*", priority = 1)]
    Ident,

    #[regex(r"[0-9][0-9_]*(\.[0-9][0-9_]*)?([eE][+-]?[0-9]+)?[A-Za-z]*")]
    #[regex(r"0[xXbB][0-9A-Fa-f_]+[A-Za-z]*")]
    Number,

    #[regex(r#""([^"\\\r\n]|\\.)*""#)]
    #[regex(r#"@"([^"]|"")*""#)]
    #[regex(r#"\$"([^"\\\r\n]|\\.)*""#)]
    #[regex(r#"(\$@|@\$)"([^"]|"")*""#)]
    #[regex(r"'([^'\\\r\n]|\\.)*'")]
    Literal,
}

impl Token {
    /// Whether this token is trivia rather than part of the grammar.
    pub fn is_trivia(self) -> bool {
        matches!(
            self,
            Token::Whitespace
                | Token::Newline
                | Token::LineComment
                | Token::BlockComment
                | Token::Directive
        )
    }
}

/// Lex input into tokens with byte spans, trivia included.
///
/// Fails on the first byte sequence no token matches, e.g. an unterminated
/// string literal.
pub fn lex(input: &str) -> Result<Vec<(Token, Span)>, ParseError> {
    let mut tokens = Vec::new();
    for (result, span) in Token::lexer(input).spanned() {
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => {
                return Err(ParseError::Lex {
                    found: input[span.clone()].to_string(),
                    span,
                })
            }
        }
    }
    Ok(tokens)
}
