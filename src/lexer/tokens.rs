// ERAC - A compiler for the ERA language targeting the ERA virtual machine
// Copyright (C) 2026  Marcel Joachim Kloubert <marcel@kloubert.dev>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Token definitions for the ERA language.

use logos::Logos;

fn register_number(lex: &mut logos::Lexer<Token>) -> Option<u8> {
    lex.slice()[1..].parse::<u8>().ok().filter(|n| *n < 32)
}

fn string_content(lex: &mut logos::Lexer<Token>) -> String {
    let slice = lex.slice();
    slice[1..slice.len() - 1].to_string()
}

/// A token in the ERA language.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"([ \t\r\n\f]+|//[^\n]*)")]
pub enum Token {
    // Literals
    /// Decimal integer literal.
    #[regex("[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Integer(i64),
    /// String literal (only used by pragmas).
    #[regex(r#""[^"\n]*""#, string_content)]
    Str(String),
    /// Identifier.
    #[regex("[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Identifier(String),
    /// Register operand `R0`..`R31` or one of the named registers.
    #[regex("R[0-9]+", register_number)]
    #[token("FP", |_| 28u8)]
    #[token("SP", |_| 29u8)]
    #[token("SB", |_| 30u8)]
    #[token("PC", |_| 31u8)]
    Register(u8),

    // Unit keywords
    #[token("code")]
    Code,
    #[token("module")]
    Module,
    #[token("data")]
    Data,
    #[token("struct")]
    Struct,
    #[token("routine")]
    Routine,
    #[token("pragma")]
    Pragma,
    #[token("end")]
    End,

    // Type keywords
    #[token("int")]
    Int,
    #[token("short")]
    Short,
    #[token("byte")]
    Byte,
    #[token("const")]
    Const,

    // Statement keywords
    #[token("do")]
    Do,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("for")]
    For,
    #[token("from")]
    From,
    #[token("to")]
    To,
    #[token("step")]
    Step,
    #[token("while")]
    While,
    #[token("loop")]
    Loop,
    #[token("break")]
    Break,
    #[token("goto")]
    Goto,
    #[token("return")]
    Return,
    #[token("print")]
    Print,
    #[token("asm")]
    Asm,

    // Assembly keywords
    #[token("skip")]
    Skip,
    #[token("stop")]
    Stop,
    #[token("format")]
    Format,

    // Assignment operators
    #[token(":=")]
    Assign,
    #[token("+=")]
    PlusAssign,
    #[token("-=")]
    MinusAssign,
    #[token(">>=")]
    ShiftRightAssign,
    #[token("<<=")]
    ShiftLeftAssign,
    #[token("|=")]
    OrAssign,
    #[token("&=")]
    AndAssign,
    #[token("^=")]
    XorAssign,
    #[token("?=")]
    CompareAssign,
    #[token("<=>")]
    Swap,

    // Expression operators
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("&")]
    Ampersand,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("?")]
    Question,
    #[token("=")]
    Equal,
    #[token("/=")]
    NotEqual,
    #[token("<")]
    Less,
    #[token(">")]
    Greater,
    #[token("<=")]
    LessEqual,
    #[token(">=")]
    GreaterEqual,
    #[token("->")]
    Arrow,
    #[token("<-")]
    LeftArrow,

    // Delimiters
    #[token("(")]
    LeftParen,
    #[token(")")]
    RightParen,
    #[token("[")]
    LeftBracket,
    #[token("]")]
    RightBracket,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,
    #[token("@")]
    At,
}

impl Token {
    /// Check if this token starts a type name.
    pub fn is_type(&self) -> bool {
        matches!(self, Token::Int | Token::Short | Token::Byte)
    }

    /// Get a human-readable name for this token.
    pub fn name(&self) -> &'static str {
        match self {
            Token::Integer(_) => "integer",
            Token::Str(_) => "string",
            Token::Identifier(_) => "identifier",
            Token::Register(_) => "register",
            Token::Code => "'code'",
            Token::Module => "'module'",
            Token::Data => "'data'",
            Token::Struct => "'struct'",
            Token::Routine => "'routine'",
            Token::Pragma => "'pragma'",
            Token::End => "'end'",
            Token::Int => "'int'",
            Token::Short => "'short'",
            Token::Byte => "'byte'",
            Token::Const => "'const'",
            Token::Do => "'do'",
            Token::If => "'if'",
            Token::Else => "'else'",
            Token::For => "'for'",
            Token::From => "'from'",
            Token::To => "'to'",
            Token::Step => "'step'",
            Token::While => "'while'",
            Token::Loop => "'loop'",
            Token::Break => "'break'",
            Token::Goto => "'goto'",
            Token::Return => "'return'",
            Token::Print => "'print'",
            Token::Asm => "'asm'",
            Token::Skip => "'skip'",
            Token::Stop => "'stop'",
            Token::Format => "'format'",
            Token::Assign => "':='",
            Token::PlusAssign => "'+='",
            Token::MinusAssign => "'-='",
            Token::ShiftRightAssign => "'>>='",
            Token::ShiftLeftAssign => "'<<='",
            Token::OrAssign => "'|='",
            Token::AndAssign => "'&='",
            Token::XorAssign => "'^='",
            Token::CompareAssign => "'?='",
            Token::Swap => "'<=>'",
            Token::Plus => "'+'",
            Token::Minus => "'-'",
            Token::Star => "'*'",
            Token::Ampersand => "'&'",
            Token::Pipe => "'|'",
            Token::Caret => "'^'",
            Token::Question => "'?'",
            Token::Equal => "'='",
            Token::NotEqual => "'/='",
            Token::Less => "'<'",
            Token::Greater => "'>'",
            Token::LessEqual => "'<='",
            Token::GreaterEqual => "'>='",
            Token::Arrow => "'->'",
            Token::LeftArrow => "'<-'",
            Token::LeftParen => "'('",
            Token::RightParen => "')'",
            Token::LeftBracket => "'['",
            Token::RightBracket => "']'",
            Token::Comma => "','",
            Token::Semicolon => "';'",
            Token::Colon => "':'",
            Token::Dot => "'.'",
            Token::At => "'@'",
        }
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Integer(n) => write!(f, "{}", n),
            Token::Str(s) => write!(f, "\"{}\"", s),
            Token::Identifier(s) => write!(f, "{}", s),
            Token::Register(r) => write!(f, "R{}", r),
            _ => write!(f, "{}", self.name()),
        }
    }
}
