use std::{fmt::Display, rc::Rc};

use crate::token::TokenKind;

/// Binding powers, from loosest to tightest.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    Lowest,
    Assign,
    Comma,
    Range,
    Cast,
    Logical,
    Relational,
    Additive,
    Multiplicative,
    Exponent,
    Unary,
    Call,
    Member,
    Primary,
}

impl Precedence {
    /// Table-driven ordering between two binding powers.
    pub fn compare(self, other: Self) -> std::cmp::Ordering {
        self.cmp(&other)
    }

    /// The binding power one step looser than `self`, used to
    /// make an operator right associative.
    pub fn lower(self) -> Self {
        match self {
            Self::Lowest | Self::Assign => Self::Lowest,
            Self::Comma => Self::Assign,
            Self::Range => Self::Comma,
            Self::Cast => Self::Range,
            Self::Logical => Self::Cast,
            Self::Relational => Self::Logical,
            Self::Additive => Self::Relational,
            Self::Multiplicative => Self::Additive,
            Self::Exponent => Self::Multiplicative,
            Self::Unary => Self::Exponent,
            Self::Call => Self::Unary,
            Self::Member => Self::Call,
            Self::Primary => Self::Member,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Bang,
    Minus,
    Plus,
}

impl UnaryOp {
    pub fn from_token(t: TokenKind) -> Option<Self> {
        let op = match t {
            TokenKind::BANG => Self::Bang,
            TokenKind::MINUS => Self::Minus,
            TokenKind::PLUS => Self::Plus,
            _ => return None,
        };
        Some(op)
    }
}

impl Display for UnaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Bang => "!",
            Self::Minus => "-",
            Self::Plus => "+",
        })
    }
}

/// Postfix `++` and `--`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UpdateOp {
    Increment,
    Decrement,
}

impl UpdateOp {
    pub fn from_token(t: TokenKind) -> Option<Self> {
        let op = match t {
            TokenKind::INCREMENT => Self::Increment,
            TokenKind::DECREMENT => Self::Decrement,
            _ => return None,
        };
        Some(op)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinOp {
    Plus,
    Minus,
    Star,
    Slash,
    SlashSlash,
    Modulo,
    StarStar,
    And,
    Or,
    Xor,
    EqualEqual,
    BangEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl Display for BinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::Slash => "/",
            Self::SlashSlash => "//",
            Self::Modulo => "%",
            Self::StarStar => "**",
            Self::And => "&&",
            Self::Or => "||",
            Self::Xor => "^^",
            Self::EqualEqual => "==",
            Self::BangEqual => "!=",
            Self::Less => "<",
            Self::LessEqual => "<=",
            Self::Greater => ">",
            Self::GreaterEqual => ">=",
        })
    }
}

impl BinOp {
    pub fn from_token(t: TokenKind) -> Option<Self> {
        let op = match t {
            TokenKind::PLUS => Self::Plus,
            TokenKind::MINUS => Self::Minus,
            TokenKind::STAR => Self::Star,
            TokenKind::SLASH => Self::Slash,
            TokenKind::SLASH_SLASH => Self::SlashSlash,
            TokenKind::MODULO => Self::Modulo,
            TokenKind::STAR_STAR => Self::StarStar,
            TokenKind::AND_AND => Self::And,
            TokenKind::OR_OR => Self::Or,
            TokenKind::CARET_CARET => Self::Xor,
            TokenKind::EQUAL_EQUAL => Self::EqualEqual,
            TokenKind::BANG_EQUAL => Self::BangEqual,
            TokenKind::LESS => Self::Less,
            TokenKind::LESS_EQUAL => Self::LessEqual,
            TokenKind::GREATER => Self::Greater,
            TokenKind::GREATER_EQUAL => Self::GreaterEqual,
            _ => return None,
        };
        Some(op)
    }

    /// The operator applied by a reassignment token such as `+=`.
    pub fn from_reassign_token(t: TokenKind) -> Option<Self> {
        let op = match t {
            TokenKind::PLUS_EQUAL => Self::Plus,
            TokenKind::MINUS_EQUAL => Self::Minus,
            TokenKind::STAR_EQUAL => Self::Star,
            TokenKind::SLASH_EQUAL => Self::Slash,
            TokenKind::SLASH_SLASH_EQUAL => Self::SlashSlash,
            TokenKind::MODULO_EQUAL => Self::Modulo,
            TokenKind::STAR_STAR_EQUAL => Self::StarStar,
            TokenKind::AND_AND_EQUAL => Self::And,
            TokenKind::OR_OR_EQUAL => Self::Or,
            TokenKind::CARET_CARET_EQUAL => Self::Xor,
            _ => return None,
        };
        Some(op)
    }

    pub fn precedence(self) -> Precedence {
        match self {
            Self::And | Self::Or | Self::Xor => Precedence::Logical,
            Self::EqualEqual
            | Self::BangEqual
            | Self::Less
            | Self::LessEqual
            | Self::Greater
            | Self::GreaterEqual => Precedence::Relational,
            Self::Plus | Self::Minus => Precedence::Additive,
            Self::Star | Self::Slash | Self::SlashSlash | Self::Modulo => {
                Precedence::Multiplicative
            }
            Self::StarStar => Precedence::Exponent,
        }
    }

    pub fn is_right_assoc(self) -> bool {
        self == Self::StarStar
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Boolean(bool),
    Null,
}

/// A function body shared between the tree and every function
/// value created from it.
pub type Body = Rc<[Item]>;

#[derive(Clone, Debug, PartialEq)]
pub struct FuncDecl {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: Body,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Ident(String),
    List(Vec<Expr>),
    Map(Vec<(Expr, Expr)>),
    Range {
        start: Box<Expr>,
        stop: Box<Expr>,
        step: Option<Box<Expr>>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        lhs: Box<Expr>,
        op: BinOp,
        rhs: Box<Expr>,
    },
    Cast {
        expr: Box<Expr>,
        ty: Box<Expr>,
    },
    FieldGet {
        object: Box<Expr>,
        field: String,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Assignment {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Reassignment {
        target: Box<Expr>,
        op: BinOp,
        value: Box<Expr>,
    },
    Update {
        target: Box<Expr>,
        op: UpdateOp,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
    },
    Func(FuncDecl),
}

impl Expr {
    /// Only variables, fields and indexed elements can be assigned to.
    pub fn is_assignable(&self) -> bool {
        matches!(
            self,
            Self::Ident(_) | Self::FieldGet { .. } | Self::Index { .. }
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Case {
    pub values: Vec<Expr>,
    pub body: Vec<Item>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Item {
    ExprStmt(Expr),
    VarStmt {
        name: String,
        init: Option<Expr>,
    },
    ConstStmt {
        name: String,
        value: Expr,
    },
    Function(FuncDecl),
    IfStmt {
        condition: Expr,
        if_block: Vec<Item>,
        else_item: Option<Box<Item>>,
    },
    WhileStmt {
        condition: Expr,
        body: Vec<Item>,
    },
    ForStmt {
        ident: String,
        iterable: Expr,
        body: Vec<Item>,
    },
    SwitchStmt {
        subject: Expr,
        cases: Vec<Case>,
        default: Option<Vec<Item>>,
    },
    ReturnStmt(Option<Expr>),
    DeferStmt(Expr),
    Break,
    Continue,
    Fallthrough,
    Block(Vec<Item>),
}

/// A parsed compilation unit.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Source {
    pub items: Vec<Item>,
}
