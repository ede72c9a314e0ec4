use std::rc::Rc;

use smallvec::SmallVec;

use strum::Display;

/// A binary operator of the expression grammar.
///
/// `Incr`/`Decr` never appear in [`Expr::Binary`]; the parser folds them
/// into [`Expr::IncDec`] nodes with an explicit prefix flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub(crate) enum Op {
    #[strum(serialize = "=")]
    Assign,
    #[strum(serialize = "||")]
    Or,
    #[strum(serialize = "&&")]
    And,
    /// Non-short-circuiting boolean AND.
    #[strum(serialize = "&")]
    AndStrict,
    #[strum(serialize = "==")]
    Eq,
    #[strum(serialize = "!=")]
    Ne,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = "<=")]
    Le,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = ">=")]
    Ge,
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "/")]
    Div,
    #[strum(serialize = "%")]
    Mod,
    #[strum(serialize = "^")]
    Pow,
    #[strum(serialize = "++")]
    Incr,
    #[strum(serialize = "--")]
    Decr,
}

impl Op {
    pub fn from_text(text: &str) -> Option<Self> {
        Some(match text {
            "=" => Self::Assign,
            "||" => Self::Or,
            "&&" => Self::And,
            "&" => Self::AndStrict,
            "==" => Self::Eq,
            "!=" => Self::Ne,
            "<" => Self::Lt,
            "<=" => Self::Le,
            ">" => Self::Gt,
            ">=" => Self::Ge,
            "+" => Self::Add,
            "-" => Self::Sub,
            "*" => Self::Mul,
            "/" => Self::Div,
            "%" => Self::Mod,
            "^" => Self::Pow,
            "++" => Self::Incr,
            "--" => Self::Decr,
            _ => return None,
        })
    }

    /// Binding strength, lowest to highest. Assignment sits below the
    /// logical tier and is the only right-associative operator.
    pub fn precedence(self) -> u8 {
        match self {
            Self::Assign => 0,
            Self::Or | Self::And | Self::AndStrict => 1,
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge => 2,
            Self::Add | Self::Sub => 3,
            Self::Mul | Self::Div | Self::Mod => 4,
            Self::Pow | Self::Incr | Self::Decr => 5,
        }
    }

    pub fn right_associative(self) -> bool {
        self == Self::Assign
    }
}

/// One step of an identifier path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Accessor {
    /// `.name`, or `[name]` where the index is resolved through scope.
    Field(String),
    /// `[3]`.
    Index(usize),
}

/// An identifier: a base name plus an ordered accessor path into nested
/// containers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Ident {
    pub name: String,
    pub path: SmallVec<[Accessor; 2]>,
}

impl Ident {
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: SmallVec::new(),
        }
    }
}

/// A declared function parameter: name plus optional type annotation
/// (`NAME is TYPE`). Unannotated parameters dispatch as `any`.
#[derive(Debug, Clone)]
pub(crate) struct ArgDecl {
    pub name: String,
    pub type_name: Option<String>,
}

/// A field initializer in a `new` expression.
#[derive(Debug, Clone)]
pub(crate) struct Initializer {
    pub name: String,
    pub expr: Expr,
}

/// One argument at a call site; `expand` marks a trailing `...`.
#[derive(Debug, Clone)]
pub(crate) struct CallArg {
    pub expr: Expr,
    pub expand: bool,
}

/// A member declaration inside an `object` definition. The initializer is
/// shared with the type registry, which evaluates it per instantiation.
#[derive(Debug, Clone)]
pub(crate) struct MemberDecl {
    pub name: String,
    pub init: Option<Rc<Expr>>,
}

#[derive(Debug, Clone)]
pub(crate) enum Expr {
    /// Number literal.
    Number(f64),
    /// String literal.
    Text(String),
    /// Identifier read (base name plus accessor path).
    Ident(Ident),
    Binary {
        op: Op,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Assignment; the left operand must have resolved to an identifier
    /// path. Evaluates to the assigned value.
    Assign {
        target: Ident,
        value: Box<Expr>,
    },
    /// Function application by bare name.
    Call {
        name: String,
        args: Vec<CallArg>,
    },
    /// Prefix or postfix `++`/`--` on an identifier path.
    IncDec {
        op: Op,
        prefix: bool,
        target: Ident,
    },
    /// `&NAME`: a name handle, evaluating to the string `NAME`.
    FnAddr(String),
    /// `new { NAME = EXPR, ... }`.
    NewBlob(Vec<Initializer>),
    /// `new [ EXPR, ... ]`.
    NewArray(Vec<Expr>),
    /// `new TYPE { NAME = EXPR, ... }`.
    NewInstance {
        type_name: String,
        inits: Vec<Initializer>,
    },
}

#[derive(Debug, Clone)]
pub(crate) enum Stmt {
    /// Expression statement; the value is discarded.
    Expr(Expr),
    /// `let NAME [= EXPR] ;` — binds a new slot in the current scope.
    Let {
        name: String,
        expr: Option<Expr>,
    },
    If {
        cond: Expr,
        body: Box<Stmt>,
        /// `else` branch; an `else if` chain nests another `If` here.
        orelse: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    For {
        init: Box<Stmt>,
        cond: Expr,
        step: Expr,
        body: Box<Stmt>,
    },
    /// `def NAME ( ARG_LIST ) STATEMENT` — top-level only.
    Def {
        name: String,
        args: Vec<ArgDecl>,
        body: Rc<Stmt>,
    },
    Return(Option<Expr>),
    /// Brace-delimited statement sequence. Does not open a scope by
    /// itself; `if`/`while`/`for` scope their bodies.
    Block(Vec<Stmt>),
    /// `object NAME [inherits PARENT] { MEMBERS }`.
    ObjectDef {
        name: String,
        parent: Option<String>,
        members: Vec<MemberDecl>,
    },
    /// `@import NAME`.
    Import(String),
    /// `@loadlib "PATH"` — reserved, host-defined.
    LoadLib(String),
}
