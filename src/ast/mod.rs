use std::fmt;

/// One compilation unit of the input language, as produced by an external
/// front end. Serializable so front ends can hand us the tree as JSON.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Stmt {
    Expression(Expr),
    VarDeclaration {
        declarators: Vec<VarDeclarator>,
    },
    FunctionDeclaration {
        name: String,
        parameters: Vec<Parameter>,
        return_type: Option<TypeAnn>,
        body: Vec<Stmt>,
    },
    Block {
        statements: Vec<Stmt>,
    },
    If {
        condition: Box<Expr>,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        condition: Box<Expr>,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        condition: Box<Expr>,
    },
    For {
        initializer: Option<Box<Stmt>>,
        condition: Option<Box<Expr>>,
        increment: Option<Box<Expr>>,
        body: Box<Stmt>,
    },
    ForOf {
        binding: String,
        iterable: Box<Expr>,
        body: Box<Stmt>,
    },
    ForIn {
        binding: String,
        object: Box<Expr>,
        body: Box<Stmt>,
    },
    Return {
        value: Option<Box<Expr>>,
    },
    // Present in the input grammar but outside the supported subset; the
    // transpiler reports these instead of miscompiling them.
    Throw {
        value: Box<Expr>,
    },
    ClassDeclaration {
        name: String,
    },
}

impl Stmt {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Stmt::Expression(_) => "expression statement",
            Stmt::VarDeclaration { .. } => "variable declaration",
            Stmt::FunctionDeclaration { .. } => "function declaration",
            Stmt::Block { .. } => "block",
            Stmt::If { .. } => "if statement",
            Stmt::While { .. } => "while statement",
            Stmt::DoWhile { .. } => "do-while statement",
            Stmt::For { .. } => "for statement",
            Stmt::ForOf { .. } => "for-of statement",
            Stmt::ForIn { .. } => "for-in statement",
            Stmt::Return { .. } => "return statement",
            Stmt::Throw { .. } => "throw statement",
            Stmt::ClassDeclaration { .. } => "class declaration",
        }
    }
}

/// A single `name [: type] [= init]` inside a `let`/`var` statement. One
/// statement may carry several declarators (`let i = 0, j = 0;`).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct VarDeclarator {
    pub name: String,
    pub type_ann: Option<TypeAnn>,
    pub initializer: Option<Expr>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Parameter {
    pub name: String,
    pub type_ann: Option<TypeAnn>,
}

/// Source-level type annotations, the contract the external type oracle
/// answers in. Whatever the front end could not resolve arrives as `Any`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum TypeAnn {
    Number,
    Boolean,
    String,
    Array {
        element: Box<TypeAnn>,
        /// A literal capacity bound, when the annotation carries one.
        capacity: Option<i64>,
    },
    Object {
        fields: Vec<(String, TypeAnn)>,
    },
    Any,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Expr {
    Identifier(String),
    Literal(Literal),
    Binary {
        left: Box<Expr>,
        operator: BinaryOp,
        right: Box<Expr>,
    },
    Prefix {
        operator: PrefixOp,
        operand: Box<Expr>,
    },
    Postfix {
        operator: PostfixOp,
        operand: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        arguments: Vec<Expr>,
    },
    Member {
        object: Box<Expr>,
        property: String,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    ArrayLiteral {
        elements: Vec<Expr>,
    },
    ObjectLiteral {
        properties: Vec<(String, Expr)>,
    },
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Literal {
    Number(i64),
    /// `raw` is the text between the quote characters with source escapes
    /// intact; `single_quoted` records which quote kind the source used.
    String { raw: String, single_quoted: bool },
    Boolean(bool),
    Null,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum BinaryOp {
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    EqualEqual,
    StrictEqual,
    NotEqual,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    And,
    Or,
    Assign,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum PrefixOp {
    Not,
    Negate,
    TypeOf,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum PostfixOp {
    Increment,
    Decrement,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryOp::Less => write!(f, "<"),
            BinaryOp::LessEqual => write!(f, "<="),
            BinaryOp::Greater => write!(f, ">"),
            BinaryOp::GreaterEqual => write!(f, ">="),
            BinaryOp::EqualEqual => write!(f, "=="),
            BinaryOp::StrictEqual => write!(f, "==="),
            BinaryOp::NotEqual => write!(f, "!="),
            BinaryOp::Plus => write!(f, "+"),
            BinaryOp::Minus => write!(f, "-"),
            BinaryOp::Star => write!(f, "*"),
            BinaryOp::Slash => write!(f, "/"),
            BinaryOp::Percent => write!(f, "%"),
            BinaryOp::And => write!(f, "&&"),
            BinaryOp::Or => write!(f, "||"),
            BinaryOp::Assign => write!(f, "="),
        }
    }
}

impl fmt::Display for PrefixOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrefixOp::Not => write!(f, "!"),
            PrefixOp::Negate => write!(f, "-"),
            PrefixOp::TypeOf => write!(f, "typeof"),
        }
    }
}

impl fmt::Display for PostfixOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostfixOp::Increment => write!(f, "++"),
            PostfixOp::Decrement => write!(f, "--"),
        }
    }
}
