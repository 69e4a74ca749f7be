use std::fmt;
use std::rc::Rc;

use dncl_core::Span;

// Nodes carry the span they were parsed from (always containing every
// descendant span) and render a canonical literal used by diagnostics, the
// debugger and golden tests. Function bodies are reference-counted so that
// closure values can share them with the tree.

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Stmt>,
    pub span: Span,
}

impl Program {
    pub fn literal(&self) -> String {
        render_statements(&self.statements)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub statements: Vec<Stmt>,
    pub span: Span,
}

impl Block {
    pub fn literal(&self) -> String {
        render_statements(&self.statements)
    }
}

fn render_statements(statements: &[Stmt]) -> String {
    statements
        .iter()
        .map(Stmt::literal)
        .collect::<Vec<String>>()
        .join("; ")
}

// The loop direction is an explicit tag decided by the keyword the source
// used, never inferred from the sign of the step value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDirection {
    Increment,
    Decrement,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Assign {
        target: Expr,
        value: Expr,
        span: Span,
    },
    Expression {
        expr: Expr,
        span: Span,
    },
    If {
        condition: Expr,
        consequence: Block,
        alternative: Option<Block>,
        span: Span,
    },
    For {
        counter: String,
        counter_span: Span,
        start: Expr,
        end: Expr,
        step: Expr,
        direction: StepDirection,
        body: Block,
        span: Span,
    },
    While {
        condition: Expr,
        body: Block,
        span: Span,
    },
    Function {
        name: String,
        func: Expr,
        span: Span,
    },
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Assign { span, .. } => *span,
            Stmt::Expression { span, .. } => *span,
            Stmt::If { span, .. } => *span,
            Stmt::For { span, .. } => *span,
            Stmt::While { span, .. } => *span,
            Stmt::Function { span, .. } => *span,
        }
    }

    pub fn literal(&self) -> String {
        match self {
            Stmt::Assign { target, value, .. } => {
                format!("{} = {}", target.literal(), value.literal())
            }
            Stmt::Expression { expr, .. } => expr.literal(),
            Stmt::If {
                condition,
                consequence,
                alternative,
                ..
            } => {
                let mut out = format!(
                    "もし {} ならば: {}",
                    condition.literal(),
                    consequence.literal()
                );
                if let Some(alternative) = alternative {
                    out.push_str(&format!(" そうでなければ: {}", alternative.literal()));
                }
                out
            }
            Stmt::For {
                counter,
                start,
                end,
                step,
                direction,
                body,
                ..
            } => {
                let keyword = match direction {
                    StepDirection::Increment => "ずつ増やしながら繰り返す",
                    StepDirection::Decrement => "ずつ減らしながら繰り返す",
                };
                format!(
                    "{} を {} から {} まで {} {}: {}",
                    counter,
                    start.literal(),
                    end.literal(),
                    step.literal(),
                    keyword,
                    body.literal()
                )
            }
            Stmt::While {
                condition, body, ..
            } => format!("{} の間繰り返す: {}", condition.literal(), body.literal()),
            Stmt::Function { func, .. } => func.literal(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixOp {
    Minus,
    Plus,
    Not,
}

impl fmt::Display for PrefixOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            PrefixOp::Minus => "-",
            PrefixOp::Plus => "+",
            PrefixOp::Not => "!",
        };
        write!(f, "{}", text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixOp {
    Add,
    Sub,
    Mul,
    Div,
    IntDiv,
    Rem,
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    And,
    Or,
}

impl fmt::Display for InfixOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            InfixOp::Add => "+",
            InfixOp::Sub => "-",
            InfixOp::Mul => "*",
            InfixOp::Div => "/",
            InfixOp::IntDiv => "//",
            InfixOp::Rem => "%",
            InfixOp::Eq => "==",
            InfixOp::NotEq => "!=",
            InfixOp::Lt => "<",
            InfixOp::Gt => ">",
            InfixOp::LtEq => "<=",
            InfixOp::GtEq => ">=",
            InfixOp::And => "&&",
            InfixOp::Or => "||",
        };
        write!(f, "{}", text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Ident {
        name: String,
        span: Span,
    },
    Int {
        value: i64,
        span: Span,
    },
    Float {
        value: f64,
        span: Span,
    },
    Str {
        value: String,
        span: Span,
    },
    Bool {
        value: bool,
        span: Span,
    },
    Array {
        elements: Vec<Expr>,
        span: Span,
    },
    SystemInput {
        span: Span,
    },
    Prefix {
        op: PrefixOp,
        right: Box<Expr>,
        span: Span,
    },
    Infix {
        op: InfixOp,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    Index {
        left: Box<Expr>,
        index: Box<Expr>,
        span: Span,
    },
    Call {
        function: Box<Expr>,
        args: Vec<Expr>,
        span: Span,
    },
    FunctionLiteral {
        name: Option<String>,
        params: Vec<String>,
        body: Rc<Block>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Ident { span, .. } => *span,
            Expr::Int { span, .. } => *span,
            Expr::Float { span, .. } => *span,
            Expr::Str { span, .. } => *span,
            Expr::Bool { span, .. } => *span,
            Expr::Array { span, .. } => *span,
            Expr::SystemInput { span } => *span,
            Expr::Prefix { span, .. } => *span,
            Expr::Infix { span, .. } => *span,
            Expr::Index { span, .. } => *span,
            Expr::Call { span, .. } => *span,
            Expr::FunctionLiteral { span, .. } => *span,
        }
    }

    pub(crate) fn span_mut(&mut self) -> &mut Span {
        match self {
            Expr::Ident { span, .. } => span,
            Expr::Int { span, .. } => span,
            Expr::Float { span, .. } => span,
            Expr::Str { span, .. } => span,
            Expr::Bool { span, .. } => span,
            Expr::Array { span, .. } => span,
            Expr::SystemInput { span } => span,
            Expr::Prefix { span, .. } => span,
            Expr::Infix { span, .. } => span,
            Expr::Index { span, .. } => span,
            Expr::Call { span, .. } => span,
            Expr::FunctionLiteral { span, .. } => span,
        }
    }

    pub fn literal(&self) -> String {
        match self {
            Expr::Ident { name, .. } => name.clone(),
            Expr::Int { value, .. } => value.to_string(),
            Expr::Float { value, .. } => value.to_string(),
            Expr::Str { value, .. } => format!("\"{}\"", value),
            Expr::Bool { value, .. } => value.to_string(),
            Expr::Array { elements, .. } => {
                let inner = elements
                    .iter()
                    .map(Expr::literal)
                    .collect::<Vec<String>>()
                    .join(", ");
                format!("[{}]", inner)
            }
            Expr::SystemInput { .. } => String::from("【外部からの入力】"),
            Expr::Prefix { op, right, .. } => format!("({}{})", op, right.literal()),
            Expr::Infix {
                op, left, right, ..
            } => format!("({} {} {})", left.literal(), op, right.literal()),
            Expr::Index { left, index, .. } => {
                format!("({}[{}])", left.literal(), index.literal())
            }
            Expr::Call { function, args, .. } => {
                let inner = args
                    .iter()
                    .map(Expr::literal)
                    .collect::<Vec<String>>()
                    .join(", ");
                format!("{}({})", function.literal(), inner)
            }
            Expr::FunctionLiteral {
                name, params, body, ..
            } => format!(
                "関数 {}({}) を: {} と定義する",
                name.as_deref().unwrap_or(""),
                params.join(", "),
                body.literal()
            ),
        }
    }
}
