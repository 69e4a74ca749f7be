use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use dncl_core::{report, Span};
use thiserror::Error;

use crate::ast::Block;
use crate::builtins::BuiltIn;
use crate::env::EnvId;

// A user function is a closure: it keeps the handle of the environment it was
// defined in, and each call chains a fresh scope off that handle.
#[derive(Debug)]
pub struct FunctionObj {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: Rc<Block>,
    pub env: EnvId,
}

#[derive(Debug, Clone)]
pub enum Object {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    // Arrays are shared mutable sequences; two variables bound to the same
    // array observe each other's in-place mutations.
    Array(Rc<RefCell<Vec<Object>>>),
    Function(Rc<FunctionObj>),
    Builtin(BuiltIn),
    Null,
    // Internal sentinel wrapping the value handed to 戻り値; unwrapped at the
    // call boundary and never observable by user code.
    Return(Box<Object>),
    // Runtime errors are values that short-circuit every enclosing construct.
    Error(RuntimeError),
}

impl Object {
    pub fn array(items: Vec<Object>) -> Object {
        Object::Array(Rc::new(RefCell::new(items)))
    }

    pub(crate) fn error(kind: RuntimeErrorKind, span: Span, node: String) -> Object {
        Object::Error(RuntimeError { kind, span, node })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Object::Int(_) => "整数",
            Object::Float(_) => "小数",
            Object::Str(_) => "文字列",
            Object::Bool(_) => "真偽値",
            Object::Array(_) => "配列",
            Object::Function(_) | Object::Builtin(_) => "関数",
            Object::Null => "未定義値",
            Object::Return(_) => "戻り値",
            Object::Error(_) => "エラー",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Object::Bool(value) => *value,
            Object::Int(value) => *value != 0,
            Object::Float(value) => *value != 0.0,
            Object::Str(value) => !value.is_empty(),
            Object::Array(items) => !items.borrow().is_empty(),
            _ => false,
        }
    }

    // Return and Error short-circuit every enclosing construct; this check is
    // applied after every recursive evaluation.
    pub fn is_abrupt(&self) -> bool {
        matches!(self, Object::Return(_) | Object::Error(_))
    }

    pub(crate) fn as_f64(&self) -> Option<f64> {
        match self {
            Object::Int(value) => Some(*value as f64),
            Object::Float(value) => Some(*value),
            _ => None,
        }
    }
}

// Value equality between same-kind operands only; operands of different kinds
// never compare equal. Arrays compare by content, functions by identity.
impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Object::Int(lhs), Object::Int(rhs)) => lhs == rhs,
            (Object::Float(lhs), Object::Float(rhs)) => lhs == rhs,
            (Object::Str(lhs), Object::Str(rhs)) => lhs == rhs,
            (Object::Bool(lhs), Object::Bool(rhs)) => lhs == rhs,
            (Object::Array(lhs), Object::Array(rhs)) => {
                Rc::ptr_eq(lhs, rhs) || *lhs.borrow() == *rhs.borrow()
            }
            (Object::Function(lhs), Object::Function(rhs)) => Rc::ptr_eq(lhs, rhs),
            (Object::Builtin(lhs), Object::Builtin(rhs)) => lhs == rhs,
            (Object::Null, Object::Null) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Int(value) => write!(f, "{}", value),
            Object::Float(value) => write!(f, "{}", value),
            Object::Str(value) => write!(f, "{}", value),
            Object::Bool(value) => write!(f, "{}", value),
            Object::Array(items) => {
                let rendered = items
                    .borrow()
                    .iter()
                    .map(Object::to_string)
                    .collect::<Vec<String>>()
                    .join(", ");
                write!(f, "[{}]", rendered)
            }
            Object::Function(func) => {
                write!(f, "<関数 {}>", func.name.as_deref().unwrap_or("無名"))
            }
            Object::Builtin(builtin) => write!(f, "<組み込み関数 {}>", builtin.name()),
            Object::Null => write!(f, "null"),
            Object::Return(value) => write!(f, "{}", value),
            Object::Error(err) => write!(f, "{}", err),
        }
    }
}

// Carries the producing node's span and canonical literal so diagnostics can
// point at the exact source range.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub span: Span,
    pub node: String,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RuntimeErrorKind {
    #[error("{message}")]
    General { message: String },

    #[error("{expected} が必要ですが {found} が渡されました")]
    Type { expected: String, found: String },

    #[error("関数 '{name}' の引数は {expected} 個必要ですが {got} 個渡されました")]
    ArgumentSize {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("変数 '{name}' は定義されていません")]
    Undefined { name: String },

    #[error("添字 {index} は範囲外です(要素数 {length})")]
    IndexOutOfRange { index: i64, length: usize },
}

impl RuntimeError {
    pub fn explain(&self, source: &str) -> String {
        report::render(
            source,
            self.span.start,
            self.span.end,
            &self.kind.to_string(),
        )
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

#[cfg(test)]
mod tests {
    use crate::object::Object;

    #[test]
    fn test_equality_requires_same_kind() {
        assert_eq!(Object::Int(1), Object::Int(1));
        assert_ne!(Object::Int(1), Object::Float(1.0));
        assert_ne!(Object::Str(String::from("1")), Object::Int(1));
        assert_ne!(Object::Bool(true), Object::Int(1));
        assert_eq!(
            Object::array(vec![Object::Int(1), Object::Int(2)]),
            Object::array(vec![Object::Int(1), Object::Int(2)])
        );
        assert_ne!(
            Object::array(vec![Object::Int(1)]),
            Object::array(vec![Object::Float(1.0)])
        );
    }

    #[test]
    fn test_truthiness() {
        assert!(Object::Bool(true).truthy());
        assert!(!Object::Bool(false).truthy());
        assert!(Object::Int(-2).truthy());
        assert!(!Object::Int(0).truthy());
        assert!(Object::Str(String::from("a")).truthy());
        assert!(!Object::Str(String::new()).truthy());
        assert!(Object::array(vec![Object::Int(1)]).truthy());
        assert!(!Object::array(Vec::new()).truthy());
        assert!(!Object::Null.truthy());
    }

    #[test]
    fn test_display() {
        assert_eq!(Object::Int(3).to_string(), "3");
        assert_eq!(Object::Float(2.5).to_string(), "2.5");
        assert_eq!(Object::Float(2.0).to_string(), "2");
        assert_eq!(Object::Str(String::from("あ")).to_string(), "あ");
        assert_eq!(
            Object::array(vec![Object::Int(1), Object::Str(String::from("x"))]).to_string(),
            "[1, x]"
        );
    }

    #[test]
    fn test_aliased_arrays_share_mutations() {
        let shared = Object::array(vec![Object::Int(1)]);
        let alias = shared.clone();
        if let Object::Array(items) = &shared {
            items.borrow_mut().push(Object::Int(2));
        }
        assert_eq!(alias, Object::array(vec![Object::Int(1), Object::Int(2)]));
    }
}
