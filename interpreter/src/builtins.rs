use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;
use std::time::Duration;

use dncl_core::Span;
use phf::{phf_map, Map};
use rand::Rng;

use crate::env::EnvId;
use crate::host::Event;
use crate::interpreter::Interpreter;
use crate::object::{Object, RuntimeErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltIn {
    Print,
    Clear,

    Length,
    Concat,
    Push,
    Pop,
    Unshift,
    Shift,
    Slice,
    Join,
    Sort,
    Reverse,
    Find,
    Sum,

    Substring,
    Split,
    Trim,
    Replace,
    CharCode,
    CodeChar,

    ToInt,
    ToFloat,
    ToStr,
    Round,
    Ceil,
    Floor,
    Abs,
    Sqrt,
    Pow,
    Min,
    Max,
    Random,

    IsInt,
    IsFloat,
    IsStr,
    IsBool,
    IsArray,
    IsNull,

    Return,
    Sleep,
    Import,
}

// Names must stay free of the Japanese keywords (を, から, まで, ...): the
// scanner splits a word where a keyword begins, and a split name would be
// unreachable.
static BUILTINS: Map<&'static str, BuiltIn> = phf_map! {
    "表示する" => BuiltIn::Print,
    "クリア" => BuiltIn::Clear,

    "要素数" => BuiltIn::Length,
    "連結" => BuiltIn::Concat,
    "末尾追加" => BuiltIn::Push,
    "末尾削除" => BuiltIn::Pop,
    "先頭追加" => BuiltIn::Unshift,
    "先頭削除" => BuiltIn::Shift,
    "部分配列" => BuiltIn::Slice,
    "結合" => BuiltIn::Join,
    "整列" => BuiltIn::Sort,
    "逆順" => BuiltIn::Reverse,
    "探索" => BuiltIn::Find,
    "合計" => BuiltIn::Sum,

    "部分文字列" => BuiltIn::Substring,
    "分割" => BuiltIn::Split,
    "空白除去" => BuiltIn::Trim,
    "置換" => BuiltIn::Replace,
    "文字コード" => BuiltIn::CharCode,
    "コード文字" => BuiltIn::CodeChar,

    "整数変換" => BuiltIn::ToInt,
    "小数変換" => BuiltIn::ToFloat,
    "文字列変換" => BuiltIn::ToStr,
    "四捨五入" => BuiltIn::Round,
    "切り上げ" => BuiltIn::Ceil,
    "切り捨て" => BuiltIn::Floor,
    "絶対値" => BuiltIn::Abs,
    "平方根" => BuiltIn::Sqrt,
    "べき乗" => BuiltIn::Pow,
    "最小値" => BuiltIn::Min,
    "最大値" => BuiltIn::Max,
    "乱数" => BuiltIn::Random,

    "整数か" => BuiltIn::IsInt,
    "小数か" => BuiltIn::IsFloat,
    "文字列か" => BuiltIn::IsStr,
    "真偽か" => BuiltIn::IsBool,
    "配列か" => BuiltIn::IsArray,
    "未定義か" => BuiltIn::IsNull,

    "戻り値" => BuiltIn::Return,
    "待機" => BuiltIn::Sleep,
    "インポート" => BuiltIn::Import,
};

impl BuiltIn {
    pub fn lookup(name: &str) -> Option<BuiltIn> {
        BUILTINS.get(name).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            BuiltIn::Print => "表示する",
            BuiltIn::Clear => "クリア",
            BuiltIn::Length => "要素数",
            BuiltIn::Concat => "連結",
            BuiltIn::Push => "末尾追加",
            BuiltIn::Pop => "末尾削除",
            BuiltIn::Unshift => "先頭追加",
            BuiltIn::Shift => "先頭削除",
            BuiltIn::Slice => "部分配列",
            BuiltIn::Join => "結合",
            BuiltIn::Sort => "整列",
            BuiltIn::Reverse => "逆順",
            BuiltIn::Find => "探索",
            BuiltIn::Sum => "合計",
            BuiltIn::Substring => "部分文字列",
            BuiltIn::Split => "分割",
            BuiltIn::Trim => "空白除去",
            BuiltIn::Replace => "置換",
            BuiltIn::CharCode => "文字コード",
            BuiltIn::CodeChar => "コード文字",
            BuiltIn::ToInt => "整数変換",
            BuiltIn::ToFloat => "小数変換",
            BuiltIn::ToStr => "文字列変換",
            BuiltIn::Round => "四捨五入",
            BuiltIn::Ceil => "切り上げ",
            BuiltIn::Floor => "切り捨て",
            BuiltIn::Abs => "絶対値",
            BuiltIn::Sqrt => "平方根",
            BuiltIn::Pow => "べき乗",
            BuiltIn::Min => "最小値",
            BuiltIn::Max => "最大値",
            BuiltIn::Random => "乱数",
            BuiltIn::IsInt => "整数か",
            BuiltIn::IsFloat => "小数か",
            BuiltIn::IsStr => "文字列か",
            BuiltIn::IsBool => "真偽か",
            BuiltIn::IsArray => "配列か",
            BuiltIn::IsNull => "未定義か",
            BuiltIn::Return => "戻り値",
            BuiltIn::Sleep => "待機",
            BuiltIn::Import => "インポート",
        }
    }

    // None marks the variadic entries; everything else is checked strictly
    // before dispatch.
    pub fn arity(self) -> Option<usize> {
        match self {
            BuiltIn::Print | BuiltIn::Min | BuiltIn::Max => None,
            BuiltIn::Clear => Some(0),
            BuiltIn::Length
            | BuiltIn::Pop
            | BuiltIn::Shift
            | BuiltIn::Sort
            | BuiltIn::Reverse
            | BuiltIn::Sum
            | BuiltIn::Trim
            | BuiltIn::CharCode
            | BuiltIn::CodeChar
            | BuiltIn::ToInt
            | BuiltIn::ToFloat
            | BuiltIn::ToStr
            | BuiltIn::Round
            | BuiltIn::Ceil
            | BuiltIn::Floor
            | BuiltIn::Abs
            | BuiltIn::Sqrt
            | BuiltIn::IsInt
            | BuiltIn::IsFloat
            | BuiltIn::IsStr
            | BuiltIn::IsBool
            | BuiltIn::IsArray
            | BuiltIn::IsNull
            | BuiltIn::Return
            | BuiltIn::Sleep
            | BuiltIn::Import => Some(1),
            BuiltIn::Concat
            | BuiltIn::Push
            | BuiltIn::Unshift
            | BuiltIn::Join
            | BuiltIn::Find
            | BuiltIn::Split
            | BuiltIn::Pow
            | BuiltIn::Random => Some(2),
            BuiltIn::Slice | BuiltIn::Substring | BuiltIn::Replace => Some(3),
        }
    }

    pub(crate) fn call(
        self,
        interp: &mut Interpreter<'_>,
        env: EnvId,
        args: Vec<Object>,
        span: Span,
        node: String,
    ) -> Object {
        match self.execute(interp, env, args, span, &node) {
            Ok(value) => value,
            Err(error) => error,
        }
    }

    fn execute(
        self,
        interp: &mut Interpreter<'_>,
        env: EnvId,
        args: Vec<Object>,
        span: Span,
        node: &str,
    ) -> Result<Object, Object> {
        match self {
            BuiltIn::Print => {
                let text = args
                    .iter()
                    .map(Object::to_string)
                    .collect::<Vec<String>>()
                    .join(" ");
                interp.emit(Event::Stdout(text));
                Ok(Object::Null)
            }
            BuiltIn::Clear => {
                interp.emit(Event::Clear);
                Ok(Object::Null)
            }

            BuiltIn::Length => match &args[0] {
                Object::Array(items) => Ok(Object::Int(items.borrow().len() as i64)),
                Object::Str(text) => Ok(Object::Int(text.chars().count() as i64)),
                other => Err(type_error("配列か文字列", other, span, node)),
            },
            BuiltIn::Concat => match (&args[0], &args[1]) {
                (Object::Array(a), Object::Array(b)) => {
                    let mut items = a.borrow().clone();
                    items.extend(b.borrow().iter().cloned());
                    Ok(Object::array(items))
                }
                (Object::Str(a), Object::Str(b)) => Ok(Object::Str(format!("{}{}", a, b))),
                (other, _) => Err(type_error("配列同士か文字列同士", other, span, node)),
            },
            BuiltIn::Push => {
                let items = array_arg(&args, 0, span, node)?;
                items.borrow_mut().push(args[1].clone());
                Ok(args[0].clone())
            }
            BuiltIn::Pop => {
                let items = array_arg(&args, 0, span, node)?;
                let popped = items.borrow_mut().pop();
                Ok(popped.unwrap_or(Object::Null))
            }
            BuiltIn::Unshift => {
                let items = array_arg(&args, 0, span, node)?;
                items.borrow_mut().insert(0, args[1].clone());
                Ok(args[0].clone())
            }
            BuiltIn::Shift => {
                let items = array_arg(&args, 0, span, node)?;
                let mut borrowed = items.borrow_mut();
                if borrowed.is_empty() {
                    Ok(Object::Null)
                } else {
                    Ok(borrowed.remove(0))
                }
            }
            BuiltIn::Slice => {
                let items = array_arg(&args, 0, span, node)?;
                let declared = int_arg(&args, 1, span, node)?;
                let take = int_arg(&args, 2, span, node)?;
                if take < 0 {
                    return Err(general_error("長さに負の値は使えません", span, node));
                }
                let borrowed = items.borrow();
                let pos = position(declared, borrowed.len(), interp.origin(), span, node)?;
                let take = (take as usize).min(borrowed.len() - pos);
                Ok(Object::array(borrowed[pos..pos + take].to_vec()))
            }
            BuiltIn::Join => {
                let items = array_arg(&args, 0, span, node)?;
                let separator = str_arg(&args, 1, span, node)?;
                let rendered = items
                    .borrow()
                    .iter()
                    .map(Object::to_string)
                    .collect::<Vec<String>>()
                    .join(separator);
                Ok(Object::Str(rendered))
            }
            BuiltIn::Sort => {
                let items = array_arg(&args, 0, span, node)?;
                let mut sorted = items.borrow().clone();
                if sorted.iter().all(|item| item.as_f64().is_some()) {
                    sorted.sort_by(|a, b| {
                        a.as_f64()
                            .partial_cmp(&b.as_f64())
                            .unwrap_or(Ordering::Equal)
                    });
                } else if sorted.iter().all(|item| matches!(item, Object::Str(_))) {
                    sorted.sort_by(|a, b| match (a, b) {
                        (Object::Str(x), Object::Str(y)) => x.cmp(y),
                        _ => Ordering::Equal,
                    });
                } else {
                    return Err(general_error(
                        "整列できるのは数値だけの配列か文字列だけの配列です",
                        span,
                        node,
                    ));
                }
                Ok(Object::array(sorted))
            }
            BuiltIn::Reverse => {
                let items = array_arg(&args, 0, span, node)?;
                let mut reversed = items.borrow().clone();
                reversed.reverse();
                Ok(Object::array(reversed))
            }
            BuiltIn::Find => {
                let items = array_arg(&args, 0, span, node)?;
                let found = items
                    .borrow()
                    .iter()
                    .position(|item| item == &args[1]);
                match found {
                    Some(pos) => Ok(Object::Int(pos as i64 + interp.origin())),
                    None => Ok(Object::Int(-1)),
                }
            }
            BuiltIn::Sum => {
                let items = array_arg(&args, 0, span, node)?;
                let borrowed = items.borrow();
                if borrowed.iter().all(|item| matches!(item, Object::Int(_))) {
                    let mut total: i64 = 0;
                    for item in borrowed.iter() {
                        if let Object::Int(value) = item {
                            total = total.checked_add(*value).ok_or_else(|| {
                                general_error("整数がオーバーフローしました", span, node)
                            })?;
                        }
                    }
                    Ok(Object::Int(total))
                } else if borrowed.iter().all(|item| item.as_f64().is_some()) {
                    let total: f64 = borrowed.iter().filter_map(Object::as_f64).sum();
                    Ok(Object::Float(total))
                } else {
                    Err(general_error("合計できるのは数値だけの配列です", span, node))
                }
            }

            BuiltIn::Substring => {
                let text = str_arg(&args, 0, span, node)?;
                let declared = int_arg(&args, 1, span, node)?;
                let take = int_arg(&args, 2, span, node)?;
                if take < 0 {
                    return Err(general_error("長さに負の値は使えません", span, node));
                }
                let chars: Vec<char> = text.chars().collect();
                let pos = position(declared, chars.len(), interp.origin(), span, node)?;
                let take = (take as usize).min(chars.len() - pos);
                Ok(Object::Str(chars[pos..pos + take].iter().collect()))
            }
            BuiltIn::Split => {
                let text = str_arg(&args, 0, span, node)?;
                let separator = str_arg(&args, 1, span, node)?;
                let pieces: Vec<Object> = if separator.is_empty() {
                    text.chars().map(|c| Object::Str(c.to_string())).collect()
                } else {
                    text.split(separator)
                        .map(|piece| Object::Str(String::from(piece)))
                        .collect()
                };
                Ok(Object::array(pieces))
            }
            BuiltIn::Trim => {
                let text = str_arg(&args, 0, span, node)?;
                Ok(Object::Str(String::from(text.trim())))
            }
            BuiltIn::Replace => {
                let text = str_arg(&args, 0, span, node)?;
                let from = str_arg(&args, 1, span, node)?;
                let to = str_arg(&args, 2, span, node)?;
                Ok(Object::Str(text.replace(from, to)))
            }
            BuiltIn::CharCode => {
                let text = str_arg(&args, 0, span, node)?;
                match text.chars().next() {
                    Some(c) => Ok(Object::Int(c as i64)),
                    None => Err(general_error("空の文字列に文字コードはありません", span, node)),
                }
            }
            BuiltIn::CodeChar => {
                let code = int_arg(&args, 0, span, node)?;
                let c = u32::try_from(code).ok().and_then(char::from_u32);
                match c {
                    Some(c) => Ok(Object::Str(c.to_string())),
                    None => Err(general_error("文字コードが不正です", span, node)),
                }
            }

            BuiltIn::ToInt => match &args[0] {
                Object::Int(value) => Ok(Object::Int(*value)),
                Object::Float(value) => Ok(Object::Int(value.trunc() as i64)),
                Object::Str(text) => match text.trim().parse::<i64>() {
                    Ok(value) => Ok(Object::Int(value)),
                    Err(_) => Err(general_error(
                        &format!("'{}' を整数に変換できません", text),
                        span,
                        node,
                    )),
                },
                other => Err(type_error("数値か文字列", other, span, node)),
            },
            BuiltIn::ToFloat => match &args[0] {
                Object::Int(value) => Ok(Object::Float(*value as f64)),
                Object::Float(value) => Ok(Object::Float(*value)),
                Object::Str(text) => match text.trim().parse::<f64>() {
                    Ok(value) => Ok(Object::Float(value)),
                    Err(_) => Err(general_error(
                        &format!("'{}' を小数に変換できません", text),
                        span,
                        node,
                    )),
                },
                other => Err(type_error("数値か文字列", other, span, node)),
            },
            BuiltIn::ToStr => Ok(Object::Str(args[0].to_string())),
            BuiltIn::Round => match &args[0] {
                Object::Int(value) => Ok(Object::Int(*value)),
                Object::Float(value) => Ok(Object::Int(value.round() as i64)),
                other => Err(type_error("数値", other, span, node)),
            },
            BuiltIn::Ceil => match &args[0] {
                Object::Int(value) => Ok(Object::Int(*value)),
                Object::Float(value) => Ok(Object::Int(value.ceil() as i64)),
                other => Err(type_error("数値", other, span, node)),
            },
            BuiltIn::Floor => match &args[0] {
                Object::Int(value) => Ok(Object::Int(*value)),
                Object::Float(value) => Ok(Object::Int(value.floor() as i64)),
                other => Err(type_error("数値", other, span, node)),
            },
            BuiltIn::Abs => match &args[0] {
                Object::Int(value) => value
                    .checked_abs()
                    .map(Object::Int)
                    .ok_or_else(|| general_error("整数がオーバーフローしました", span, node)),
                Object::Float(value) => Ok(Object::Float(value.abs())),
                other => Err(type_error("数値", other, span, node)),
            },
            BuiltIn::Sqrt => {
                let value = num_arg(&args, 0, span, node)?;
                if value < 0.0 {
                    Err(general_error("負の数の平方根は計算できません", span, node))
                } else {
                    Ok(Object::Float(value.sqrt()))
                }
            }
            BuiltIn::Pow => match (&args[0], &args[1]) {
                (Object::Int(base), Object::Int(exp)) if *exp >= 0 => {
                    match u32::try_from(*exp).ok().and_then(|exp| base.checked_pow(exp)) {
                        Some(value) => Ok(Object::Int(value)),
                        None => Err(general_error("整数がオーバーフローしました", span, node)),
                    }
                }
                _ => {
                    let base = num_arg(&args, 0, span, node)?;
                    let exp = num_arg(&args, 1, span, node)?;
                    Ok(Object::Float(base.powf(exp)))
                }
            },
            BuiltIn::Min | BuiltIn::Max => {
                if args.is_empty() {
                    return Err(Object::error(
                        RuntimeErrorKind::ArgumentSize {
                            name: String::from(self.name()),
                            expected: 1,
                            got: 0,
                        },
                        span,
                        String::from(node),
                    ));
                }
                let mut best = &args[0];
                let mut best_key = num_arg(&args, 0, span, node)?;
                for (at, candidate) in args.iter().enumerate().skip(1) {
                    let key = num_arg(&args, at, span, node)?;
                    let better = match self {
                        BuiltIn::Min => key < best_key,
                        _ => key > best_key,
                    };
                    if better {
                        best = candidate;
                        best_key = key;
                    }
                }
                Ok(best.clone())
            }
            BuiltIn::Random => {
                let low = int_arg(&args, 0, span, node)?;
                let high = int_arg(&args, 1, span, node)?;
                if low > high {
                    return Err(general_error("乱数の範囲が不正です", span, node));
                }
                Ok(Object::Int(rand::thread_rng().gen_range(low..=high)))
            }

            BuiltIn::IsInt => Ok(Object::Bool(matches!(args[0], Object::Int(_)))),
            BuiltIn::IsFloat => Ok(Object::Bool(matches!(args[0], Object::Float(_)))),
            BuiltIn::IsStr => Ok(Object::Bool(matches!(args[0], Object::Str(_)))),
            BuiltIn::IsBool => Ok(Object::Bool(matches!(args[0], Object::Bool(_)))),
            BuiltIn::IsArray => Ok(Object::Bool(matches!(args[0], Object::Array(_)))),
            BuiltIn::IsNull => Ok(Object::Bool(matches!(args[0], Object::Null))),

            BuiltIn::Return => {
                let mut args = args;
                Ok(Object::Return(Box::new(args.remove(0))))
            }
            BuiltIn::Sleep => {
                let millis = int_arg(&args, 0, span, node)?;
                if millis < 0 {
                    return Err(general_error("待機時間に負の値は使えません", span, node));
                }
                interp.pace_sleep(Duration::from_millis(millis as u64));
                Ok(Object::Null)
            }
            BuiltIn::Import => {
                let path = str_arg(&args, 0, span, node)?.to_owned();
                Ok(interp.import(&path, env, span, String::from(node)))
            }
        }
    }
}

impl std::fmt::Display for BuiltIn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn type_error(expected: &str, found: &Object, span: Span, node: &str) -> Object {
    Object::error(
        RuntimeErrorKind::Type {
            expected: String::from(expected),
            found: String::from(found.kind()),
        },
        span,
        String::from(node),
    )
}

fn general_error(message: &str, span: Span, node: &str) -> Object {
    Object::error(
        RuntimeErrorKind::General {
            message: String::from(message),
        },
        span,
        String::from(node),
    )
}

fn array_arg(
    args: &[Object],
    at: usize,
    span: Span,
    node: &str,
) -> Result<Rc<RefCell<Vec<Object>>>, Object> {
    match &args[at] {
        Object::Array(items) => Ok(Rc::clone(items)),
        other => Err(type_error("配列", other, span, node)),
    }
}

fn int_arg(args: &[Object], at: usize, span: Span, node: &str) -> Result<i64, Object> {
    match &args[at] {
        Object::Int(value) => Ok(*value),
        other => Err(type_error("整数", other, span, node)),
    }
}

fn num_arg(args: &[Object], at: usize, span: Span, node: &str) -> Result<f64, Object> {
    match args[at].as_f64() {
        Some(value) => Ok(value),
        None => Err(type_error("数値", &args[at], span, node)),
    }
}

fn str_arg<'a>(args: &'a [Object], at: usize, span: Span, node: &str) -> Result<&'a str, Object> {
    match &args[at] {
        Object::Str(text) => Ok(text.as_str()),
        other => Err(type_error("文字列", other, span, node)),
    }
}

// Declared index -> backing position, with the configured origin applied.
fn position(
    declared: i64,
    length: usize,
    origin: i64,
    span: Span,
    node: &str,
) -> Result<usize, Object> {
    let pos = declared - origin;
    if pos < 0 || pos as usize > length {
        return Err(Object::error(
            RuntimeErrorKind::IndexOutOfRange {
                index: declared,
                length,
            },
            span,
            String::from(node),
        ));
    }
    Ok(pos as usize)
}
