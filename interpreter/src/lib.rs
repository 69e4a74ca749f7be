mod ast;
mod builtins;
mod env;
mod error;
mod host;
mod interpreter;
mod object;
mod parser;

use std::panic::{catch_unwind, AssertUnwindSafe};

use dncl_core::{LexerError, Scanner, Token};

pub use ast::*;
pub use builtins::BuiltIn;
pub use env::{EnvId, Environments};
pub use error::{DnclError, ParserError, ParserErrorKind};
pub use host::*;
pub use interpreter::{ArrayOrigin, Config, Host, Interpreter};
pub use object::{FunctionObj, Object, RuntimeError, RuntimeErrorKind};
pub use parser::Parser;

pub fn parse(source: &str) -> Result<Program, DnclError> {
    let mut scanner = Scanner::new();
    let tokens: Result<Vec<Token>, LexerError> = scanner.scan_tokens(source).collect();
    let tokens = tokens?;
    let program = Parser::new(tokens).parse_program()?;
    Ok(program)
}

// The embedding entry point: lex, parse and evaluate `source`, feeding the
// external-input literal from `input` one line at a time, and collect the
// emitted events.
pub fn run(source: &str, input: &str, origin: ArrayOrigin) -> Vec<Event> {
    let config = Config {
        array_origin: origin,
        ..Config::default()
    };
    run_with_config(source, input, config)
}

pub fn run_with_config(source: &str, input: &str, config: Config) -> Vec<Event> {
    let mut events = Vec::new();
    let mut input = LineInput::new(input);
    let mut imports = NoImports;
    let mut pacer = ThreadPacer;

    run_program(
        source,
        config,
        Host {
            sink: &mut events,
            input: &mut input,
            imports: &mut imports,
            pacer: &mut pacer,
            hook: None,
        },
    );
    events
}

// Front-end failures stop the run before any evaluation and arrive as one
// rendered Error event; runtime errors arrive as RuntimeError events after
// whatever output was already produced. A panicking collaborator is caught
// and reported as an internal error instead of crashing the host.
pub fn run_program(source: &str, config: Config, host: Host<'_>) {
    let program = match parse(source) {
        Ok(program) => program,
        Err(err) => {
            host.sink.emit(Event::Error(err.explain(source)));
            return;
        }
    };

    let mut interpreter = Interpreter::new(source, config, host);
    let outcome = catch_unwind(AssertUnwindSafe(|| interpreter.interpret(&program)));
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(err)) => interpreter.emit(Event::RuntimeError(err)),
        Err(panic) => {
            let message = if let Some(text) = panic.downcast_ref::<&str>() {
                String::from(*text)
            } else if let Some(text) = panic.downcast_ref::<String>() {
                text.clone()
            } else {
                String::from("不明な内部エラー")
            };
            let err = DnclError::Internal { message };
            interpreter.emit(Event::Error(err.explain(source)));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use dncl_core::Span;

    use crate::host::{
        DebugHook, Event, Input, InputSource, LineInput, MapImports, NoImports, Pacer, StepControl,
    };
    use crate::interpreter::{ArrayOrigin, Config, Host};
    use crate::object::RuntimeErrorKind;
    use crate::{run, run_program, run_with_config};

    fn run_source(src: &str) -> Vec<Event> {
        run(src, "", ArrayOrigin::Zero)
    }

    fn stdout_of(events: &[Event]) -> String {
        let mut out = String::new();
        for event in events {
            if let Event::Stdout(text) = event {
                out.push_str(text);
                out.push('\n');
            }
        }
        out
    }

    fn runtime_error_of(events: &[Event]) -> &crate::object::RuntimeError {
        events
            .iter()
            .find_map(|event| match event {
                Event::RuntimeError(err) => Some(err),
                _ => None,
            })
            .expect("expected a runtime error event")
    }

    fn test_statements(src: &str, expected: &str) {
        let events = run_source(src);
        for event in &events {
            if let Event::RuntimeError(err) = event {
                panic!("unexpected runtime error: {} in\n{}", err, src);
            }
            if let Event::Error(text) = event {
                panic!("unexpected front-end error: {} in\n{}", text, src);
            }
        }
        assert_eq!(stdout_of(&events), expected, "source:\n{}", src);
    }

    #[test]
    fn test_dncl_programs() {
        let tests = [
            // binary and grouping expressions, with precedence
            ("表示する(1+2)", "3\n"),
            ("表示する((1 + 2) * 5 + 2)", "17\n"),
            ("表示する(\"こんにちは\" + \"世界\")", "こんにちは世界\n"),
            // division rules: / is always float, // is always int
            ("表示する(5 / 2)", "2.5\n"),
            ("表示する(5 // 2)", "2\n"),
            ("表示する(6 / 3)", "2\n"),
            ("表示する(7 % 3)", "1\n"),
            // logical and unary expressions
            ("表示する(false || true)", "true\n"),
            ("表示する(!true)", "false\n"),
            ("表示する(-10.5)", "-10.5\n"),
            ("表示する(1 == 1.0)", "false\n"),
            ("表示する(1 ≠ 1.0)", "true\n"),
            ("表示する(1 <= 1.0)", "true\n"),
            // variables and multi-assignment
            ("x = 1, y = 2\n表示する(x + y)", "3\n"),
            // arrays are index-addressed and reference-shared
            ("a = [1, 2, 3]\n表示する(a[1])", "2\n"),
            ("a = [1, 2, 3]\na[0] = 9\n表示する(a)", "[9, 2, 3]\n"),
            (
                "a = [1]\nb = a\n末尾追加(b, 2)\n表示する(a)",
                "[1, 2]\n",
            ),
            // if / elif / else
            (
                "x = 7\n\
                 もし x % 2 == 0 ならば:\n\
                 　表示する(\"even\")\n\
                 そうでなくもし x < 5 ならば:\n\
                 　表示する(\"small\")\n\
                 そうでなければ:\n\
                 　表示する(\"large\")",
                "large\n",
            ),
            // while loop
            (
                "n = 1\n\
                 n < 10 の間繰り返す:\n\
                 　表示する(n)\n\
                 　n = n * 2",
                "1\n2\n4\n8\n",
            ),
            // for loop, both directions
            (
                "i を 0 から 2 まで 1 ずつ増やしながら繰り返す: 表示する(i)",
                "0\n1\n2\n",
            ),
            (
                "i を 3 から 1 まで 1 ずつ減らしながら繰り返す: 表示する(i)",
                "3\n2\n1\n",
            ),
            // golden programs shared with the bench and docs
            (
                include_str!("../data/fib.dncl"),
                include_str!("../data/fib.dncl.expected"),
            ),
            (
                include_str!("../data/for.dncl"),
                include_str!("../data/for.dncl.expected"),
            ),
            (
                include_str!("../data/if_else.dncl"),
                include_str!("../data/if_else.dncl.expected"),
            ),
            (
                include_str!("../data/while.dncl"),
                include_str!("../data/while.dncl.expected"),
            ),
            (
                include_str!("../data/make_counter.dncl"),
                include_str!("../data/make_counter.dncl.expected"),
            ),
        ];

        for (src, expected) in tests {
            test_statements(src, expected);
        }
    }

    #[test]
    fn test_builtin_library() {
        let tests = [
            ("表示する(要素数([1, 2, 3]))", "3\n"),
            ("表示する(要素数(\"あいう\"))", "3\n"),
            ("表示する(連結([1], [2, 3]))", "[1, 2, 3]\n"),
            ("a = [1, 2]\n表示する(末尾削除(a))\n表示する(a)", "2\n[1]\n"),
            ("a = [1, 2]\n先頭追加(a, 0)\n表示する(a)", "[0, 1, 2]\n"),
            ("a = [1, 2, 3]\n表示する(先頭削除(a))\n表示する(a)", "1\n[2, 3]\n"),
            ("表示する(部分配列([1, 2, 3, 4], 1, 2))", "[2, 3]\n"),
            ("表示する(結合([1, 2, 3], \"-\"))", "1-2-3\n"),
            ("表示する(整列([3, 1, 2]))", "[1, 2, 3]\n"),
            ("表示する(整列([\"b\", \"a\"]))", "[a, b]\n"),
            ("表示する(逆順([1, 2, 3]))", "[3, 2, 1]\n"),
            ("表示する(探索([5, 6, 7], 6))", "1\n"),
            ("表示する(探索([5, 6, 7], 9))", "-1\n"),
            ("表示する(合計([1, 2, 3]))", "6\n"),
            ("表示する(合計([1.5, 2.5]))", "4\n"),
            ("表示する(部分文字列(\"こんにちは\", 1, 3))", "んにち\n"),
            ("表示する(分割(\"a,b,c\", \",\"))", "[a, b, c]\n"),
            ("表示する(空白除去(\"  abc  \"))", "abc\n"),
            ("表示する(置換(\"ababa\", \"b\", \"c\"))", "acaca\n"),
            ("表示する(文字コード(\"A\"))", "65\n"),
            ("表示する(コード文字(66))", "B\n"),
            ("表示する(整数変換(3.9))", "3\n"),
            ("表示する(整数変換(\"42\"))", "42\n"),
            ("表示する(小数変換(1))", "1\n"),
            ("表示する(文字列変換(12) + \"個\")", "12個\n"),
            ("表示する(四捨五入(2.5))", "3\n"),
            ("表示する(切り上げ(2.1))", "3\n"),
            ("表示する(切り捨て(2.9))", "2\n"),
            ("表示する(絶対値(-4))", "4\n"),
            ("表示する(平方根(9.0))", "3\n"),
            ("表示する(べき乗(2, 10))", "1024\n"),
            ("表示する(最小値(3, 1, 2))", "1\n"),
            ("表示する(最大値(3, 1, 2.5))", "3\n"),
            ("表示する(整数か(1), 整数か(1.0))", "true false\n"),
            ("表示する(小数か(1.0), 文字列か(\"a\"))", "true true\n"),
            ("表示する(真偽か(false), 配列か([]))", "true true\n"),
            ("表示する(未定義か(末尾削除([])))", "true\n"),
            ("n = 乱数(1, 6)\n表示する(1 <= n && n <= 6)", "true\n"),
        ];

        for (src, expected) in tests {
            test_statements(src, expected);
        }
    }

    #[test]
    fn test_recursion_uses_fresh_scopes() {
        // Scenario: interleaved recursive calls must not cross-contaminate
        // parameter bindings.
        let src = "関数 階乗(n) を:\n\
                   　もし n <= 1 ならば:\n\
                   　　戻り値(1)\n\
                   　そうでなければ:\n\
                   　　戻り値(n * 階乗(n - 1))\n\
                   と定義する\n\
                   表示する(階乗(5))\n\
                   表示する(階乗(3))\n\
                   表示する(階乗(階乗(3)))";
        test_statements(src, "120\n6\n720\n");
    }

    #[test]
    fn test_user_function_arity_is_unchecked() {
        // Extra arguments are dropped, missing parameters stay unbound; only
        // built-ins validate their arity.
        let src = "関数 一番目(a, b) を: 戻り値(a) と定義する\n\
                   表示する(一番目(1, 2, 3))\n\
                   表示する(未定義か(一番目(4, 5)))";
        test_statements(src, "1\nfalse\n");
    }

    #[test]
    fn test_undefined_variable_error_points_at_the_name() {
        let events = run_source("x = a");
        let err = runtime_error_of(&events);
        assert_eq!(
            err.kind,
            RuntimeErrorKind::Undefined {
                name: String::from("a")
            }
        );
        assert_eq!(err.span, Span::new(4, 5));
        assert_eq!(
            err.explain("x = a"),
            "1行目 5文字目: 変数 'a' は定義されていません\nx = a\n    ^"
        );
    }

    #[test]
    fn test_index_out_of_range_reports_index_and_length() {
        let events = run_source("表示する([1, 2, 3][10])");
        let err = runtime_error_of(&events);
        assert_eq!(
            err.kind,
            RuntimeErrorKind::IndexOutOfRange {
                index: 10,
                length: 3
            }
        );
    }

    #[test]
    fn test_array_origin_one() {
        let events = run("a = [10, 20, 30]\n表示する(a[1])", "", ArrayOrigin::One);
        assert_eq!(stdout_of(&events), "10\n");

        let events = run("a = [10, 20, 30]\n表示する(a[0])", "", ArrayOrigin::One);
        let err = runtime_error_of(&events);
        assert_eq!(
            err.kind,
            RuntimeErrorKind::IndexOutOfRange {
                index: 0,
                length: 3
            }
        );

        // 探索 answers in declared indices as well
        let events = run("表示する(探索([7, 8], 8))", "", ArrayOrigin::One);
        assert_eq!(stdout_of(&events), "2\n");
    }

    #[test]
    fn test_type_errors() {
        let tests = [
            ("表示する(1 + 1.0)", "同じ型の数値・文字列・配列"),
            ("表示する(1 + \"a\")", "同じ型の数値・文字列・配列"),
            ("表示する(-\"a\")", "数値"),
            ("x を 1.5 から 3 まで 1 ずつ増やしながら繰り返す: 表示する(x)", "整数"),
            ("表示する(\"a\"[0])", "配列"),
            ("x = 1\nx(2)", "関数"),
        ];

        for (src, expected) in tests {
            let events = run_source(src);
            let err = runtime_error_of(&events);
            match &err.kind {
                RuntimeErrorKind::Type { expected: found, .. } => {
                    assert_eq!(found, expected, "source: {}", src)
                }
                other => panic!("expected type error for {}, got {:?}", src, other),
            }
        }
    }

    #[test]
    fn test_division_by_zero() {
        let events = run_source("表示する(1 // 0)");
        let err = runtime_error_of(&events);
        assert_eq!(
            err.kind,
            RuntimeErrorKind::General {
                message: String::from("0で割ることはできません")
            }
        );
    }

    #[test]
    fn test_builtin_arity_is_checked() {
        let events = run_source("要素数([1], [2])");
        let err = runtime_error_of(&events);
        assert_eq!(
            err.kind,
            RuntimeErrorKind::ArgumentSize {
                name: String::from("要素数"),
                expected: 1,
                got: 2
            }
        );
    }

    #[test]
    fn test_output_before_runtime_error_is_kept() {
        let events = run_source("表示する(1)\n表示する(x)");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], Event::Stdout(String::from("1")));
        assert!(matches!(events[1], Event::RuntimeError(_)));
    }

    #[test]
    fn test_front_end_errors_stop_before_execution() {
        // Parse error: no statement runs, one rendered Error event
        let events = run_source("表示する(1)\nx = (1 + 2");
        assert_eq!(events.len(), 1);
        let Event::Error(text) = &events[0] else {
            panic!("expected an error event");
        };
        assert!(text.contains("')' が必要ですが"), "{}", text);

        // Lexer error
        let events = run_source("x = $");
        assert_eq!(events.len(), 1);
        let Event::Error(text) = &events[0] else {
            panic!("expected an error event");
        };
        assert!(text.contains("予期しない文字"), "{}", text);
    }

    #[test]
    fn test_external_input() {
        let events = run("x = 【外部からの入力】\n表示する(x + 1)", "41", ArrayOrigin::Zero);
        assert_eq!(stdout_of(&events), "42\n");

        let events = run(
            "x = 【外部からの入力】\ny = 【外部からの入力】\n表示する(x)\n表示する(y)",
            "3.5\nこんにちは",
            ArrayOrigin::Zero,
        );
        assert_eq!(stdout_of(&events), "3.5\nこんにちは\n");

        // Exhausted input is an error, distinct from an empty line
        let events = run("x = 【外部からの入力】", "", ArrayOrigin::Zero);
        let err = runtime_error_of(&events);
        assert_eq!(
            err.kind,
            RuntimeErrorKind::General {
                message: String::from("外部からの入力がありません")
            }
        );
    }

    #[test]
    fn test_import_not_found_message() {
        let events = run_source("インポート(\"lib/util\")");
        let err = runtime_error_of(&events);
        assert_eq!(
            err.kind,
            RuntimeErrorKind::General {
                message: String::from("ファイル:lib/util が見つかりません")
            }
        );
    }

    #[test]
    fn test_import_into_same_environment() {
        let mut events = Vec::new();
        let mut input = LineInput::new("");
        let mut imports = MapImports::new([(
            "lib/util",
            "関数 二倍(x) を: 戻り値(x * 2) と定義する\n基準 = 100",
        )]);
        let mut pacer = crate::host::ThreadPacer;

        run_program(
            "インポート(\"lib/util\")\n表示する(二倍(基準))",
            Config::default(),
            Host {
                sink: &mut events,
                input: &mut input,
                imports: &mut imports,
                pacer: &mut pacer,
                hook: None,
            },
        );
        assert_eq!(stdout_of(&events), "200\n");
    }

    #[test]
    fn test_clear_event() {
        let events = run_source("表示する(1)\nクリア()\n表示する(2)");
        assert_eq!(
            events,
            vec![
                Event::Stdout(String::from("1")),
                Event::Clear,
                Event::Stdout(String::from("2")),
            ]
        );
    }

    #[test]
    fn test_debug_events_order() {
        let config = Config {
            array_origin: ArrayOrigin::Zero,
            debug_mode: true,
            debug_delay_ms: 0,
        };
        let events = run_with_config("x = 1\ny = x + 1\n表示する(y)", "", config);

        // Lines are announced in order, once each
        let lines: Vec<usize> = events
            .iter()
            .filter_map(|event| match event {
                Event::LineEvaluation(line) => Some(*line),
                _ => None,
            })
            .collect();
        assert_eq!(lines, vec![1, 2, 3]);

        // The first line event precedes any environment update, and the final
        // snapshot holds both variables
        let first_line = events
            .iter()
            .position(|event| matches!(event, Event::LineEvaluation(_)))
            .unwrap();
        let first_update = events
            .iter()
            .position(|event| matches!(event, Event::EnvironmentUpdate(_)))
            .unwrap();
        assert!(first_line < first_update);

        let last_update = events
            .iter()
            .rev()
            .find_map(|event| match event {
                Event::EnvironmentUpdate(snapshot) => Some(snapshot.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            last_update,
            vec![
                (String::from("x"), String::from("1")),
                (String::from("y"), String::from("2")),
            ]
        );
    }

    struct CancelAfter {
        remaining: usize,
    }

    impl DebugHook for CancelAfter {
        fn before_node(
            &mut self,
            _span: Span,
            _line: usize,
            _snapshot: &[(String, String)],
        ) -> StepControl {
            if self.remaining == 0 {
                return StepControl::Cancel;
            }
            self.remaining -= 1;
            StepControl::Continue
        }
    }

    #[test]
    fn test_cancellation_stops_cleanly() {
        let mut events = Vec::new();
        let mut input = LineInput::new("");
        let mut imports = NoImports;
        let mut pacer = crate::host::ThreadPacer;
        let mut hook = CancelAfter { remaining: 4 };

        run_program(
            "x = 1\n表示する(x)\n表示する(2)\n表示する(3)",
            Config {
                array_origin: ArrayOrigin::Zero,
                debug_mode: true,
                debug_delay_ms: 0,
            },
            Host {
                sink: &mut events,
                input: &mut input,
                imports: &mut imports,
                pacer: &mut pacer,
                hook: Some(&mut hook),
            },
        );

        // The run stopped early: no runtime error, not all output arrived
        assert!(!events.iter().any(|e| matches!(e, Event::RuntimeError(_))));
        let printed = stdout_of(&events);
        assert!(printed.len() < "1\n2\n3\n".len(), "printed: {:?}", printed);
    }

    struct CancellingInput;

    impl InputSource for CancellingInput {
        fn next_input(&mut self) -> Input {
            Input::Cancelled
        }
    }

    #[test]
    fn test_cancellation_at_input_exits_cleanly() {
        let mut events = Vec::new();
        let mut input = CancellingInput;
        let mut imports = NoImports;
        let mut pacer = crate::host::ThreadPacer;

        run_program(
            "x = 1\ny = 【外部からの入力】\n表示する(x)",
            Config::default(),
            Host {
                sink: &mut events,
                input: &mut input,
                imports: &mut imports,
                pacer: &mut pacer,
                hook: None,
            },
        );

        // Cancelled at the input suspension point: nothing after it ran, and
        // the run ended without an error event
        assert_eq!(events, Vec::new());
    }

    struct CountingPacer {
        calls: usize,
    }

    impl Pacer for CountingPacer {
        fn sleep(&mut self, _duration: Duration) -> StepControl {
            self.calls += 1;
            StepControl::Continue
        }
    }

    #[test]
    fn test_sleep_builtin_uses_the_pacer() {
        let mut events = Vec::new();
        let mut input = LineInput::new("");
        let mut imports = NoImports;
        let mut pacer = CountingPacer { calls: 0 };

        run_program(
            "待機(5)\n表示する(1)",
            Config::default(),
            Host {
                sink: &mut events,
                input: &mut input,
                imports: &mut imports,
                pacer: &mut pacer,
                hook: None,
            },
        );

        assert_eq!(pacer.calls, 1);
        assert_eq!(stdout_of(&events), "1\n");
    }

    #[test]
    fn test_explain_is_idempotent() {
        let src = "x = 存在しない変数";
        let events = run_source(src);
        let err = runtime_error_of(&events);
        assert_eq!(err.explain(src), err.explain(src));
    }
}
