use phf::{phf_map, Map};

use crate::error::LexerError;
use crate::token::{Kind, Span, Token};

pub struct Scanner;

impl Scanner {
    const KEYWORDS: Map<&'static str, Kind> = phf_map! {
        "true" => Kind::True,
        "false" => Kind::False,
    };

    // Ordered longest-first: keyword matching is greedy, and the word scanner
    // also stops where one of these begins so unspaced forms like `iを0から`
    // still split correctly.
    const JAPANESE_KEYWORDS: [(&'static str, Kind); 12] = [
        ("ずつ増やしながら繰り返す", Kind::UpTo),
        ("ずつ減らしながら繰り返す", Kind::DownTo),
        ("そうでなくもし", Kind::Elif),
        ("そうでなければ", Kind::Else),
        ("の間繰り返す", Kind::While),
        ("と定義する", Kind::Define),
        ("ならば", Kind::Then),
        ("関数", Kind::Function),
        ("もし", Kind::If),
        ("から", Kind::Kara),
        ("まで", Kind::Made),
        ("を", Kind::Wo),
    ];

    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Scanner
    }

    pub fn scan_tokens<'b>(&mut self, src: &'b str) -> TokenStream<'b> {
        TokenStream::new(src)
    }
}

pub struct TokenStream<'a> {
    #[allow(dead_code)]
    src: &'a str,
    chars: Vec<char>,

    // `start` and `current` point at the start and end of the token being
    // scanned, in character offsets
    start: usize,
    current: usize,

    at_line_start: bool,

    // Once the eof token is emitted, or an error has been yielded, the stream
    // is fused and produces nothing further.
    eof: bool,
    failed: bool,
}

impl<'a> TokenStream<'a> {
    pub fn new(src: &'a str) -> Self {
        TokenStream {
            src,
            chars: src.chars().collect(),
            start: 0,
            current: 0,
            at_line_start: true,
            eof: false,
            failed: false,
        }
    }

    fn scan_indent(&mut self) -> Option<Token> {
        self.start = self.current;
        let mut depth = 0;

        while let Some(c) = self.peek_char() {
            match c {
                // The language counts a full-width space as two units
                '　' => {
                    depth += 2;
                    self.current += 1;
                }
                ' ' | '\t' => {
                    depth += 1;
                    self.current += 1;
                }
                '\r' => {
                    self.current += 1;
                }
                _ => break,
            }
        }

        self.at_line_start = false;
        match self.peek_char() {
            // Blank line: no indent token, the newline itself is scanned next
            None | Some('\n') => None,
            _ => Some(self.make_token(Kind::Indent(depth))),
        }
    }

    fn scan_token(&mut self) -> Result<Option<Token>, LexerError> {
        let c = self.advance();

        let token = match c {
            '(' | '（' => Some(self.make_token(Kind::LParen)),
            ')' | '）' => Some(self.make_token(Kind::RParen)),
            '[' => Some(self.make_token(Kind::LBracket)),
            ']' => Some(self.make_token(Kind::RBracket)),
            '{' => Some(self.make_token(Kind::LBrace)),
            '}' => Some(self.make_token(Kind::RBrace)),
            '【' => Some(self.make_token(Kind::LLenticular)),
            '】' => Some(self.make_token(Kind::RLenticular)),
            ',' | '，' | '、' => Some(self.make_token(Kind::Comma)),
            ':' | '：' => Some(self.make_token(Kind::Colon)),

            '+' => Some(self.make_token(Kind::Plus)),
            '-' => Some(self.make_token(Kind::Minus)),
            '*' | '×' => Some(self.make_token(Kind::Asterisk)),
            '÷' => Some(self.make_token(Kind::Slash)),
            '%' => Some(self.make_token(Kind::Percent)),
            '＝' => Some(self.make_token(Kind::Assign)),
            '≠' => Some(self.make_token(Kind::NotEq)),
            '≦' => Some(self.make_token(Kind::LtEq)),
            '≧' => Some(self.make_token(Kind::GtEq)),

            '/' => {
                if self.match_char('/') {
                    Some(self.make_token(Kind::IntDiv))
                } else {
                    Some(self.make_token(Kind::Slash))
                }
            }

            '=' => {
                if self.match_char('=') {
                    Some(self.make_token(Kind::Eq))
                } else {
                    Some(self.make_token(Kind::Assign))
                }
            }

            '!' => {
                if self.match_char('=') {
                    Some(self.make_token(Kind::NotEq))
                } else {
                    Some(self.make_token(Kind::Bang))
                }
            }

            '<' => {
                if self.match_char('=') {
                    Some(self.make_token(Kind::LtEq))
                } else {
                    Some(self.make_token(Kind::Lt))
                }
            }

            '>' => {
                if self.match_char('=') {
                    Some(self.make_token(Kind::GtEq))
                } else {
                    Some(self.make_token(Kind::Gt))
                }
            }

            '&' => {
                if self.match_char('&') {
                    Some(self.make_token(Kind::And))
                } else {
                    return Err(LexerError::UnexpectedCharacter { ch: c, at: self.start });
                }
            }

            '|' => {
                if self.match_char('|') {
                    Some(self.make_token(Kind::Or))
                } else {
                    return Err(LexerError::UnexpectedCharacter { ch: c, at: self.start });
                }
            }

            '#' => {
                while let Some(c) = self.peek_char() {
                    if c == '\n' {
                        break;
                    }
                    self.current += 1;
                }
                Some(self.make_token(Kind::Comment))
            }

            '"' => Some(self.string()?),

            // Interior whitespace, no token
            ' ' | '\t' | '\r' | '　' => None,

            '\n' => {
                self.at_line_start = true;
                Some(self.make_token(Kind::NewLine))
            }

            _ => {
                if c.is_ascii_digit() {
                    Some(self.number())
                } else if c.is_ascii_alphabetic() || c == '_' {
                    Some(self.identifier())
                } else if is_word_char(c) {
                    // Rewind; keyword matching starts from the first character
                    self.current = self.start;
                    Some(self.japanese())
                } else {
                    return Err(LexerError::UnexpectedCharacter { ch: c, at: self.start });
                }
            }
        };

        Ok(token)
    }

    fn string(&mut self) -> Result<Token, LexerError> {
        while let Some(c) = self.peek_char() {
            self.current += 1;
            if c == '"' {
                return Ok(self.make_token(Kind::Str));
            }
        }

        Err(LexerError::UnexpectedEof { at: self.current })
    }

    fn number(&mut self) -> Token {
        while matches!(self.peek_char(), Some(c) if c.is_ascii_digit()) {
            self.current += 1;
        }

        if self.peek_char() == Some('.') && matches!(self.peek_next(), Some(c) if c.is_ascii_digit())
        {
            self.current += 1;
            while matches!(self.peek_char(), Some(c) if c.is_ascii_digit()) {
                self.current += 1;
            }
            return self.make_token(Kind::Float);
        }

        self.make_token(Kind::Int)
    }

    fn identifier(&mut self) -> Token {
        while matches!(self.peek_char(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.current += 1;
        }

        let text: String = self.chars[self.start..self.current].iter().collect();
        match Scanner::KEYWORDS.get(text.as_str()) {
            Some(kind) => self.make_token(*kind),
            None => self.make_token(Kind::Ident),
        }
    }

    fn japanese(&mut self) -> Token {
        if let Some((len, kind)) = self.keyword_at(self.start) {
            self.current = self.start + len;
            return self.make_token(kind);
        }

        self.current += 1;
        while let Some(c) = self.peek_char() {
            if !is_word_char(c) || self.keyword_at(self.current).is_some() {
                break;
            }
            self.current += 1;
        }

        self.make_token(Kind::Word)
    }

    fn keyword_at(&self, pos: usize) -> Option<(usize, Kind)> {
        for (keyword, kind) in Scanner::JAPANESE_KEYWORDS {
            if self.matches_at(pos, keyword) {
                return Some((keyword.chars().count(), kind));
            }
        }
        None
    }

    fn matches_at(&self, pos: usize, keyword: &str) -> bool {
        let mut at = pos;
        for kc in keyword.chars() {
            match self.chars.get(at) {
                Some(&c) if c == kc => at += 1,
                _ => return false,
            }
        }
        true
    }

    fn peek_char(&self) -> Option<char> {
        self.chars.get(self.current).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.current + 1).copied()
    }

    fn advance(&mut self) -> char {
        let c = self.chars[self.current];
        self.current += 1;
        c
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek_char() == Some(expected) {
            self.current += 1;
            true
        } else {
            false
        }
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.chars.len()
    }

    fn make_token(&mut self, kind: Kind) -> Token {
        let lexeme: String = self.chars[self.start..self.current].iter().collect();
        Token::new(kind, lexeme, Span::new(self.start, self.current))
    }
}

fn is_word_char(c: char) -> bool {
    c == '_' || c == 'ー' || c.is_alphanumeric()
}

impl<'a> Iterator for TokenStream<'a> {
    type Item = Result<Token, LexerError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.eof || self.failed {
            return None;
        }

        loop {
            if self.at_line_start {
                if let Some(token) = self.scan_indent() {
                    return Some(Ok(token));
                }
            }

            if self.is_at_end() {
                break;
            }

            self.start = self.current;
            match self.scan_token() {
                Ok(None) => continue,
                Ok(Some(token)) => return Some(Ok(token)),
                Err(err) => {
                    self.failed = true;
                    return Some(Err(err));
                }
            }
        }

        self.eof = true;
        self.start = self.current;
        Some(Ok(self.make_token(Kind::Eof)))
    }
}

#[cfg(test)]
mod tests {
    use crate::error::LexerError;
    use crate::scanner::Scanner;
    use crate::token::{Kind, Span, Token};

    fn scan(src: &str) -> Vec<Token> {
        Scanner::new()
            .scan_tokens(src)
            .collect::<Result<Vec<Token>, LexerError>>()
            .unwrap()
    }

    fn kinds(src: &str) -> Vec<Kind> {
        scan(src).into_iter().map(|token| token.kind).collect()
    }

    #[test]
    fn test_basic_scanning() {
        let source = "x = 12.45 + 3 # コメント";
        assert_eq!(
            scan(source),
            vec![
                Token::new(Kind::Indent(0), String::new(), Span::new(0, 0)),
                Token::new(Kind::Ident, String::from("x"), Span::new(0, 1)),
                Token::new(Kind::Assign, String::from("="), Span::new(2, 3)),
                Token::new(Kind::Float, String::from("12.45"), Span::new(4, 9)),
                Token::new(Kind::Plus, String::from("+"), Span::new(10, 11)),
                Token::new(Kind::Int, String::from("3"), Span::new(12, 13)),
                Token::new(
                    Kind::Comment,
                    String::from("# コメント"),
                    Span::new(14, 20)
                ),
                Token::new(Kind::Eof, String::new(), Span::new(20, 20)),
            ]
        );
    }

    #[test]
    fn test_japanese_keywords_and_words() {
        let source = "もし x ならば:";
        assert_eq!(
            scan(source),
            vec![
                Token::new(Kind::Indent(0), String::new(), Span::new(0, 0)),
                Token::new(Kind::If, String::from("もし"), Span::new(0, 2)),
                Token::new(Kind::Ident, String::from("x"), Span::new(3, 4)),
                Token::new(Kind::Then, String::from("ならば"), Span::new(5, 8)),
                Token::new(Kind::Colon, String::from(":"), Span::new(8, 9)),
                Token::new(Kind::Eof, String::new(), Span::new(9, 9)),
            ]
        );
    }

    #[test]
    fn test_greedy_keyword_match_without_spaces() {
        // A loop header written with no spaces at all must still split into
        // the same keyword sequence.
        let source = "iを0から9まで1ずつ増やしながら繰り返す:";
        assert_eq!(
            kinds(source),
            vec![
                Kind::Indent(0),
                Kind::Ident,
                Kind::Wo,
                Kind::Int,
                Kind::Kara,
                Kind::Int,
                Kind::Made,
                Kind::Int,
                Kind::UpTo,
                Kind::Colon,
                Kind::Eof,
            ]
        );
    }

    #[test]
    fn test_word_stops_at_embedded_keyword() {
        let source = "合計を表示する";
        let tokens = scan(source);
        assert_eq!(tokens[1], Token::new(Kind::Word, String::from("合計"), Span::new(0, 2)));
        assert_eq!(tokens[2].kind, Kind::Wo);
        assert_eq!(
            tokens[3],
            Token::new(Kind::Word, String::from("表示する"), Span::new(3, 7))
        );
    }

    #[test]
    fn test_indent_depths() {
        // Full-width space counts two, half-width space and tab count one.
        let source = "a = 1\n　b = 2\n  c = 3\n\td = 4";
        let depths: Vec<usize> = scan(source)
            .into_iter()
            .filter_map(|token| match token.kind {
                Kind::Indent(depth) => Some(depth),
                _ => None,
            })
            .collect();
        assert_eq!(depths, vec![0, 2, 2, 1]);
    }

    #[test]
    fn test_blank_lines_emit_no_indent() {
        let source = "a = 1\n\n　　\nb = 2";
        assert_eq!(
            kinds(source),
            vec![
                Kind::Indent(0),
                Kind::Ident,
                Kind::Assign,
                Kind::Int,
                Kind::NewLine,
                Kind::NewLine,
                Kind::NewLine,
                Kind::Indent(0),
                Kind::Ident,
                Kind::Assign,
                Kind::Int,
                Kind::Eof,
            ]
        );
    }

    #[test]
    fn test_full_width_punctuation() {
        assert_eq!(
            kinds("表示する（1，2）"),
            vec![
                Kind::Indent(0),
                Kind::Word,
                Kind::LParen,
                Kind::Int,
                Kind::Comma,
                Kind::Int,
                Kind::RParen,
                Kind::Eof,
            ]
        );
        assert_eq!(
            kinds("a ≦ b ≠ c"),
            vec![
                Kind::Indent(0),
                Kind::Ident,
                Kind::LtEq,
                Kind::Ident,
                Kind::NotEq,
                Kind::Ident,
                Kind::Eof,
            ]
        );
    }

    #[test]
    fn test_lenticular_input_literal() {
        // The inner text contains the から keyword; the parser joins whatever
        // token run sits between the brackets.
        assert_eq!(
            kinds("x = 【外部からの入力】"),
            vec![
                Kind::Indent(0),
                Kind::Ident,
                Kind::Assign,
                Kind::LLenticular,
                Kind::Word,
                Kind::Kara,
                Kind::Word,
                Kind::RLenticular,
                Kind::Eof,
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("1 // 2 / 3 % 4 == 5 != 6 && true || !false"),
            vec![
                Kind::Indent(0),
                Kind::Int,
                Kind::IntDiv,
                Kind::Int,
                Kind::Slash,
                Kind::Int,
                Kind::Percent,
                Kind::Int,
                Kind::Eq,
                Kind::Int,
                Kind::NotEq,
                Kind::Int,
                Kind::And,
                Kind::True,
                Kind::Or,
                Kind::Bang,
                Kind::False,
                Kind::Eof,
            ]
        );
    }

    #[test]
    fn test_unexpected_character_stops_the_stream() {
        let mut stream = Scanner::new().scan_tokens("x = $y");
        let mut results = Vec::new();
        for item in stream.by_ref() {
            results.push(item);
        }

        assert_eq!(
            results.last(),
            Some(&Err(LexerError::UnexpectedCharacter { ch: '$', at: 4 }))
        );
        // Fused after the error, no eof token follows
        assert_eq!(stream.next(), None);
    }

    #[test]
    fn test_unterminated_string() {
        let result: Result<Vec<Token>, LexerError> =
            Scanner::new().scan_tokens("x = \"abc").collect();
        assert_eq!(result, Err(LexerError::UnexpectedEof { at: 8 }));
    }

    #[test]
    fn test_spans_are_monotone_and_disjoint() {
        let source = "もし x == 1 ならば:\n　表示する(x)\nそうでなければ:\n　クリア()";
        let tokens = scan(source);
        for pair in tokens.windows(2) {
            assert!(pair[0].span.end <= pair[1].span.start, "{:?}", pair);
        }
        assert_eq!(tokens.last().unwrap().kind, Kind::Eof);
    }

    #[test]
    fn test_round_trip_token_kinds() {
        // Joining the non-whitespace lexemes of a line with single spaces and
        // re-lexing must reproduce the same kind sequence.
        let source = "もし x<=10 ならば: 合計 = 合計+x, n = n//2";
        let originals = scan(source);
        let rendered: Vec<String> = originals
            .iter()
            .filter(|token| {
                !matches!(token.kind, Kind::Indent(_) | Kind::NewLine | Kind::Eof)
            })
            .map(|token| token.lexeme.clone())
            .collect();
        let rendered = rendered.join(" ");

        let relexed = scan(&rendered);
        let strip = |tokens: Vec<Token>| -> Vec<Kind> {
            tokens
                .into_iter()
                .filter(|token| {
                    !matches!(token.kind, Kind::Indent(_) | Kind::NewLine | Kind::Eof)
                })
                .map(|token| token.kind)
                .collect()
        };
        assert_eq!(strip(originals), strip(relexed));
    }
}
