//! Caret diagnostics shared by every error family. Columns are counted in
//! characters; caret alignment is computed in display-width cells, where an
//! ASCII character occupies one cell and everything else (full-width
//! punctuation, kana, kanji) occupies two.

pub fn char_width(c: char) -> usize {
    if c.is_ascii() {
        1
    } else {
        2
    }
}

pub fn display_width(text: &str) -> usize {
    text.chars().map(char_width).sum()
}

// Maps character offsets to 1-based line/column pairs. Built once per source,
// reused for every diagnostic and debug event of that run.
pub struct LineIndex {
    starts: Vec<usize>,
    lines: Vec<String>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut starts = vec![0];
        let mut lines = Vec::new();
        let mut line = String::new();
        let mut offset = 0;

        for c in source.chars() {
            offset += 1;
            if c == '\n' {
                lines.push(std::mem::take(&mut line));
                starts.push(offset);
            } else {
                line.push(c);
            }
        }
        lines.push(line);

        LineIndex { starts, lines }
    }

    pub fn line_col(&self, at: usize) -> (usize, usize) {
        let line = match self.starts.binary_search(&at) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        };
        let line = line.min(self.lines.len() - 1);
        (line + 1, at - self.starts[line] + 1)
    }

    pub fn line(&self, number: usize) -> &str {
        &self.lines[number - 1]
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }
}

// Renders the standard diagnostic block: position header, up to two preceding
// source lines plus the offending line, and a caret run under the offending
// range. The output is a pure function of (source, range, message).
pub fn render(source: &str, start: usize, end: usize, message: &str) -> String {
    let index = LineIndex::new(source);
    let (line, col) = index.line_col(start);

    let mut out = String::new();
    out.push_str(&format!("{}行目 {}文字目: {}\n", line, col, message));

    let first = if line > 2 { line - 2 } else { 1 };
    for number in first..=line {
        out.push_str(index.line(number));
        out.push('\n');
    }

    let text = index.line(line);
    let pad: usize = text.chars().take(col - 1).map(char_width).sum();
    let carets: usize = text
        .chars()
        .skip(col - 1)
        .take(end.saturating_sub(start))
        .map(char_width)
        .sum();

    out.push_str(&" ".repeat(pad));
    out.push_str(&"^".repeat(carets.max(1)));
    out
}

#[cfg(test)]
mod tests {
    use crate::report::{display_width, render, LineIndex};

    #[test]
    fn test_line_col() {
        let index = LineIndex::new("abc\nもし x\nz");
        assert_eq!(index.line_count(), 3);
        assert_eq!(index.line_col(0), (1, 1));
        assert_eq!(index.line_col(2), (1, 3));
        assert_eq!(index.line_col(4), (2, 1));
        assert_eq!(index.line_col(7), (2, 4));
        assert_eq!(index.line_col(9), (3, 1));
    }

    #[test]
    fn test_display_width_mixes_scripts() {
        assert_eq!(display_width("abc"), 3);
        assert_eq!(display_width("もし"), 4);
        assert_eq!(display_width("x値"), 3);
    }

    #[test]
    fn test_caret_aligns_under_japanese_source() {
        // The caret must sit under 値 even though the preceding characters
        // are a mix of half-width and full-width cells.
        let source = "表示する(値)";
        let rendered = render(source, 5, 6, "変数 '値' は定義されていません");
        assert_eq!(
            rendered,
            "1行目 6文字目: 変数 '値' は定義されていません\n\
             表示する(値)\n         ^^"
        );
    }

    #[test]
    fn test_render_shows_preceding_lines() {
        let source = "a = 1\nb = 2\nc = 3\nd = x";
        let rendered = render(source, 22, 23, "見つかりません");
        assert_eq!(
            rendered,
            "4行目 5文字目: 見つかりません\nb = 2\nc = 3\nd = x\n    ^"
        );
    }

    #[test]
    fn test_render_is_idempotent() {
        let source = "x = y + 1";
        let first = render(source, 4, 5, "未定義");
        let second = render(source, 4, 5, "未定義");
        assert_eq!(first, second);
    }
}
