/// Lines longer than this are wrapped where the language allows it.
pub const MAX_WIDTH: usize = 79;
const INDENT: &str = "    ";

/// Indentation aware text buffer for generated source code.
#[derive(Debug, Default)]
pub struct CodeWriter {
    buf: String,
    indent: usize,
}

impl CodeWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn indent(&mut self) {
        self.indent += 1;
    }

    pub fn dedent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    fn push_indent(&mut self) {
        for _ in 0..self.indent {
            self.buf.push_str(INDENT);
        }
    }

    pub fn line(&mut self, text: &str) {
        if !text.is_empty() {
            self.push_indent();
            self.buf.push_str(text);
        }
        self.buf.push('\n');
    }

    pub fn blank(&mut self) {
        self.buf.push('\n');
    }

    /// Copies `text` verbatim, without indentation.
    pub fn raw(&mut self, text: &str) {
        self.buf.push_str(text);
        if !text.ends_with('\n') {
            self.buf.push('\n');
        }
    }

    /// Writes `head item, item, ... tail`, breaking between items once the line
    /// gets too long. `head` must open a bracket so the continuation is legal.
    pub fn list_line(&mut self, head: &str, items: &[String], tail: &str) {
        let width = self.indent * INDENT.len();
        let single = format!("{}{}{}", head, items.join(", "), tail);
        if width + single.len() <= MAX_WIDTH || items.len() < 2 {
            self.line(&single);
            return;
        }
        let continuation = " ".repeat(width + 2 * INDENT.len());
        let mut current = format!("{}{}", head, items[0]);
        let mut current_width = width + current.len();
        self.push_indent();
        for item in &items[1..] {
            // ", " before the item and the tail or "," after it
            if current_width + 2 + item.len() + 1 > MAX_WIDTH {
                self.buf.push_str(&current);
                self.buf.push_str(",\n");
                current = format!("{}{}", continuation, item);
                current_width = current.len();
            } else {
                current.push_str(", ");
                current.push_str(item);
                current_width += 2 + item.len();
            }
        }
        self.buf.push_str(&current);
        self.buf.push_str(tail);
        self.buf.push('\n');
    }

    pub(crate) fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn finish(self) -> String {
        self.buf
    }
}
