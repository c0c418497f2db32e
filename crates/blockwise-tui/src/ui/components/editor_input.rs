use ratatui::layout::Rect;

const INDENT: &str = "    ";

/// Cursor-aware text buffer behind an editor pane. Byte offsets are kept on
/// char boundaries; rows are counted per `\n`, without soft wrapping.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EditorInputState {
    text: String,
    cursor: usize,
}

impl EditorInputState {
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            cursor: 0,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Loads a new document and puts the cursor at its start.
    pub fn load(&mut self, text: &str) {
        self.text = text.to_string();
        self.cursor = 0;
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn insert_char(&mut self, c: char) {
        self.text.insert(self.cursor, c);
        self.cursor += c.len_utf8();
    }

    pub fn insert_newline(&mut self) {
        // Carry the current line's leading whitespace onto the new line.
        let start = self.line_start(self.cursor);
        let indent = self.text[start..self.cursor]
            .chars()
            .take_while(|c| *c == ' ' || *c == '\t')
            .collect::<String>();
        self.insert_str("\n");
        self.insert_str(&indent);
    }

    pub fn insert_indent(&mut self) {
        self.insert_str(INDENT);
    }

    pub fn insert_str(&mut self, s: &str) {
        if s.is_empty() {
            return;
        }
        self.text.insert_str(self.cursor, s);
        self.cursor += s.len();
    }

    pub fn backspace(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        let prev = self.prev_boundary(self.cursor);
        self.text.drain(prev..self.cursor);
        self.cursor = prev;
        true
    }

    pub fn delete_forward(&mut self) -> bool {
        if self.cursor >= self.text.len() {
            return false;
        }
        let next = self.next_boundary(self.cursor);
        self.text.drain(self.cursor..next);
        true
    }

    pub fn move_left(&mut self) {
        self.cursor = self.prev_boundary(self.cursor);
    }

    pub fn move_right(&mut self) {
        self.cursor = self.next_boundary(self.cursor);
    }

    pub fn move_home(&mut self) {
        self.cursor = self.line_start(self.cursor);
    }

    pub fn move_end(&mut self) {
        self.cursor = self.line_end(self.cursor);
    }

    pub fn move_line_up(&mut self) {
        let col = self.column_chars(self.cursor);
        let line_start = self.line_start(self.cursor);
        if line_start == 0 {
            return;
        }
        let prev_line_end = line_start - 1;
        let prev_line_start = self.line_start(prev_line_end);
        self.cursor = self.byte_at_col(prev_line_start, prev_line_end, col);
    }

    pub fn move_line_down(&mut self) {
        let col = self.column_chars(self.cursor);
        let line_end = self.line_end(self.cursor);
        if line_end >= self.text.len() {
            return;
        }
        let next_line_start = line_end + 1;
        let next_line_end = self.line_end(next_line_start);
        self.cursor = self.byte_at_col(next_line_start, next_line_end, col);
    }

    /// Zero-based (row, column) of the cursor, column counted in chars.
    pub fn cursor_row_col(&self) -> (usize, usize) {
        let before = &self.text[..self.cursor];
        let row = before.matches('\n').count();
        (row, self.column_chars(self.cursor))
    }

    /// First visible row so the cursor stays inside a viewport of `rows`.
    pub fn scroll_for(&self, rows: u16, previous: u16) -> u16 {
        let rows = rows.max(1) as usize;
        let (row, _) = self.cursor_row_col();
        let previous = previous as usize;
        let top = if row < previous {
            row
        } else if row >= previous + rows {
            row + 1 - rows
        } else {
            previous
        };
        top.min(u16::MAX as usize) as u16
    }

    /// Terminal position of the cursor inside a bordered `area` scrolled to
    /// `scroll` rows, clamped to the inner box.
    pub fn cursor_screen_pos(&self, area: Rect, scroll: u16) -> (u16, u16) {
        let inner_x = area.x.saturating_add(1);
        let inner_y = area.y.saturating_add(1);
        let inner_w = area.width.saturating_sub(2).max(1);
        let inner_h = area.height.saturating_sub(2).max(1);
        let (row, col) = self.cursor_row_col();
        let visible_row = (row as u16).saturating_sub(scroll).min(inner_h - 1);
        let x = inner_x.saturating_add((col as u16).min(inner_w - 1));
        (x, inner_y.saturating_add(visible_row))
    }

    fn line_start(&self, pos: usize) -> usize {
        let p = self.clamp_boundary(pos);
        self.text[..p].rfind('\n').map(|i| i + 1).unwrap_or(0)
    }

    fn line_end(&self, pos: usize) -> usize {
        let p = self.clamp_boundary(pos);
        self.text[p..]
            .find('\n')
            .map(|i| p + i)
            .unwrap_or(self.text.len())
    }

    fn column_chars(&self, pos: usize) -> usize {
        let start = self.line_start(pos);
        self.text[start..pos].chars().count()
    }

    fn byte_at_col(&self, line_start: usize, line_end: usize, target_col: usize) -> usize {
        self.text[line_start..line_end]
            .char_indices()
            .nth(target_col)
            .map(|(off, _)| line_start + off)
            .unwrap_or(line_end)
    }

    fn clamp_boundary(&self, pos: usize) -> usize {
        let p = pos.min(self.text.len());
        if self.text.is_char_boundary(p) {
            p
        } else {
            self.prev_boundary(p)
        }
    }

    fn prev_boundary(&self, pos: usize) -> usize {
        self.text[..pos.min(self.text.len())]
            .char_indices()
            .next_back()
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    fn next_boundary(&self, pos: usize) -> usize {
        self.text[pos.min(self.text.len())..]
            .chars()
            .next()
            .map(|c| pos + c.len_utf8())
            .unwrap_or(self.text.len())
    }
}
