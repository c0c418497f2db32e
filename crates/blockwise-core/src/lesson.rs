use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Heading(u8),
    Text,
    Quote,
    CodeLabel,
    Code,
    Blank,
}

/// One terminal row of a rendered lesson.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonLine {
    pub kind: LineKind,
    pub text: String,
}

impl LessonLine {
    fn new(kind: LineKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// Renders lesson markdown into display rows. Formatting that a terminal
/// cannot show (emphasis, images) degrades to its text.
pub fn render_lesson(input: &str) -> Vec<LessonLine> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(input, options);
    let mut writer = LessonWriter::default();
    for event in parser {
        writer.handle(event);
    }
    writer.finish()
}

pub fn render_lesson_text(input: &str) -> String {
    render_lesson(input)
        .into_iter()
        .map(|line| line.text)
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Default)]
struct LessonWriter {
    lines: Vec<LessonLine>,
    current: String,
    heading: Option<u8>,
    list_stack: Vec<ListState>,
    code: Option<String>,
    pending_link: Option<String>,
    blockquote_depth: usize,
}

#[derive(Clone, Copy)]
enum ListState {
    Bullet,
    Ordered(u64),
}

impl LessonWriter {
    fn handle(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => {
                if let Some(code) = self.code.as_mut() {
                    code.push_str(&text);
                } else {
                    self.push_text(&text);
                }
            }
            Event::Code(code) => self.push_text(&format!("`{code}`")),
            Event::SoftBreak => self.push_text(" "),
            Event::HardBreak => self.flush(),
            Event::Rule => {
                self.flush();
                self.lines.push(LessonLine::new(LineKind::Text, "―".repeat(24)));
                self.blank();
            }
            Event::Html(html) | Event::InlineHtml(html) => self.push_text(html.trim()),
            Event::FootnoteReference(_) | Event::TaskListMarker(_) => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => self.flush(),
            Tag::Heading { level, .. } => {
                self.flush();
                self.heading = Some(level as u8);
            }
            Tag::BlockQuote => {
                self.flush();
                self.blockquote_depth += 1;
            }
            Tag::CodeBlock(kind) => {
                self.flush();
                let label = match kind {
                    CodeBlockKind::Fenced(lang) if !lang.trim().is_empty() => {
                        format!("── {} ──", lang.trim())
                    }
                    _ => "── code ──".to_string(),
                };
                self.lines.push(LessonLine::new(LineKind::CodeLabel, label));
                self.code = Some(String::new());
            }
            Tag::List(start) => {
                self.flush();
                match start {
                    Some(v) => self.list_stack.push(ListState::Ordered(v)),
                    None => self.list_stack.push(ListState::Bullet),
                }
            }
            Tag::Item => {
                self.flush();
                self.prefix();
                if let Some(last) = self.list_stack.last_mut() {
                    match last {
                        ListState::Bullet => self.current.push_str("• "),
                        ListState::Ordered(n) => {
                            self.current.push_str(&format!("{}. ", *n));
                            *n += 1;
                        }
                    }
                }
            }
            Tag::Link { dest_url, .. } => {
                self.pending_link = Some(dest_url.to_string());
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => {
                self.flush();
                if self.list_stack.is_empty() {
                    self.blank();
                }
            }
            TagEnd::Heading(_) => {
                self.flush();
                self.heading = None;
                self.blank();
            }
            TagEnd::Item => self.flush(),
            TagEnd::BlockQuote => {
                self.flush();
                self.blockquote_depth = self.blockquote_depth.saturating_sub(1);
                self.blank();
            }
            TagEnd::CodeBlock => {
                if let Some(code) = self.code.take() {
                    for line in code.trim_end_matches('\n').split('\n') {
                        self.lines
                            .push(LessonLine::new(LineKind::Code, format!("  {line}")));
                    }
                }
                self.blank();
            }
            TagEnd::List(_) => {
                self.flush();
                self.list_stack.pop();
                if self.list_stack.is_empty() {
                    self.blank();
                }
            }
            TagEnd::Link => {
                if let Some(link) = self.pending_link.take() {
                    self.current.push_str(" (");
                    self.current.push_str(&link);
                    self.current.push(')');
                }
            }
            _ => {}
        }
    }

    fn prefix(&mut self) {
        if self.blockquote_depth > 0 {
            self.current
                .push_str(&format!("{} ", "│".repeat(self.blockquote_depth)));
        }
        if self.list_stack.len() > 1 {
            self.current
                .push_str(&"  ".repeat(self.list_stack.len().saturating_sub(1)));
        }
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if self.current.is_empty() {
            self.prefix();
        }
        self.current.push_str(text);
    }

    fn line_kind(&self) -> LineKind {
        if let Some(level) = self.heading {
            LineKind::Heading(level)
        } else if self.blockquote_depth > 0 {
            LineKind::Quote
        } else {
            LineKind::Text
        }
    }

    fn flush(&mut self) {
        if self.current.trim().is_empty() {
            self.current.clear();
            return;
        }
        let text = std::mem::take(&mut self.current);
        self.lines
            .push(LessonLine::new(self.line_kind(), text.trim_end().to_string()));
    }

    fn blank(&mut self) {
        if self
            .lines
            .last()
            .is_some_and(|line| line.kind != LineKind::Blank)
        {
            self.lines.push(LessonLine::new(LineKind::Blank, ""));
        }
    }

    fn finish(mut self) -> Vec<LessonLine> {
        self.flush();
        while self
            .lines
            .last()
            .is_some_and(|line| line.kind == LineKind::Blank)
        {
            self.lines.pop();
        }
        self.lines
    }
}
