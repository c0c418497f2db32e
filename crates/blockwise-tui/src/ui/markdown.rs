use blockwise_core::{LessonLine, LineKind};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

pub fn lesson_style(kind: LineKind) -> Style {
    match kind {
        LineKind::Heading(1) => Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        LineKind::Heading(_) => Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
        LineKind::Quote => Style::default()
            .fg(Color::Gray)
            .add_modifier(Modifier::ITALIC),
        LineKind::CodeLabel => Style::default().fg(Color::DarkGray),
        LineKind::Code => Style::default().fg(Color::Yellow),
        LineKind::Text | LineKind::Blank => Style::default(),
    }
}

pub fn to_lines(lesson: &[LessonLine]) -> Vec<Line<'static>> {
    lesson
        .iter()
        .map(|line| Line::from(Span::styled(line.text.clone(), lesson_style(line.kind))))
        .collect()
}
