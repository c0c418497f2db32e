use blockwise_core::TabModel;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Widget,
};

/// One-row strip of a pane's visible tabs. The editable tab is marked with a
/// pencil, reference tabs with a lock.
pub struct TabBar<'a> {
    tabs: &'a TabModel,
    focused: bool,
}

impl<'a> TabBar<'a> {
    pub fn new(tabs: &'a TabModel) -> Self {
        Self {
            tabs,
            focused: false,
        }
    }

    pub fn focused(mut self, focused: bool) -> Self {
        self.focused = focused;
        self
    }

    pub fn line(&self) -> Line<'a> {
        let mut spans = Vec::with_capacity(self.tabs.tab_count() * 2);
        for (i, tab) in self.tabs.visible_tabs().enumerate() {
            let marker = if i == 0 { "✎" } else { "🔒" };
            let name = if tab.name.is_empty() {
                "untitled"
            } else {
                tab.name.as_str()
            };
            let style = if i == self.tabs.selected_index() {
                let base = Style::default().add_modifier(Modifier::BOLD | Modifier::REVERSED);
                if self.focused {
                    base.fg(Color::Yellow)
                } else {
                    base
                }
            } else {
                Style::default().fg(Color::Gray)
            };
            spans.push(Span::styled(format!(" {} {marker} {name} ", i + 1), style));
            spans.push(Span::raw(" "));
        }
        Line::from(spans)
    }
}

impl Widget for TabBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 || area.width == 0 {
            return;
        }
        let line = self.line();
        buf.set_line(area.x, area.y, &line, area.width);
    }
}
