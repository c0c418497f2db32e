use blockwise_core::NotificationKind;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame,
};

pub mod components;
pub mod markdown;
pub mod spinner;

use crate::app::{App, AppState, EditorPane, Focus, LoginField, TaskScreen};
use crate::ui::components::tab_bar::TabBar;

pub fn draw(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(f.area());

    draw_status_bar(f, app, chunks[0]);
    match app.state {
        AppState::Login => draw_login(f, app, chunks[1]),
        AppState::Chapters => draw_chapters(f, app, chunks[1]),
        AppState::ChapterTasks => draw_chapter_tasks(f, app, chunks[1]),
        AppState::Task => draw_task(f, app, chunks[1]),
    }
    draw_hints(f, app, chunks[2]);
    draw_toasts(f, app);
}

fn draw_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let identity = app
        .signed_in_as()
        .unwrap_or_else(|| "signed out".to_string());
    let mut spans = vec![Span::styled(
        format!(" BlockWise | {identity} "),
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )];
    if let Some(label) = &app.loading {
        spans.push(Span::styled(
            format!("| {} {label} ", spinner::frame_for_tick(app.tick_count)),
            Style::default().fg(Color::Yellow),
        ));
    }
    if let Some(err) = &app.error {
        spans.push(Span::styled(
            format!("| {err} "),
            Style::default().fg(Color::Red),
        ));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_hints(f: &mut Frame, app: &App, area: Rect) {
    let hint = match app.state {
        AppState::Login => "Tab switch field · Enter sign in · Esc quit",
        AppState::Chapters => "j/k move · Enter open · r refresh · o sign out · q quit",
        AppState::ChapterTasks => "j/k move · Enter open task · r refresh · Esc back",
        AppState::Task => match app.task.as_ref().map(|screen| screen.focus) {
            Some(Focus::Editing) => "type to edit · Ctrl+R run · Esc stop editing",
            _ => "Tab focus · l language · [ ] tabs · 1-9 pick tab · i edit · r run · Esc back",
        },
    };
    let widget = Paragraph::new(hint).style(Style::default().fg(Color::DarkGray));
    f.render_widget(widget, area);
}

fn draw_login(f: &mut Frame, app: &App, area: Rect) {
    let form = &app.login;
    let popup_h = if form.error.is_some() { 10 } else { 9 };
    let popup_area = centered_fixed_rect(56, popup_h, area);
    f.render_widget(Clear, popup_area);

    let popup_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Sign in to BlockWise ");
    let inner = popup_block.inner(popup_area);
    f.render_widget(popup_block, popup_area);

    let mut rows = vec![
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Length(1),
    ];
    if form.error.is_some() {
        rows.push(Constraint::Length(1));
    }
    let content = Layout::default()
        .direction(Direction::Vertical)
        .constraints(rows)
        .split(inner);

    let masked = "*".repeat(form.password.chars().count());
    let fields = [
        (LoginField::Email, "Email", form.email.as_str()),
        (LoginField::Password, "Password", masked.as_str()),
    ];
    for (i, (field, label, value)) in fields.into_iter().enumerate() {
        let active = form.field == field;
        let border = if active {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let widget = Paragraph::new(value.to_string()).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border)
                .title(label),
        );
        f.render_widget(widget, content[i]);
        if active && !form.pending {
            let x = content[i].x + 1 + value.chars().count() as u16;
            let x = x.min(content[i].right().saturating_sub(2));
            f.set_cursor_position((x, content[i].y + 1));
        }
    }

    let status = if form.pending {
        format!("{} signing in", spinner::frame_for_tick(app.tick_count))
    } else {
        "Enter to sign in".to_string()
    };
    let status_widget = Paragraph::new(status)
        .style(Style::default().fg(Color::Gray))
        .alignment(Alignment::Center);
    f.render_widget(status_widget, content[2]);

    if let Some(err) = &form.error {
        let error_widget = Paragraph::new(err.as_str())
            .style(Style::default().fg(Color::Red))
            .alignment(Alignment::Center);
        f.render_widget(error_widget, content[3]);
    }
}

fn draw_chapters(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title(" Chapters ");
    if app.chapters.items.is_empty() {
        let text = if app.loading.is_some() {
            "Loading chapters..."
        } else {
            "No chapters yet. Press 'r' to refresh."
        };
        let content = Paragraph::new(text)
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(content, area);
        return;
    }
    let items = app
        .chapters
        .items
        .iter()
        .enumerate()
        .map(|(i, chapter)| {
            list_item(
                &chapter.title,
                &chapter.description,
                i == app.chapters.selected,
            )
        })
        .collect::<Vec<_>>();
    f.render_widget(List::new(items).block(block), area);
}

fn draw_chapter_tasks(f: &mut Frame, app: &App, area: Rect) {
    let Some(view) = app.chapter_view.as_ref() else {
        return;
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} ", view.chapter.title));
    if view.tasks.items.is_empty() {
        let text = if app.loading.is_some() {
            "Loading tasks..."
        } else {
            "This chapter has no tasks."
        };
        let content = Paragraph::new(text)
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(content, area);
        return;
    }
    let items = view
        .tasks
        .items
        .iter()
        .enumerate()
        .map(|(i, task)| list_item(&task.title, &task.description, i == view.tasks.selected))
        .collect::<Vec<_>>();
    f.render_widget(List::new(items).block(block), area);
}

fn list_item<'a>(title: &'a str, description: &'a str, selected: bool) -> ListItem<'a> {
    let title_style = if selected {
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    let marker = if selected { "> " } else { "  " };
    let mut lines = vec![Line::from(vec![
        Span::styled(marker, title_style),
        Span::styled(title, title_style),
    ])];
    if !description.is_empty() {
        lines.push(Line::from(Span::styled(
            format!("    {description}"),
            Style::default().fg(Color::Gray),
        )));
    }
    ListItem::new(lines)
}

fn draw_task(f: &mut Frame, app: &mut App, area: Rect) {
    let tick = app.tick_count;
    let compiling = blockwise_types::Language::ALL.map(|language| app.is_compiling(language));
    let Some(screen) = app.task.as_mut() else {
        return;
    };

    if screen.is_text_only() {
        draw_lesson(f, screen, area);
        return;
    }

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(area);
    draw_lesson(f, screen, columns[0]);

    let pane_count = screen.panes.len().max(1) as u32;
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            (0..pane_count)
                .map(|_| Constraint::Ratio(1, pane_count))
                .collect::<Vec<_>>(),
        )
        .split(columns[1]);

    let focus = screen.focus;
    let active_pane = screen.active_pane;
    for (i, pane) in screen.panes.iter_mut().enumerate() {
        let is_compiling = blockwise_types::Language::ALL
            .iter()
            .position(|language| *language == pane.language)
            .is_some_and(|idx| compiling[idx]);
        let pane_focus = if i == active_pane { Some(focus) } else { None };
        draw_editor_pane(f, pane, rows[i], pane_focus, is_compiling, tick);
    }
}

fn draw_lesson(f: &mut Frame, screen: &TaskScreen, area: Rect) {
    let border = if screen.focus == Focus::Lesson {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border)
        .title(format!(" {} ", screen.task.title));
    let widget = Paragraph::new(markdown::to_lines(&screen.lesson))
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((screen.lesson_scroll, 0));
    f.render_widget(widget, area);
}

fn draw_editor_pane(
    f: &mut Frame,
    pane: &mut EditorPane,
    area: Rect,
    focus: Option<Focus>,
    compiling: bool,
    tick: usize,
) {
    let mut title = vec![Span::styled(
        format!(" {} ", pane.language.display_name()),
        Style::default().add_modifier(Modifier::BOLD),
    )];
    if !pane.tabs.is_editable() {
        title.push(Span::styled(
            "[read-only] ",
            Style::default().fg(Color::Magenta),
        ));
    } else if pane.tabs.is_dirty() {
        title.push(Span::styled("[modified] ", Style::default().fg(Color::Gray)));
    }
    if compiling {
        title.push(Span::styled(
            format!("{} compiling ", spinner::frame_for_tick(tick)),
            Style::default().fg(Color::Yellow),
        ));
    }

    let border = match focus {
        Some(Focus::Editing) => Style::default().fg(Color::Yellow),
        Some(Focus::Editor) => Style::default().fg(Color::Cyan),
        _ => Style::default().fg(Color::DarkGray),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border)
        .title(Line::from(title));
    let inner = block.inner(area);
    f.render_widget(block, area);
    if inner.height == 0 {
        return;
    }

    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(0)])
        .split(inner);
    f.render_widget(
        TabBar::new(&pane.tabs).focused(focus.is_some()),
        parts[0],
    );

    let text_area = parts[1];
    pane.scroll = pane.input.scroll_for(text_area.height, pane.scroll);
    let text_style = if pane.tabs.is_editable() {
        Style::default()
    } else {
        Style::default().fg(Color::Gray)
    };
    let widget = Paragraph::new(pane.input.text().to_string())
        .style(text_style)
        .scroll((pane.scroll, 0));
    f.render_widget(widget, text_area);

    if focus == Some(Focus::Editing) {
        // `cursor_screen_pos` expects a bordered box; widen by one cell each side.
        let framed = Rect::new(
            text_area.x.saturating_sub(1),
            text_area.y.saturating_sub(1),
            text_area.width + 2,
            text_area.height + 2,
        );
        f.set_cursor_position(pane.input.cursor_screen_pos(framed, pane.scroll));
    }
}

fn draw_toasts(f: &mut Frame, app: &App) {
    if app.toasts.is_empty() {
        return;
    }
    let area = f.area();
    let width = 44.min(area.width);
    let height = (app.toasts.len() as u16 + 2).min(area.height);
    let toast_area = Rect::new(
        area.right().saturating_sub(width + 1),
        area.bottom().saturating_sub(height + 1),
        width,
        height,
    );
    let lines = app
        .toasts
        .iter()
        .map(|toast| {
            let color = match toast.notification.kind {
                NotificationKind::Success => Color::Green,
                NotificationKind::Failure => Color::Red,
            };
            Line::from(Span::styled(
                toast.notification.to_string(),
                Style::default().fg(color),
            ))
        })
        .collect::<Vec<_>>();
    f.render_widget(Clear, toast_area);
    f.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL)),
        toast_area,
    );
}

fn centered_fixed_rect(width: u16, height: u16, area: Rect) -> Rect {
    let w = width.min(area.width.max(1));
    let h = height.min(area.height.max(1));
    let x = area.x + (area.width.saturating_sub(w)) / 2;
    let y = area.y + (area.height.saturating_sub(h)) / 2;
    Rect::new(x, y, w, h)
}
