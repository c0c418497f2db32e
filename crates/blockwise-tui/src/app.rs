use std::collections::VecDeque;
use std::future::Future;

use blockwise_client::{ApiClient, ApiError};
use blockwise_core::{
    render_lesson, AuthSession, CompileController, LessonLine, Notification, SessionStore,
    TabError, TabModel,
};
use blockwise_types::{Chapter, CodeSection, Credentials, Language, Task, TaskSummary};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tokio::sync::mpsc::UnboundedSender;

use crate::ui::components::editor_input::EditorInputState;

/// Ticks a toast stays on screen (250ms each).
const TOAST_TICKS: usize = 16;
const MAX_TOASTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadError {
    pub message: String,
    pub needs_login: bool,
}

impl From<ApiError> for LoadError {
    fn from(err: ApiError) -> Self {
        let needs_login = matches!(err, ApiError::Session(_)) || err.status() == Some(401);
        Self {
            message: err.to_string(),
            needs_login,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Quit,
    Back,
    LoginInput(char),
    LoginBackspace,
    LoginSwitchField,
    SubmitLogin,
    SignedIn(Result<AuthSession, LoadError>),
    SignOut,
    NextItem,
    PreviousItem,
    OpenSelected,
    Refresh,
    ChaptersLoaded(Result<Vec<Chapter>, LoadError>),
    ChapterTasksLoaded {
        chapter_id: i64,
        result: Result<Vec<TaskSummary>, LoadError>,
    },
    TaskLoaded(Result<Task, LoadError>),
    CycleFocus,
    NextPane,
    NextTab,
    PreviousTab,
    SelectTab(usize),
    StartEditing,
    StopEditing,
    Edit(KeyEvent),
    ScrollLesson(i16),
    Run,
    Notified(Notification),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Login,
    Chapters,
    ChapterTasks,
    Task,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoginField {
    #[default]
    Email,
    Password,
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    pub field: LoginField,
    pub error: Option<String>,
    pub pending: bool,
}

/// A list with a wrapping cursor.
#[derive(Debug, Clone)]
pub struct Selectable<T> {
    pub items: Vec<T>,
    pub selected: usize,
}

impl<T> Default for Selectable<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            selected: 0,
        }
    }
}

impl<T> Selectable<T> {
    pub fn set(&mut self, items: Vec<T>) {
        self.items = items;
        if self.selected >= self.items.len() {
            self.selected = self.items.len().saturating_sub(1);
        }
    }

    pub fn next(&mut self) {
        if !self.items.is_empty() {
            self.selected = (self.selected + 1) % self.items.len();
        }
    }

    pub fn previous(&mut self) {
        if !self.items.is_empty() {
            if self.selected > 0 {
                self.selected -= 1;
            } else {
                self.selected = self.items.len() - 1;
            }
        }
    }

    pub fn current(&self) -> Option<&T> {
        self.items.get(self.selected)
    }
}

pub struct ChapterView {
    pub chapter: Chapter,
    pub tasks: Selectable<TaskSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Lesson,
    Editor,
    Editing,
}

/// One language's editor: the tab model plus the text widget showing its
/// buffer.
pub struct EditorPane {
    pub language: Language,
    pub tabs: TabModel,
    pub input: EditorInputState,
    pub scroll: u16,
}

impl EditorPane {
    pub fn new(language: Language, section: &CodeSection) -> Self {
        let tabs = TabModel::from_section(section);
        let input = EditorInputState::with_text(tabs.buffer());
        Self {
            language,
            tabs,
            input,
            scroll: 0,
        }
    }

    fn sync_input(&mut self) {
        self.input.load(self.tabs.buffer());
        self.scroll = 0;
    }

    pub fn select_tab(&mut self, index: usize) -> Result<(), TabError> {
        self.tabs.select_tab(index)?;
        self.sync_input();
        Ok(())
    }

    pub fn next_tab(&mut self) {
        self.tabs.select_next();
        self.sync_input();
    }

    pub fn previous_tab(&mut self) {
        self.tabs.select_previous();
        self.sync_input();
    }

    pub fn replace_section(&mut self, section: &CodeSection) {
        self.tabs
            .on_current_tab_replaced(section.current_tab.clone(), section.tabs.clone());
        self.sync_input();
    }

    /// Applies one editing key. Cursor movement works on every tab; text
    /// changes reach the buffer only on the editable tab. Returns whether
    /// the buffer changed.
    pub fn apply_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Left => self.input.move_left(),
            KeyCode::Right => self.input.move_right(),
            KeyCode::Up => self.input.move_line_up(),
            KeyCode::Down => self.input.move_line_down(),
            KeyCode::Home => self.input.move_home(),
            KeyCode::End => self.input.move_end(),
            _ => {}
        }
        if !self.tabs.is_editable() {
            return false;
        }
        let changed = match key.code {
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.input.insert_char(c);
                true
            }
            KeyCode::Enter => {
                self.input.insert_newline();
                true
            }
            KeyCode::Tab => {
                self.input.insert_indent();
                true
            }
            KeyCode::Backspace => self.input.backspace(),
            KeyCode::Delete => self.input.delete_forward(),
            _ => false,
        };
        if changed {
            self.tabs.edit_content(self.input.text());
        }
        changed
    }
}

pub struct TaskScreen {
    pub task: Task,
    pub lesson: Vec<LessonLine>,
    pub lesson_scroll: u16,
    pub panes: Vec<EditorPane>,
    pub active_pane: usize,
    pub focus: Focus,
}

impl TaskScreen {
    pub fn new(task: Task) -> Self {
        let panes = if task.is_text_only() {
            Vec::new()
        } else {
            Language::ALL
                .iter()
                .map(|&language| EditorPane::new(language, task.section(language)))
                .collect()
        };
        Self {
            lesson: render_lesson(&task.text),
            lesson_scroll: 0,
            panes,
            active_pane: 0,
            focus: Focus::Lesson,
            task,
        }
    }

    pub fn is_text_only(&self) -> bool {
        self.panes.is_empty()
    }

    pub fn active(&self) -> Option<&EditorPane> {
        self.panes.get(self.active_pane)
    }

    pub fn active_mut(&mut self) -> Option<&mut EditorPane> {
        self.panes.get_mut(self.active_pane)
    }

    /// Applies a refetch of the task on screen. Panes keep their identity
    /// and re-derive selection from the new tab data.
    pub fn refresh(&mut self, task: Task) {
        if task.is_text_only() != self.is_text_only() {
            *self = Self::new(task);
            return;
        }
        for pane in &mut self.panes {
            pane.replace_section(task.section(pane.language));
        }
        self.lesson = render_lesson(&task.text);
        self.task = task;
    }

    fn scroll_lesson(&mut self, delta: i16) {
        let max = self.lesson.len().saturating_sub(1).min(u16::MAX as usize) as u16;
        self.lesson_scroll = self
            .lesson_scroll
            .saturating_add_signed(delta)
            .min(max);
    }
}

pub struct Toast {
    pub notification: Notification,
    pub expires_at: usize,
}

pub struct App {
    pub state: AppState,
    pub should_quit: bool,
    pub tick_count: usize,
    pub login: LoginForm,
    pub chapters: Selectable<Chapter>,
    pub chapter_view: Option<ChapterView>,
    pub task: Option<TaskScreen>,
    pub loading: Option<String>,
    pub error: Option<String>,
    pub toasts: VecDeque<Toast>,
    client: ApiClient,
    controller: CompileController,
    session_store: SessionStore,
    actions: UnboundedSender<Action>,
}

impl App {
    pub fn new(
        client: ApiClient,
        controller: CompileController,
        session_store: SessionStore,
        actions: UnboundedSender<Action>,
    ) -> Self {
        let state = if client.session().is_signed_in() {
            AppState::Chapters
        } else {
            AppState::Login
        };
        Self {
            state,
            should_quit: false,
            tick_count: 0,
            login: LoginForm::default(),
            chapters: Selectable::default(),
            chapter_view: None,
            task: None,
            loading: None,
            error: None,
            toasts: VecDeque::new(),
            client,
            controller,
            session_store,
            actions,
        }
    }

    /// Kicks off the first fetch for the initial screen.
    pub fn start(&mut self) {
        if self.state == AppState::Chapters {
            self.load_chapters();
        }
    }

    pub fn signed_in_as(&self) -> Option<String> {
        self.client.session().current().map(|session| session.email)
    }

    pub fn is_compiling(&self, language: Language) -> bool {
        self.controller.is_compiling(language)
    }

    pub fn handle_key_event(&self, key: KeyEvent) -> Option<Action> {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('c') => return Some(Action::Quit),
                KeyCode::Char('r') if self.state == AppState::Task => return Some(Action::Run),
                _ => {}
            }
        }

        match self.state {
            AppState::Login => match key.code {
                KeyCode::Esc => Some(Action::Quit),
                KeyCode::Enter => Some(Action::SubmitLogin),
                KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
                    Some(Action::LoginSwitchField)
                }
                KeyCode::Backspace => Some(Action::LoginBackspace),
                KeyCode::Char(c) => Some(Action::LoginInput(c)),
                _ => None,
            },
            AppState::Chapters | AppState::ChapterTasks => match key.code {
                KeyCode::Char('q') if self.state == AppState::Chapters => Some(Action::Quit),
                KeyCode::Char('q') | KeyCode::Esc | KeyCode::Backspace => Some(Action::Back),
                KeyCode::Char('j') | KeyCode::Down => Some(Action::NextItem),
                KeyCode::Char('k') | KeyCode::Up => Some(Action::PreviousItem),
                KeyCode::Enter => Some(Action::OpenSelected),
                KeyCode::Char('r') | KeyCode::F(5) => Some(Action::Refresh),
                KeyCode::Char('o') => Some(Action::SignOut),
                _ => None,
            },
            AppState::Task => {
                let focus = self.task.as_ref().map(|screen| screen.focus);
                if focus == Some(Focus::Editing) {
                    return match key.code {
                        KeyCode::Esc => Some(Action::StopEditing),
                        _ => Some(Action::Edit(key)),
                    };
                }
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => Some(Action::Back),
                    KeyCode::Tab => Some(Action::CycleFocus),
                    KeyCode::Char('l') => Some(Action::NextPane),
                    KeyCode::Char(']') => Some(Action::NextTab),
                    KeyCode::Char('[') => Some(Action::PreviousTab),
                    KeyCode::Char(c @ '1'..='9') => {
                        Some(Action::SelectTab(c as usize - '1' as usize))
                    }
                    KeyCode::Char('i') | KeyCode::Enter => Some(Action::StartEditing),
                    KeyCode::Char('r') => Some(Action::Run),
                    KeyCode::Char('k') | KeyCode::Up => Some(Action::ScrollLesson(-1)),
                    KeyCode::Char('j') | KeyCode::Down => Some(Action::ScrollLesson(1)),
                    KeyCode::PageUp => Some(Action::ScrollLesson(-10)),
                    KeyCode::PageDown => Some(Action::ScrollLesson(10)),
                    KeyCode::F(5) => Some(Action::Refresh),
                    _ => None,
                }
            }
        }
    }

    pub async fn update(&mut self, action: Action) -> anyhow::Result<()> {
        match action {
            Action::Quit => self.should_quit = true,

            Action::LoginInput(c) => match self.login.field {
                LoginField::Email => self.login.email.push(c),
                LoginField::Password => self.login.password.push(c),
            },
            Action::LoginBackspace => {
                match self.login.field {
                    LoginField::Email => self.login.email.pop(),
                    LoginField::Password => self.login.password.pop(),
                };
            }
            Action::LoginSwitchField => {
                self.login.field = match self.login.field {
                    LoginField::Email => LoginField::Password,
                    LoginField::Password => LoginField::Email,
                };
            }
            Action::SubmitLogin => self.submit_login(),
            Action::SignedIn(Ok(session)) => {
                self.login = LoginForm::default();
                if let Err(err) = self.session_store.save(&session).await {
                    tracing::warn!("failed to persist session: {err:#}");
                }
                self.state = AppState::Chapters;
                self.load_chapters();
            }
            Action::SignedIn(Err(err)) => {
                self.login.pending = false;
                self.login.password.clear();
                self.login.error = Some(err.message);
            }
            Action::SignOut => self.sign_out().await,

            Action::NextItem => self.move_selection(true),
            Action::PreviousItem => self.move_selection(false),
            Action::OpenSelected => match self.state {
                AppState::Chapters => {
                    if let Some(chapter) = self.chapters.current().cloned() {
                        let chapter_id = chapter.id;
                        self.chapter_view = Some(ChapterView {
                            chapter,
                            tasks: Selectable::default(),
                        });
                        self.state = AppState::ChapterTasks;
                        self.load_chapter_tasks(chapter_id);
                    }
                }
                AppState::ChapterTasks => {
                    let task_id = self
                        .chapter_view
                        .as_ref()
                        .and_then(|view| view.tasks.current())
                        .map(|task| task.id);
                    if let Some(task_id) = task_id {
                        self.task = None;
                        self.load_task(task_id);
                    }
                }
                _ => {}
            },
            Action::Refresh => match self.state {
                AppState::Chapters => self.load_chapters(),
                AppState::ChapterTasks => {
                    if let Some(chapter_id) = self.chapter_view.as_ref().map(|v| v.chapter.id) {
                        self.load_chapter_tasks(chapter_id);
                    }
                }
                AppState::Task => {
                    if let Some(task_id) = self.task.as_ref().map(|s| s.task.id) {
                        self.load_task(task_id);
                    }
                }
                AppState::Login => {}
            },
            Action::Back => match self.state {
                AppState::ChapterTasks => {
                    self.chapter_view = None;
                    self.state = AppState::Chapters;
                }
                AppState::Task => {
                    self.task = None;
                    self.state = if self.chapter_view.is_some() {
                        AppState::ChapterTasks
                    } else {
                        AppState::Chapters
                    };
                }
                _ => {}
            },

            Action::ChaptersLoaded(result) => {
                self.loading = None;
                match result {
                    Ok(chapters) => {
                        self.error = None;
                        self.chapters.set(chapters);
                    }
                    Err(err) => self.load_failed(err),
                }
            }
            Action::ChapterTasksLoaded { chapter_id, result } => {
                self.loading = None;
                let showing = self.chapter_view.as_ref().map(|view| view.chapter.id);
                if showing != Some(chapter_id) {
                    return Ok(());
                }
                match result {
                    Ok(tasks) => {
                        self.error = None;
                        if let Some(view) = self.chapter_view.as_mut() {
                            view.tasks.set(tasks);
                        }
                    }
                    Err(err) => self.load_failed(err),
                }
            }
            Action::TaskLoaded(result) => {
                self.loading = None;
                match result {
                    Ok(task) => {
                        self.error = None;
                        let reload = self
                            .task
                            .as_ref()
                            .is_some_and(|screen| screen.task.id == task.id);
                        if reload {
                            if let Some(screen) = self.task.as_mut() {
                                screen.refresh(task);
                            }
                        } else {
                            self.task = Some(TaskScreen::new(task));
                        }
                        self.state = AppState::Task;
                    }
                    Err(err) => self.load_failed(err),
                }
            }

            Action::CycleFocus => {
                if let Some(screen) = self.task.as_mut() {
                    screen.focus = match screen.focus {
                        Focus::Lesson if !screen.is_text_only() => Focus::Editor,
                        _ => Focus::Lesson,
                    };
                }
            }
            Action::NextPane => {
                if let Some(screen) = self.task.as_mut() {
                    if !screen.panes.is_empty() {
                        screen.active_pane = (screen.active_pane + 1) % screen.panes.len();
                        screen.focus = Focus::Editor;
                    }
                }
            }
            Action::NextTab => {
                if let Some(pane) = self.task.as_mut().and_then(TaskScreen::active_mut) {
                    pane.next_tab();
                }
            }
            Action::PreviousTab => {
                if let Some(pane) = self.task.as_mut().and_then(TaskScreen::active_mut) {
                    pane.previous_tab();
                }
            }
            Action::SelectTab(index) => {
                if let Some(pane) = self.task.as_mut().and_then(TaskScreen::active_mut) {
                    if let Err(err) = pane.select_tab(index) {
                        tracing::debug!("{err}");
                    }
                }
            }
            Action::StartEditing => {
                if let Some(screen) = self.task.as_mut() {
                    if !screen.is_text_only() {
                        screen.focus = Focus::Editing;
                    }
                }
            }
            Action::StopEditing => {
                if let Some(screen) = self.task.as_mut() {
                    screen.focus = Focus::Editor;
                }
            }
            Action::Edit(key) => {
                if let Some(pane) = self.task.as_mut().and_then(TaskScreen::active_mut) {
                    pane.apply_key(key);
                }
            }
            Action::ScrollLesson(delta) => {
                if let Some(screen) = self.task.as_mut() {
                    screen.scroll_lesson(delta);
                }
            }
            Action::Run => self.run_active_pane(),
            Action::Notified(notification) => {
                while self.toasts.len() >= MAX_TOASTS {
                    self.toasts.pop_front();
                }
                self.toasts.push_back(Toast {
                    notification,
                    expires_at: self.tick_count + TOAST_TICKS,
                });
            }
        }
        Ok(())
    }

    pub fn tick(&mut self) {
        self.tick_count += 1;
        let now = self.tick_count;
        self.toasts.retain(|toast| toast.expires_at > now);
    }

    fn move_selection(&mut self, forward: bool) {
        match self.state {
            AppState::Chapters if forward => self.chapters.next(),
            AppState::Chapters => self.chapters.previous(),
            AppState::ChapterTasks => {
                if let Some(view) = self.chapter_view.as_mut() {
                    if forward {
                        view.tasks.next();
                    } else {
                        view.tasks.previous();
                    }
                }
            }
            _ => {}
        }
    }

    fn submit_login(&mut self) {
        if self.login.pending {
            return;
        }
        let email = self.login.email.trim().to_string();
        if email.is_empty() || self.login.password.is_empty() {
            self.login.error = Some("Email and password are required".to_string());
            return;
        }
        self.login.pending = true;
        self.login.error = None;
        let credentials = Credentials {
            email,
            password: self.login.password.clone(),
        };
        let client = self.client.clone();
        self.dispatch(async move {
            Action::SignedIn(client.sign_in(&credentials).await.map_err(LoadError::from))
        });
    }

    async fn sign_out(&mut self) {
        self.client.sign_out();
        if let Err(err) = self.session_store.clear().await {
            tracing::warn!("failed to clear stored session: {err:#}");
        }
        self.chapters = Selectable::default();
        self.chapter_view = None;
        self.task = None;
        self.error = None;
        self.state = AppState::Login;
    }

    fn run_active_pane(&mut self) {
        let Some(screen) = self.task.as_ref() else {
            return;
        };
        let Some(pane) = screen.active() else {
            return;
        };
        if self.controller.is_compiling(pane.language) {
            tracing::debug!(
                language = pane.language.as_str(),
                "run ignored while a compile is in flight"
            );
            return;
        }
        let submission = pane.tabs.submission();
        tracing::info!(
            task_id = screen.task.id,
            language = pane.language.as_str(),
            tab = submission.tab_name.as_str(),
            "run requested"
        );
        // The outcome reaches the UI through the notifier channel.
        drop(
            self.controller
                .spawn_run(submission, pane.language, screen.task.id.to_string()),
        );
    }

    fn load_failed(&mut self, err: LoadError) {
        if err.needs_login {
            self.client.sign_out();
            self.login = LoginForm {
                error: Some(err.message),
                ..LoginForm::default()
            };
            self.chapter_view = None;
            self.task = None;
            self.state = AppState::Login;
        } else {
            self.error = Some(err.message);
        }
    }

    fn load_chapters(&mut self) {
        self.loading = Some("Loading chapters".to_string());
        let client = self.client.clone();
        self.dispatch(async move {
            Action::ChaptersLoaded(client.list_chapters().await.map_err(LoadError::from))
        });
    }

    fn load_chapter_tasks(&mut self, chapter_id: i64) {
        self.loading = Some("Loading tasks".to_string());
        let client = self.client.clone();
        self.dispatch(async move {
            Action::ChapterTasksLoaded {
                chapter_id,
                result: client
                    .chapter_tasks(chapter_id)
                    .await
                    .map_err(LoadError::from),
            }
        });
    }

    fn load_task(&mut self, task_id: i64) {
        self.loading = Some(format!("Loading task {task_id}"));
        let client = self.client.clone();
        self.dispatch(async move {
            Action::TaskLoaded(client.get_task(task_id).await.map_err(LoadError::from))
        });
    }

    fn dispatch<F>(&self, fut: F)
    where
        F: Future<Output = Action> + Send + 'static,
    {
        let tx = self.actions.clone();
        tokio::spawn(async move {
            let _ = tx.send(fut.await);
        });
    }
}
