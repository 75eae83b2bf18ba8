use std::collections::VecDeque;
use std::io;
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crossterm::ExecutableCommand;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use miette::IntoDiagnostic;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};

use crate::app::{ProgressEvent, ProgressSink, ReloadResult};
use crate::domain::Station;
use crate::error::AirqError;
use crate::fetch::FetchClient;
use crate::worker::{Delivery, Dispatcher, Inbox};

const EVENTS_MAX: usize = 3;
const HINT: &str = "↑/↓ select · Enter report · r reload sensors · PgUp/PgDn scroll · q quit";

#[derive(Debug)]
struct AppState {
    status: String,
    events: VecDeque<String>,
}

#[derive(Clone)]
pub struct TuiProgress {
    state: Arc<Mutex<AppState>>,
}

impl ProgressSink for TuiProgress {
    fn event(&self, event: ProgressEvent) {
        if let Ok(mut state) = self.state.lock() {
            let message = event.message.trim().to_string();
            state.status = match message.split_once(';') {
                Some((_, payload)) if message.starts_with("phase=") => payload.trim().to_string(),
                _ => message.clone(),
            };
            push_bounded(
                &mut state.events,
                format!("[{}] {message}", timestamp()),
                EVENTS_MAX,
            );
        }
    }
}

pub struct Tui {
    state: Arc<Mutex<AppState>>,
    list: ListState,
    content: String,
    scroll: u16,
    pending: usize,
}

impl Default for Tui {
    fn default() -> Self {
        Self::new()
    }
}

impl Tui {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(AppState {
                status: "ready".to_string(),
                events: VecDeque::new(),
            })),
            list: ListState::default().with_selected(Some(0)),
            content: "Select a station and press Enter.".to_string(),
            scroll: 0,
            pending: 0,
        }
    }

    pub fn show(&mut self, text: impl Into<String>) {
        self.content = text.into();
        self.scroll = 0;
    }

    pub fn progress(&self) -> TuiProgress {
        TuiProgress {
            state: self.state.clone(),
        }
    }

    pub fn run<C: FetchClient + 'static>(
        &mut self,
        dispatcher: Dispatcher<C>,
        inbox: Inbox,
    ) -> miette::Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode().into_diagnostic()?;
        stdout.execute(EnterAlternateScreen).into_diagnostic()?;

        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).into_diagnostic()?;
        terminal.clear().into_diagnostic()?;

        let mut reload: Option<Receiver<Result<ReloadResult, AirqError>>> = None;
        let outcome = loop {
            for delivery in inbox.drain() {
                self.accept(delivery);
            }
            if let Some(rx) = &reload {
                if let Ok(result) = rx.try_recv() {
                    self.finish_reload(result);
                    reload = None;
                }
            }

            let stations = dispatcher.app().catalog().snapshot();
            if let Some(selected) = self.list.selected() {
                if selected >= stations.len() && !stations.is_empty() {
                    self.list.select(Some(stations.len() - 1));
                }
            }
            if let Err(err) = terminal.draw(|frame| self.draw(frame, &stations)) {
                break Err(miette::Report::msg(err.to_string()));
            }

            let polled = event::poll(Duration::from_millis(120)).into_diagnostic();
            match polled {
                Ok(true) => {}
                Ok(false) => continue,
                Err(err) => break Err(err),
            }
            let key = match event::read().into_diagnostic() {
                Ok(Event::Key(key)) => key,
                Ok(_) => continue,
                Err(err) => break Err(err),
            };
            match self.handle_key(key, &stations) {
                Action::Quit => break Ok(()),
                Action::Report(station) => self.request(&dispatcher, &station),
                Action::Reload if reload.is_none() => {
                    reload = Some(self.spawn_reload(&dispatcher));
                }
                Action::Reload | Action::None => {}
            }
        };

        disable_raw_mode().into_diagnostic()?;
        let mut stdout = io::stdout();
        stdout.execute(LeaveAlternateScreen).into_diagnostic()?;
        outcome
    }

    fn accept(&mut self, delivery: Delivery) {
        self.pending = self.pending.saturating_sub(1);
        self.set_status(format!("report for station {} delivered", delivery.station()));
        self.content = delivery.payload().to_string();
        self.scroll = 0;
    }

    fn request<C: FetchClient + 'static>(&mut self, dispatcher: &Dispatcher<C>, station: &Station) {
        match dispatcher.request(station.id) {
            Ok(_) => {
                self.pending += 1;
                self.set_status(format!("fetching {}", station.label()));
            }
            Err(err) => self.set_status(err.to_string()),
        }
    }

    fn spawn_reload<C: FetchClient + 'static>(
        &mut self,
        dispatcher: &Dispatcher<C>,
    ) -> Receiver<Result<ReloadResult, AirqError>> {
        let (tx, rx) = mpsc::channel();
        let app = dispatcher.app().clone();
        let sink = self.progress();
        thread::spawn(move || tx.send(app.reload_with_sensors(&sink)));
        self.set_status("reloading catalog with sensors".to_string());
        rx
    }

    fn finish_reload(&mut self, result: Result<ReloadResult, AirqError>) {
        match result {
            Ok(result) => self.set_status(format!(
                "reloaded {} stations ({} without sensors)",
                result.stations.len(),
                result.without_sensors
            )),
            Err(err) => {
                self.set_status(format!("reload failed: {err}"));
                self.content = format!("Failed to load sensors: {err}");
            }
        }
    }

    fn set_status(&self, status: String) {
        if let Ok(mut state) = self.state.lock() {
            push_bounded(
                &mut state.events,
                format!("[{}] {status}", timestamp()),
                EVENTS_MAX,
            );
            state.status = status;
        }
    }

    fn handle_key(&mut self, key: KeyEvent, stations: &[Station]) -> Action {
        if key.kind != KeyEventKind::Press {
            return Action::None;
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Action::Quit,
            KeyCode::Char('r') => return Action::Reload,
            KeyCode::Up => self.list.select_previous(),
            KeyCode::Down => {
                let last = stations.len().saturating_sub(1);
                let next = self.list.selected().map_or(0, |index| (index + 1).min(last));
                self.list.select(Some(next));
            }
            KeyCode::PageUp => self.scroll = self.scroll.saturating_sub(10),
            KeyCode::PageDown => self.scroll = self.scroll.saturating_add(10),
            KeyCode::Enter => {
                return match self.list.selected().and_then(|index| stations.get(index)) {
                    Some(station) => Action::Report(station.clone()),
                    None => {
                        self.set_status("select a station first".to_string());
                        Action::None
                    }
                };
            }
            _ => {}
        }
        Action::None
    }

    fn draw(&mut self, frame: &mut ratatui::Frame, stations: &[Station]) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2),
                Constraint::Min(8),
                Constraint::Length(5),
            ])
            .split(frame.area());

        let (status, events): (String, Vec<String>) = match self.state.lock() {
            Ok(state) => (state.status.clone(), state.events.iter().cloned().collect()),
            Err(_) => (String::new(), Vec::new()),
        };

        let header = Line::from(vec![
            Span::styled(
                "AIRQ",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(" "),
            Span::styled(env!("CARGO_PKG_VERSION"), Style::default().fg(Color::Gray)),
            Span::raw(format!(
                "   Stations: {}   Running: {}",
                stations.len(),
                self.pending
            )),
        ]);
        frame.render_widget(
            Paragraph::new(header).block(Block::default().borders(Borders::BOTTOM)),
            chunks[0],
        );

        let main = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(chunks[1]);

        let items: Vec<ListItem> = stations
            .iter()
            .map(|station| ListItem::new(station.label()))
            .collect();
        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title("Stations"))
            .highlight_style(
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("> ");
        frame.render_stateful_widget(list, main[0], &mut self.list);

        let report = Paragraph::new(self.content.as_str())
            .block(Block::default().borders(Borders::ALL).title("Report"))
            .wrap(Wrap { trim: false })
            .scroll((self.scroll, 0));
        frame.render_widget(report, main[1]);

        let mut lines = vec![Line::from(Span::styled(
            status,
            Style::default().fg(Color::Yellow),
        ))];
        lines.extend(
            events
                .into_iter()
                .map(|event| Line::from(Span::styled(event, Style::default().fg(Color::Gray)))),
        );
        lines.push(Line::from(Span::styled(HINT, Style::default().fg(Color::DarkGray))));
        frame.render_widget(
            Paragraph::new(lines).block(Block::default().borders(Borders::TOP)),
            chunks[2],
        );
    }
}

enum Action {
    None,
    Quit,
    Reload,
    Report(Station),
}

fn push_bounded(buffer: &mut VecDeque<String>, item: String, max: usize) {
    buffer.push_back(item);
    while buffer.len() > max {
        buffer.pop_front();
    }
}

fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}
