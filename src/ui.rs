use color_eyre::eyre::{
    Result,
    eyre,
};
use crossterm::{
    event::{
        Event,
        EventStream,
        KeyCode,
        KeyEvent,
        KeyEventKind,
        KeyModifiers,
    },
    terminal::{
        disable_raw_mode,
        enable_raw_mode,
    },
};
use futures::StreamExt;
use rand::Rng;
use ratatui::{
    prelude::*,
    widgets::*,
};
use std::io::stdout;
use unicode_width::UnicodeWidthStr;
use waste_kiosk::{
    redemption::{
        Prize,
        WasteCategory,
    },
    session::{
        Screen,
        SessionSnapshot,
    },
    workflow::format_remaining,
};

const SPINNER: [char; 4] = ['|', '/', '-', '\\'];
const SPARKLES: [char; 5] = ['*', '+', '.', 'o', '@'];
const SPARKLE_COLORS: [Color; 6] = [
    Color::Red,
    Color::Yellow,
    Color::Green,
    Color::Cyan,
    Color::Magenta,
    Color::LightBlue,
];

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum UserEvent {
    Quit,
    Redraw,
    ChooseCategory(WasteCategory),
    ChoosePrize(Prize),
    Back,
    Cancel,
    CloseModal,
}

pub type InputEventReceiver = EventStream;

#[derive(Debug, Default)]
pub struct UiState {
    mode: Mode,
    highlighted: usize,
    last_screen: Option<Screen>,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
enum Mode {
    #[default]
    Normal,
    QuitModal,
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::LeaveAlternateScreen)?;
    Ok(())
}

pub fn input_event_stream() -> InputEventReceiver {
    EventStream::new()
}

pub async fn next_raw_event(events: &mut InputEventReceiver) -> Result<Event> {
    match events.next().await {
        Some(event) => Ok(event?),
        None => Err(eyre!("terminal input stream closed")),
    }
}

pub fn draw(state: &mut UiState, snap: &SessionSnapshot) -> Result<()> {
    sync_screen(state, snap.screen);
    if let Some(mut term) = state.terminal.take() {
        term.draw(|f| ui(f, state, snap))?;
        state.terminal = Some(term);
    }
    Ok(())
}

/// Highlight resets to the first card whenever the screen changes.
fn sync_screen(state: &mut UiState, screen: Screen) {
    if state.last_screen != Some(screen) {
        state.highlighted = 0;
        state.last_screen = Some(screen);
    }
}

/// Translate a terminal event into what the kiosk should do next.
pub fn interpret_event(
    state: &mut UiState,
    event: Event,
    snap: &SessionSnapshot,
) -> Option<UserEvent> {
    sync_screen(state, snap.screen);
    let k = match event {
        Event::Key(k) if k.kind == KeyEventKind::Press => k,
        Event::Resize(_, _) => return Some(UserEvent::Redraw),
        _ => return None,
    };
    if is_ctrl_c(&k) {
        return Some(UserEvent::Quit);
    }

    if state.mode == Mode::QuitModal {
        return match k.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => Some(UserEvent::Quit),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            _ => None,
        };
    }

    if snap.view.modal_visible {
        return match k.code {
            KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ') => Some(UserEvent::CloseModal),
            _ => None,
        };
    }

    if snap.view.loading {
        return match k.code {
            KeyCode::Char('c') | KeyCode::Char('C') | KeyCode::Esc => Some(UserEvent::Cancel),
            _ => None,
        };
    }

    let chosen = match k.code {
        KeyCode::Left | KeyCode::Char('h') => {
            state.highlighted = 0;
            return Some(UserEvent::Redraw);
        }
        KeyCode::Right | KeyCode::Char('l') => {
            state.highlighted = 1;
            return Some(UserEvent::Redraw);
        }
        KeyCode::Char('1') => 0,
        KeyCode::Char('2') => 1,
        KeyCode::Enter => state.highlighted,
        KeyCode::Char('q') => {
            state.mode = Mode::QuitModal;
            return Some(UserEvent::Redraw);
        }
        KeyCode::Esc | KeyCode::Backspace => {
            return match snap.screen {
                Screen::PrizeSelection(_) => Some(UserEvent::Back),
                Screen::CategorySelection => {
                    state.mode = Mode::QuitModal;
                    Some(UserEvent::Redraw)
                }
            };
        }
        _ => return None,
    };

    match snap.screen {
        Screen::CategorySelection => WasteCategory::ALL
            .get(chosen)
            .map(|c| UserEvent::ChooseCategory(*c)),
        Screen::PrizeSelection(_) => Prize::ALL.get(chosen).map(|p| UserEvent::ChoosePrize(*p)),
    }
}

fn is_ctrl_c(k: &KeyEvent) -> bool {
    k.modifiers.contains(KeyModifiers::CONTROL) && k.code == KeyCode::Char('c')
}

fn ui(f: &mut Frame, state: &UiState, snap: &SessionSnapshot) {
    f.render_widget(Clear, f.area());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // title
            Constraint::Length(2), // subtitle
            Constraint::Min(7),    // cards
            Constraint::Length(3), // footer
        ])
        .split(f.area());

    let (title, subtitle) = match snap.screen {
        Screen::CategorySelection => ("Please Select What to Deposit?", String::new()),
        Screen::PrizeSelection(category) => {
            ("Please Select Your Prize", format!("You selected: {category}"))
        }
    };
    f.render_widget(
        Paragraph::new(title)
            .alignment(Alignment::Center)
            .style(Style::default().add_modifier(Modifier::BOLD))
            .block(Block::default().borders(Borders::BOTTOM)),
        chunks[0],
    );
    f.render_widget(
        Paragraph::new(subtitle).alignment(Alignment::Center),
        chunks[1],
    );
    draw_cards(f, state, chunks[2], snap.screen);
    draw_footer(f, chunks[3], snap);

    if snap.view.celebrate {
        draw_sparkles(f);
    }
    if snap.view.loading {
        draw_loading(f, snap);
    }
    if snap.view.modal_visible {
        draw_status_modal(f, snap);
    }
    if state.mode == Mode::QuitModal {
        let area = centered_rect(40, 20, f.area());
        let block = Block::default().borders(Borders::ALL).title("Confirm Quit");
        f.render_widget(Clear, area);
        f.render_widget(block.clone(), area);
        f.render_widget(Paragraph::new("Quit the kiosk? (Y/N)"), block.inner(area));
    }
}

fn draw_cards(f: &mut Frame, state: &UiState, area: Rect, screen: Screen) {
    let cards: [(&str, &str); 2] = match screen {
        Screen::CategorySelection => [
            (category_icon(&WasteCategory::PlasticBottles), WasteCategory::PlasticBottles.label()),
            (category_icon(&WasteCategory::Paper), WasteCategory::Paper.label()),
        ],
        Screen::PrizeSelection(_) => [
            (prize_icon(&Prize::EmergencyKit), Prize::EmergencyKit.label()),
            (prize_icon(&Prize::PaperPad), Prize::PaperPad.label()),
        ],
    };
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    for (i, (icon, label)) in cards.iter().enumerate() {
        let border = if i == state.highlighted {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(border)
            .title(format!("Option {}", i + 1));
        let body = vec![
            Line::from(""),
            Line::from(*icon),
            Line::from(""),
            Line::styled(*label, Style::default().add_modifier(Modifier::BOLD)),
        ];
        f.render_widget(
            Paragraph::new(body).alignment(Alignment::Center).block(block),
            columns[i],
        );
    }
}

fn draw_footer(f: &mut Frame, area: Rect, snap: &SessionSnapshot) {
    let help = match snap.screen {
        Screen::CategorySelection => "←/→ or 1/2 select  Enter choose  q quit",
        Screen::PrizeSelection(_) => "←/→ or 1/2 select  Enter redeem  Esc back  q quit",
    };
    let mut lines = vec![Line::styled(help, Style::default().fg(Color::DarkGray))];
    if !snap.view.loading && !snap.view.status_message.is_empty() {
        lines.insert(0, Line::from(snap.view.status_message.clone()));
    }
    f.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::TOP)),
        area,
    );
}

fn draw_loading(f: &mut Frame, snap: &SessionSnapshot) {
    let area = centered_rect(50, 40, f.area());
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Waiting for sensor");
    let spinner = SPINNER[(snap.view.countdown % SPINNER.len() as u64) as usize];
    let mut lines = vec![
        Line::from(format!("{spinner}  {}", snap.view.status_message)),
        Line::from(""),
        Line::from(format!(
            "Time Remaining: {}",
            format_remaining(snap.view.countdown)
        )),
    ];
    if let Some(id) = snap.record_id {
        lines.push(Line::styled(
            format!("Request #{id}"),
            Style::default().fg(Color::DarkGray),
        ));
    }
    lines.push(Line::from(""));
    lines.push(Line::styled(
        "[c] Cancel",
        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
    ));
    f.render_widget(Clear, area);
    f.render_widget(block.clone(), area);
    f.render_widget(
        Paragraph::new(lines).alignment(Alignment::Center),
        block.inner(area),
    );
}

fn draw_status_modal(f: &mut Frame, snap: &SessionSnapshot) {
    let message = &snap.view.modal_message;
    let (width, height) = status_modal_size(message);
    let area = fixed_centered_rect(width, height, f.area());
    let block = Block::default().borders(Borders::ALL).title("Status");
    let mut lines: Vec<Line> = message.lines().map(|l| Line::from(l.to_string())).collect();
    lines.push(Line::from(""));
    lines.push(Line::styled(
        "[Enter] OK",
        Style::default().add_modifier(Modifier::BOLD),
    ));
    f.render_widget(Clear, area);
    f.render_widget(block.clone(), area);
    f.render_widget(
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true }),
        block.inner(area),
    );
}

/// Outer size of the status modal: text plus borders, padding and the OK line.
fn status_modal_size(message: &str) -> (u16, u16) {
    let text_width = message
        .lines()
        .map(UnicodeWidthStr::width)
        .max()
        .unwrap_or(0)
        .max("[Enter] OK".width());
    let text_height = message.lines().count();
    let width = u16::try_from(text_width).unwrap_or(u16::MAX).saturating_add(4);
    let height = u16::try_from(text_height).unwrap_or(u16::MAX).saturating_add(4);
    (width, height)
}

fn draw_sparkles(f: &mut Frame) {
    let area = f.area();
    if area.width == 0 || area.height == 0 {
        return;
    }
    let mut rng = rand::rng();
    let count = (area.width as usize * area.height as usize) / 12;
    let buf = f.buffer_mut();
    for _ in 0..count {
        let x = rng.random_range(area.left()..area.right());
        let y = rng.random_range(area.top()..area.bottom());
        let glyph = SPARKLES[rng.random_range(0..SPARKLES.len())];
        let color = SPARKLE_COLORS[rng.random_range(0..SPARKLE_COLORS.len())];
        buf.set_string(x, y, glyph.to_string(), Style::default().fg(color));
    }
}

fn category_icon(category: &WasteCategory) -> &'static str {
    match category {
        WasteCategory::PlasticBottles => "🧴",
        WasteCategory::Paper => "📄",
    }
}

fn prize_icon(prize: &Prize) -> &'static str {
    match prize {
        Prize::EmergencyKit => "🧰",
        Prize::PaperPad => "📝",
    }
}

fn centered_rect(w_percent: u16, h_percent: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h_percent) / 2),
            Constraint::Percentage(h_percent),
            Constraint::Percentage((100 - h_percent) / 2),
        ])
        .split(r);

    let vertical = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(popup_layout[1]);

    vertical[1]
}

fn fixed_centered_rect(width: u16, height: u16, r: Rect) -> Rect {
    let width = width.min(r.width);
    let height = height.min(r.height);
    Rect {
        x: r.x + (r.width - width) / 2,
        y: r.y + (r.height - height) / 2,
        width,
        height,
    }
}
