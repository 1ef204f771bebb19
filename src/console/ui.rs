use std::collections::VecDeque;
use std::error::Error;
use std::io::stdout;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use crossbeam_channel::unbounded;
use crossterm::ExecutableCommand;
use crossterm::event::{self, Event as CEvent, KeyCode, KeyEvent};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, Wrap};

use crate::console::api;
use crate::devices::AudioDevices;
use crate::mixer::ControlStatus;
use crate::DeviceStatus;

const TICK_RATE: Duration = Duration::from_millis(100);
const LOG_LINES: usize = 8;
const VOLUME_STEP: f32 = 0.1;

const OUTPUT_CYCLE: [(&str, AudioDevices); 5] = [
    ("speaker", AudioDevices::OUT_SPEAKER),
    ("earpiece", AudioDevices::OUT_EARPIECE),
    ("headset", AudioDevices::OUT_WIRED_HEADSET),
    ("headphone", AudioDevices::OUT_WIRED_HEADPHONE),
    ("bt-sco", AudioDevices::OUT_BLUETOOTH_SCO),
];

struct Tick {
    status: Option<DeviceStatus>,
    log: Vec<String>,
}

#[derive(Default)]
struct AppState {
    status: Option<DeviceStatus>,
    log: VecDeque<String>,
    message: Option<String>,
    last_update: Option<Instant>,
}

/// Run the ratatui-based developer console.
pub fn run() -> Result<(), Box<dyn Error>> {
    setup_terminal()?;

    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    terminal.clear()?;

    let (status_tx, status_rx) = unbounded();
    std::thread::spawn(move || {
        loop {
            let tick = Tick {
                status: api::get_status(),
                log: api::drain_log(),
            };
            if status_tx.send(tick).is_err() {
                break;
            }
            std::thread::sleep(TICK_RATE);
        }
    });

    let mut app = AppState::default();

    loop {
        terminal.draw(|frame| draw(frame, &app))?;

        let ticks = drain(&status_rx);
        if !ticks.is_empty() {
            for tick in ticks {
                app.status = tick.status;
                app.log.extend(tick.log);
            }
            while app.log.len() > LOG_LINES {
                app.log.pop_front();
            }
            app.last_update = Some(Instant::now());
        }

        if event::poll(Duration::from_millis(10))? {
            if let CEvent::Key(key) = event::read()? {
                if handle_key(&mut app, key) {
                    break;
                }
            }
        }
    }

    restore_terminal()?;
    Ok(())
}

fn setup_terminal() -> Result<(), Box<dyn Error>> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    Ok(())
}

fn restore_terminal() -> Result<(), Box<dyn Error>> {
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    Ok(())
}

fn drain<T>(rx: &Receiver<T>) -> Vec<T> {
    rx.try_iter().collect()
}

fn next_output(current: AudioDevices) -> (&'static str, AudioDevices) {
    let position = OUTPUT_CYCLE
        .iter()
        .position(|(_, devices)| *devices == current.outputs());
    let next = position.map_or(0, |idx| (idx + 1) % OUTPUT_CYCLE.len());
    OUTPUT_CYCLE[next]
}

fn handle_key(app: &mut AppState, key: KeyEvent) -> bool {
    let Some(status) = app.status.clone() else {
        return key.code == KeyCode::Char('q');
    };
    let routing = status.routing;
    let outcome = match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Char('m') => {
            let mode = routing.mode.next();
            api::set_mode(mode).map(|()| format!("Mode {mode}"))
        }
        KeyCode::Char('o') => {
            let (name, devices) = next_output(routing.devices);
            api::route_output(devices).map(|()| format!("Output routed to {name}"))
        }
        KeyCode::Char('n') => {
            let on = !routing.bt_nrec;
            api::set_nrec(on).map(|()| format!("Headset NR {}", if on { "on" } else { "off" }))
        }
        KeyCode::Char('+') | KeyCode::Up => {
            let volume = (routing.voice_volume + VOLUME_STEP).min(1.0);
            api::set_voice_volume(volume).map(|()| format!("Voice volume {volume:.1}"))
        }
        KeyCode::Char('-') | KeyCode::Down => {
            let volume = (routing.voice_volume - VOLUME_STEP).max(0.0);
            api::set_voice_volume(volume).map(|()| format!("Voice volume {volume:.1}"))
        }
        _ => return false,
    };
    app.message = Some(match outcome {
        Ok(message) => message,
        Err(err) => format!("Failed: {err}"),
    });
    false
}

fn draw(frame: &mut ratatui::Frame<'_>, app: &AppState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Min(8),
            Constraint::Length(LOG_LINES as u16 + 2),
            Constraint::Length(4),
        ])
        .split(frame.size());

    draw_header(frame, chunks[0], app);
    draw_controls(frame, chunks[1], app);
    draw_log(frame, chunks[2], app);
    draw_footer(frame, chunks[3], app);
}

fn draw_header(frame: &mut ratatui::Frame<'_>, area: Rect, app: &AppState) {
    let block = Block::default()
        .title("Aries Audio Console")
        .borders(Borders::ALL);

    let content = if let Some(status) = &app.status {
        let routing = status.routing;
        let streams = format!(
            "Output: {}    Input: {}    Modem PCM: {}",
            standby_label(status.output_standby),
            standby_label(status.input_standby),
            if status.modem_pcm_active { "running" } else { "closed" },
        );
        Paragraph::new(vec![
            Line::from(format!(
                "Mode: {}    Call: {}    Devices: {:#010x}    Path: {}    Volume: {:.1}    NR: {}    Mic: {}",
                routing.mode,
                status.call,
                routing.devices.bits(),
                status.call_path,
                routing.voice_volume,
                if routing.bt_nrec { "on" } else { "off" },
                if routing.mic_mute { "muted" } else { "live" },
            )),
            Line::from(streams),
        ])
    } else {
        Paragraph::new(Line::from(vec![Span::styled(
            "No open device",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )]))
    };

    frame.render_widget(content.block(block), area);
}

fn standby_label(standby: Option<bool>) -> &'static str {
    match standby {
        None => "closed",
        Some(true) => "standby",
        Some(false) => "active",
    }
}

fn draw_controls(frame: &mut ratatui::Frame<'_>, area: Rect, app: &AppState) {
    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let (output, input) = match &app.status {
        Some(status) => (
            status.output_controls.as_slice(),
            status.input_controls.as_slice(),
        ),
        None => (&[][..], &[][..]),
    };
    frame.render_widget(control_table("Output path", output), halves[0]);
    frame.render_widget(control_table("Input path", input), halves[1]);
}

fn control_table<'a>(title: &'a str, controls: &'a [ControlStatus]) -> Table<'a> {
    let header = Row::new(vec![Cell::from("Control"), Cell::from("State")]).style(
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    );

    let rows = controls.iter().map(|control| {
        let (label, style) = if control.inert {
            ("inert", Style::default().fg(Color::Red))
        } else if control.applied {
            ("on", Style::default().fg(Color::Green))
        } else {
            ("off", Style::default().fg(Color::DarkGray))
        };
        Row::new(vec![Cell::from(control.name), Cell::from(label)]).style(style)
    });

    Table::new(rows, [Constraint::Min(28), Constraint::Length(6)])
        .header(header)
        .block(Block::default().title(title).borders(Borders::ALL))
        .column_spacing(2)
}

fn draw_log(frame: &mut ratatui::Frame<'_>, area: Rect, app: &AppState) {
    let lines: Vec<Line> = app.log.iter().map(|line| Line::from(line.as_str())).collect();
    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Log"))
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

fn draw_footer(frame: &mut ratatui::Frame<'_>, area: Rect, app: &AppState) {
    let info = "m: Next mode  •  o: Next output  •  n: Toggle NR  •  +/-: Voice volume  •  q: Quit";
    let mut lines = vec![Line::from(info)];
    if let Some(message) = &app.message {
        lines.push(Line::from(Span::styled(
            message.clone(),
            Style::default().fg(Color::Green),
        )));
    }
    if let Some(updated) = app.last_update {
        let ago = updated.elapsed().as_secs_f32();
        lines.push(Line::from(Span::styled(
            format!("Last update {:.1}s ago", ago),
            Style::default().fg(Color::DarkGray),
        )));
    }

    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Help"))
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}
