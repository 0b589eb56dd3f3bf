use std::{
    collections::VecDeque,
    io::{self, Stdout},
    time::{Duration, Instant},
};

use anyhow::Result;
use castle_escape_core::{
    GOAL_ROOM, GRID_SIZE, GuardId, Room,
    agent::Agent,
    environment::{
        CastleEscape, EpisodicEnvironment, Observation, Step, Terminal as EpisodeEnd, WorldState,
    },
    observer::StepObserver,
};
use rand::{SeedableRng, rngs::StdRng};
use ratatui::{
    crossterm::{
        self,
        event::{self, Event, KeyCode},
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    },
    prelude::*,
    widgets::*,
};

const LOG_CAPACITY: usize = 64;

/// Rolling log of the most recent turns, fed by the episode loop.
#[derive(Debug, Default)]
pub struct EventLog {
    lines: VecDeque<String>,
    steps: usize,
    total_reward: f64,
}

impl EventLog {
    fn push(&mut self, line: String) {
        if self.lines.len() == LOG_CAPACITY {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }
}

impl StepObserver for EventLog {
    fn on_episode_start(&mut self, _episode: usize, observation: &Observation) {
        self.steps = 0;
        self.total_reward = 0.0;
        self.push(format!("start in {} with {} health", observation.room, observation.health));
    }

    fn on_step(&mut self, _episode: usize, step: &Step) {
        self.steps += 1;
        self.total_reward += step.reward;
        self.push(format!("{:>4} {:>+8} {}", self.steps, step.reward, step.info));
    }

    fn on_episode_end(&mut self, _episode: usize, total_reward: f64) {
        self.push(format!("episode over, total reward {total_reward}"));
    }
}

pub struct App<'a> {
    /// The simulated castle.
    environment: CastleEscape,
    /// Policy being watched.
    agent: Box<dyn Agent + 'a>,
    rng: StdRng,
    observation: Observation,
    last_terminal: Option<EpisodeEnd>,
    log: EventLog,
    max_steps: usize,
    /// Flag to control the main loop.
    should_quit: bool,
    /// Set once the episode ends or hits the step limit.
    game_over: bool,
}

impl<'a> App<'a> {
    pub fn new(agent: Box<dyn Agent + 'a>, seed: u64, max_steps: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut environment = CastleEscape::new();
        let observation = environment.reset(&mut rng);
        let mut log = EventLog::default();
        log.on_episode_start(0, &observation);

        App {
            environment,
            agent,
            rng,
            observation,
            last_terminal: None,
            log,
            max_steps,
            should_quit: false,
            game_over: false,
        }
    }

    /// Plays one turn of the episode.
    fn tick(&mut self) {
        if self.game_over {
            return;
        }
        let action = self.agent.get_action(&self.observation, &mut self.rng);
        let step = self.environment.step(action, &mut self.rng);
        self.log.on_step(0, &step);
        self.observation = step.observation;

        if step.done {
            self.last_terminal = step.info.terminal;
            self.finish();
        } else if self.log.steps >= self.max_steps {
            self.log.push(format!("stopped after {} steps", self.max_steps));
            self.finish();
        }
    }

    fn finish(&mut self) {
        self.game_over = true;
        self.log.on_episode_end(0, self.log.total_reward);
    }

    fn quit(&mut self) {
        self.should_quit = true;
    }
}

/// Replays one episode in the terminal until the user quits.
pub fn run(app: &mut App, tick_ms: u64) -> Result<()> {
    let mut terminal = setup_terminal()?;
    let result = run_app(&mut terminal, app, Duration::from_millis(tick_ms));
    restore_terminal(&mut terminal)?;
    result
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    let mut stdout = io::stdout();
    enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(Into::into)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    tick_rate: Duration,
) -> Result<()> {
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);

        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if let KeyCode::Char('q') | KeyCode::Esc = key.code {
                    app.quit();
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            app.tick();
            last_tick = Instant::now();
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

fn ui(frame: &mut Frame, app: &App) {
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(GRID_SIZE as u16 + 2), // castle
            Constraint::Length(4),                    // status
            Constraint::Min(3),                       // turn log
            Constraint::Length(2),                    // help
        ])
        .split(frame.area());

    render_castle(frame, main_layout[0], app.environment.state());
    render_status(frame, main_layout[1], app);
    render_log(frame, main_layout[2], &app.log);

    let help_text = Paragraph::new("Press 'q' or 'Esc' to quit.")
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(help_text, main_layout[3]);
}

fn render_castle(frame: &mut Frame, area: Rect, state: &WorldState) {
    let occupancy = state.occupancy();
    let mut lines: Vec<Line> = Vec::with_capacity(GRID_SIZE);

    for row in 0..GRID_SIZE {
        let spans: Vec<Span> = occupancy
            .row(row)
            .iter()
            .enumerate()
            .map(|(col, guard)| room_span(Room::new(row, col), *guard, state.player))
            .collect();
        lines.push(Line::from(spans));
    }

    let castle =
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Castle"));
    frame.render_widget(castle, area);
}

fn room_span(room: Room, guard: Option<GuardId>, player: Room) -> Span<'static> {
    let player_style = Style::default().fg(Color::Red).bold();
    match guard {
        Some(guard) if room == player => {
            Span::styled(format!(" @{} ", guard.code()), player_style.reversed())
        }
        _ if room == player => Span::styled(" @  ", player_style),
        Some(guard) => Span::styled(
            format!(" {}  ", guard.code()),
            Style::default().fg(Color::Yellow),
        ),
        None if room == GOAL_ROOM => Span::styled(" E  ", Style::default().fg(Color::Green)),
        None => Span::styled(" .  ", Style::default().fg(Color::DarkGray)),
    }
}

fn render_status(frame: &mut Frame, area: Rect, app: &App) {
    let state = app.environment.state();
    let outcome = match (app.game_over, app.last_terminal) {
        (false, _) => "playing",
        (true, Some(EpisodeEnd::Goal)) => "escaped",
        (true, Some(EpisodeEnd::Defeat)) => "defeated",
        (true, None) => "gave up",
    };
    let guard = app
        .observation
        .guard
        .map_or_else(|| "none".to_string(), |guard| guard.to_string());

    let lines = vec![
        Line::from(format!(
            "Policy: {}  Room: {}  Health: {}  Guard: {}",
            app.agent.name(),
            state.player,
            state.health,
            guard
        )),
        Line::from(format!(
            "Steps: {}  Reward: {}  Status: {}",
            app.log.steps, app.log.total_reward, outcome
        )),
    ];
    let status =
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Status"));
    frame.render_widget(status, area);
}

fn render_log(frame: &mut Frame, area: Rect, log: &EventLog) {
    // Newest entries first so they stay visible in short terminals.
    let items: Vec<ListItem> = log
        .lines
        .iter()
        .rev()
        .map(|line| ListItem::new(line.as_str()))
        .collect();
    let list = List::new(items).block(Block::default().borders(Borders::ALL).title("Turns"));
    frame.render_widget(list, area);
}

#[cfg(test)]
mod tests {
    use castle_escape_core::agent::FightWhenPossible;
    use ratatui::backend::TestBackend;

    use super::*;

    #[test]
    fn replay_stops_at_the_end_of_the_episode() {
        let mut app = App::new(Box::new(FightWhenPossible), 5, 10_000);
        for _ in 0..10_000 {
            app.tick();
            if app.game_over {
                break;
            }
        }
        assert!(app.game_over);
        assert!(app.last_terminal.is_some());

        let steps = app.log.steps;
        app.tick();
        assert_eq!(app.log.steps, steps);
    }

    #[test]
    fn replay_respects_the_step_limit() {
        let mut app = App::new(Box::new(FightWhenPossible), 5, 1);
        app.tick();
        assert!(app.game_over);
        assert_eq!(app.log.steps, 1);
        assert_eq!(app.last_terminal, None);
    }

    #[test]
    fn frame_shows_the_castle_and_the_status_panel() {
        let app = App::new(Box::new(FightWhenPossible), 5, 10);
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        terminal.draw(|f| ui(f, &app)).unwrap();

        let text: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect();
        assert!(text.contains("Castle"));
        assert!(text.contains("Policy: fight"));
        assert!(text.contains("Status: playing"));
    }

    #[test]
    fn log_keeps_only_recent_turns() {
        let mut log = EventLog::default();
        for i in 0..LOG_CAPACITY + 5 {
            log.push(i.to_string());
        }
        assert_eq!(log.lines.len(), LOG_CAPACITY);
        assert_eq!(log.lines.front().map(String::as_str), Some("5"));
    }

    #[test]
    fn player_is_drawn_over_guards() {
        let player = Room::new(1, 1);
        assert_eq!(room_span(player, Some(GuardId::G2), player).content, " @2 ");
        assert_eq!(room_span(player, None, player).content, " @  ");
        assert_eq!(room_span(GOAL_ROOM, None, player).content, " E  ");
        assert_eq!(room_span(Room::new(0, 1), Some(GuardId::G4), player).content, " 4  ");
    }
}
