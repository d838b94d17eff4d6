use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Frame, Terminal,
};
use rutinitas::{
    app::App,
    app_dirs::AppDirs,
    audio::Tracks,
    config::{Config, ConfigStore, FileConfigStore},
    logging,
    phase::BoundaryPolicy,
    runtime::{AppEvent, Clock, CrosstermEventSource, FixedTicker, Runner, SystemClock},
};
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
};

/// work/rest cycle timer with music on every phase change
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Alternates between work and rest inside a fixed cycle, playing a work track and a rest track as the phases change and asking you to confirm each one."
)]
pub struct Cli {
    /// minutes of work at the start of each cycle
    #[clap(short = 'w', long)]
    work_minutes: Option<u32>,

    /// total minutes of one work + rest cycle
    #[clap(short = 'c', long)]
    cycle_minutes: Option<u32>,

    /// audio file played when work begins
    #[clap(long)]
    work_track: Option<PathBuf>,

    /// audio file played when rest begins
    #[clap(long)]
    rest_track: Option<PathBuf>,

    /// external command used to play the tracks (e.g. paplay, afplay, mpv)
    #[clap(long)]
    player: Option<String>,

    /// run without audio
    #[clap(long)]
    no_sound: bool,

    /// how phase boundaries are detected
    #[clap(short = 'b', long, value_enum)]
    boundary: Option<BoundaryPolicy>,

    /// milliseconds between clock checks
    #[clap(long)]
    tick_ms: Option<u64>,

    /// read settings from this file instead of the default location
    #[clap(long)]
    config: Option<PathBuf>,

    /// write the effective settings to the config file and exit
    #[clap(long)]
    write_config: bool,
}

impl Cli {
    /// Overlay command line flags on the file configuration
    fn apply_to(&self, mut config: Config) -> Config {
        if let Some(work) = self.work_minutes {
            config.work_minutes = work;
        }
        if let Some(cycle) = self.cycle_minutes {
            config.cycle_minutes = cycle;
        }
        if let Some(track) = &self.work_track {
            config.work_track = track.clone();
        }
        if let Some(track) = &self.rest_track {
            config.rest_track = track.clone();
        }
        if let Some(player) = &self.player {
            config.player = player.clone();
        }
        if self.no_sound {
            config.sound = false;
        }
        if let Some(boundary) = self.boundary {
            config.boundary = boundary;
        }
        if let Some(tick_ms) = self.tick_ms {
            config.tick_ms = tick_ms;
        }
        config.normalized()
    }

    fn config_store(&self) -> FileConfigStore {
        match &self.config {
            Some(path) => FileConfigStore::with_path(path),
            None => FileConfigStore::new(),
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    logging::init(AppDirs::log_path().as_deref());

    let store = cli.config_store();
    let config = cli.apply_to(store.load());

    if cli.write_config {
        store.save(&config)?;
        println!("wrote {}", store.path().display());
        return Ok(());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start_tui(&mut terminal, &config);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen,)?;
    terminal.show_cursor()?;

    result
}

fn start_tui<B: Backend>(terminal: &mut Terminal<B>, config: &Config) -> Result<(), Box<dyn Error>> {
    let clock = SystemClock;
    let mut app = App::new(config, clock.now());
    terminal.draw(|f| ui(&app, f))?;

    app.finish_loading(Tracks::load(config));
    terminal.draw(|f| ui(&app, f))?;

    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::from_millis(config.tick_ms),
    );

    while !app.should_quit {
        match runner.step() {
            AppEvent::Tick => {
                app.on_tick(clock.now());
            }
            AppEvent::Resize => {}
            AppEvent::Key(key) => {
                app.on_key(key, clock.now());
            }
        }
        terminal.draw(|f| ui(&app, f))?;
    }

    // stop the players before leaving the alternate screen
    app.controller.stop_work();
    Ok(())
}

fn ui(app: &App, f: &mut Frame) {
    f.render_widget(app, f.area());
}
