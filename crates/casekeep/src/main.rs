use casekeep_cli::{
    Cli, Commands, LogTarget, WatchArgs, default_flags, default_log_path, handle_command, init_tracing, load_config,
    prepare_watch,
};
use casekeep_ui::{AppExit, run_app};
use clap::Parser;
use color_eyre::Result;
#[cfg(not(windows))]
use jemallocator::Jemalloc;
#[cfg(windows)]
use mimalloc::MiMalloc;

#[cfg(windows)]
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[cfg(not(windows))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let config_path = cli.config_path();

    // Any subcommand other than `watch` runs without the terminal interface.
    let args = match cli.command {
        None => WatchArgs::default(),
        Some(Commands::Watch(args)) => args,
        Some(cmd) => {
            init_tracing(&LogTarget::Stderr);
            if let Err(err) = handle_command(cmd, &config_path).await {
                eprintln!("❌ Error: {err}");
                std::process::exit(1);
            }
            return Ok(());
        }
    };

    init_tracing(&LogTarget::File(default_log_path()));
    let config = load_config(&config_path)?;
    let mut session = match prepare_watch(config, &args, default_flags()).await? {
        Ok(session) => session,
        Err(refusal) => {
            refusal.report();
            std::process::exit(1);
        }
    };

    // TUI mode
    crossterm::terminal::enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    crossterm::execute!(
        stdout,
        crossterm::terminal::EnterAlternateScreen,
        crossterm::event::EnableMouseCapture
    )?;

    let res = run_app(&mut session.app).await;

    crossterm::execute!(
        stdout,
        crossterm::event::DisableMouseCapture,
        crossterm::terminal::LeaveAlternateScreen
    )?;
    crossterm::terminal::disable_raw_mode()?;

    // A crashed UI loop is handled like closing the window.
    let exit = res.as_ref().map_or(AppExit::Quit, Clone::clone);
    session.finish(&exit).await;
    res.map(drop)
}
