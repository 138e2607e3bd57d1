mod app;
mod config;
mod download;
mod logging;
mod presenter;
mod removed_posts;
mod source;
mod theme;
mod thumbnails;
mod types;
mod ui;

use std::io;
use std::process::exit;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use crossterm::event::{self, Event, KeyEventKind};
use ratatui::layout::Rect;
use tracing::error;

use app::App;
use config::{Cli, SavedConfig, config_path, default_download_dir, default_log_path, load_config, reset_config};
use download::ChunkedDownloader;
use presenter::ThreadPresenter;
use source::{MediaHost, load_thread};
use theme::ThemeEngine;
use thumbnails::HttpThumbnailLoader;

fn display_startup_info(location: &str, config: &SavedConfig) {
    eprintln!("🚀 Starting chantui...");
    eprintln!("🧵 Thread: {}", location);
    eprintln!("🎨 Theme: {}", config.theme.as_deref().unwrap_or("default"));
    eprintln!("⬇️  Download chunks: {}", config.chunks);
    eprintln!();
}

fn show_thread_help() {
    eprintln!("❌ No thread specified!");
    eprintln!();
    eprintln!("💡 Usage examples:");
    eprintln!("   chantui --thread https://a.4cdn.org/g/thread/100.json    # Open a thread over http");
    eprintln!("   chantui --thread ./100.json --board g                    # Open a saved thread file");
    eprintln!("   chantui --thread ./100.json --theme Tomorrow --chunks 8  # Pick a theme and parallelism");
    eprintln!("   chantui --reset                                           # Forget saved settings and removed posts");
    eprintln!();
}

#[tokio::main]
async fn main() -> Result<(), io::Error> {
    let cli = Cli::parse();

    // Handle reset flag first
    if cli.reset {
        match reset_config() {
            Ok(true) => {
                println!("✅ Saved configuration has been reset.");
                println!("   Removed posts will show up again in every thread.");
            }
            Ok(false) => {
                println!("ℹ️  No saved configuration found to reset.");
            }
            Err(e) => {
                eprintln!("❌ Error resetting configuration: {}", e);
                exit(1);
            }
        }
        return Ok(());
    }

    let Some(location) = cli.thread.clone() else {
        show_thread_help();
        exit(1);
    };

    // Collect startup warnings to display in the UI once it launches
    let mut startup_warning: Option<String> = None;

    let log_path = cli.log_file.clone().unwrap_or_else(default_log_path);
    let _log_guard = match logging::init_tracing(&log_path) {
        Ok(guard) => Some(guard),
        Err(e) => {
            startup_warning = Some(format!("⚠️  Logging disabled: {}", e));
            None
        }
    };

    let mut saved = load_config().unwrap_or_default();
    saved.merge_cli(&cli);
    display_startup_info(&location, &saved);

    let client = reqwest::Client::builder()
        .user_agent(concat!("chantui/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(io::Error::other)?;

    let media = MediaHost::new(&cli.media_host, &cli.board);
    let thread = match load_thread(&location, &media, &client).await {
        Ok(thread) => thread,
        Err(e) => {
            error!(location = %location, error = %e, "Failed to load thread");
            eprintln!("❌ Could not load thread: {}", e);
            exit(1);
        }
    };

    let thread_key = format!("{}/{}", thread.board, thread.no);
    let presenter = ThreadPresenter::new(thread, saved.hidden_for(&thread_key));
    let themes = ThemeEngine::new(saved.theme.as_deref());
    let download_dir = saved.download_dir.clone().unwrap_or_else(default_download_dir);

    let mut app = App::new(
        presenter,
        themes,
        Arc::new(HttpThumbnailLoader::new(client.clone())),
        ChunkedDownloader::new(client),
        saved,
        config_path(),
        download_dir,
    );
    if let Some(warning) = startup_warning.take() {
        app.notify(warning);
    }

    let mut terminal = ui::setup_terminal()?;
    let result = run(&mut app, &mut terminal);
    ui::restore_terminal(&mut terminal)?;
    app.shutdown();
    result
}

fn run(app: &mut App, terminal: &mut ui::Tui) -> Result<(), io::Error> {
    // Short enough for the status bar tint to animate smoothly
    let tick_rate = Duration::from_millis(40);
    let mut last_tick = Instant::now();
    app.screen = terminal.size()?;

    loop {
        // --- Draw UI ---
        if app.take_redraw() {
            ui::render_ui(app, terminal)?;
        }

        // --- Input Handling ---
        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if event::poll(timeout)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if ui::input::handle_key_event(app, key.code) {
                        break; // Exit condition
                    }
                }
                Event::Mouse(mouse) => ui::input::handle_mouse_event(app, mouse),
                Event::Resize(width, height) => {
                    app.screen = Rect::new(0, 0, width, height);
                    app.needs_redraw = true;
                }
                _ => {}
            }
        }

        // --- Tick-based updates ---
        if last_tick.elapsed() >= tick_rate {
            app.tick(Instant::now());
            last_tick = Instant::now();
        }
    }
    Ok(())
}
