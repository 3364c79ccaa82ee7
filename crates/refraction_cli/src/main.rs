//! Refraction CLI
//!
//! Run the landing page motion effects headless and print what they produce.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use refraction_core::{ManualPointer, ManualScroll, Rect, SchedulerHandle};
use refraction_motion::counter::DEFAULT_COUNT_MS;
use refraction_motion::pointer::DEFAULT_CURSOR_OFFSET;
use refraction_motion::scroll::{hero_offset_y, hero_opacity, hero_scale};
use refraction_motion::{
    landing_stats, CountUp, CursorFollower, InViewTrigger, PhaseSequencer, PointerOffsetTracker,
    Scramble, ScrambleConfig, ScrambleState, ScrambleText, ScrollProgressSource, ScrollRegion,
    ScrollTransform, SequenceStatus, SpringConfig,
};
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod driver;

use config::RefractionConfig;
use driver::FrameDriver;

#[derive(Parser)]
#[command(name = "refraction")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Refraction motion effects in the terminal", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ./refraction.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Frames per second (overrides render.fps)
    #[arg(long, global = true)]
    fps: Option<u32>,

    /// Advance the virtual clock frame by frame without waiting
    #[arg(long, global = true)]
    instant: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the simulated extraction phases with a scrambled status line
    Extract {
        /// Cancel the run after this many milliseconds
        #[arg(long)]
        cancel_after: Option<u32>,
    },

    /// Print the frames of a text scramble
    Scramble {
        /// Text to reveal (defaults to scramble.text)
        text: Option<String>,

        /// Seed for reproducible glyphs
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Sweep the page from top to bottom and print the hero transforms
    Scroll {
        /// Viewport height in pixels
        #[arg(long, default_value = "800")]
        viewport: f32,

        /// Page height in pixels
        #[arg(long, default_value = "4800")]
        content: f32,

        /// Time the sweep takes
        #[arg(long, default_value = "3000")]
        duration_ms: u32,
    },

    /// Move a synthetic pointer across a magnetic button
    Magnet,

    /// Scroll to the stats strip and count its numbers up
    Counter,

    /// Show the resolved configuration
    Info,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let cwd = std::env::current_dir().context("Failed to read the working directory")?;
    let config = RefractionConfig::load(cli.config.as_deref(), &cwd)?;
    let fps = cli.fps.unwrap_or_else(|| config.fps());
    let driver = FrameDriver::new(fps, cli.instant);

    match cli.command {
        Commands::Extract { cancel_after } => cmd_extract(&config, &driver, cancel_after),

        Commands::Scramble { text, seed } => cmd_scramble(&config, text, seed, cli.instant),

        Commands::Scroll {
            viewport,
            content,
            duration_ms,
        } => cmd_scroll(&config, &driver, viewport, content, duration_ms),

        Commands::Magnet => cmd_magnet(&config, &driver),

        Commands::Counter => cmd_counter(&driver),

        Commands::Info => cmd_info(&config, fps),
    }
}

fn scramble_text(
    handle: &SchedulerHandle,
    text: &str,
    config: ScrambleConfig,
    seed: Option<u64>,
) -> ScrambleText {
    match seed {
        Some(seed) => {
            ScrambleText::from_state(handle, ScrambleState::with_seed(text, config, seed))
        }
        None => ScrambleText::new(handle, text, config),
    }
}

fn cmd_extract(
    config: &RefractionConfig,
    driver: &FrameDriver,
    cancel_after: Option<u32>,
) -> Result<()> {
    let handle = driver.scheduler().handle();
    let sequencer = PhaseSequencer::new(&handle, config.sequence.phases())
        .context("Invalid [sequence] section")?;
    let scramble = config.scramble.config()?;

    let total_ms: u64 = config
        .sequence
        .phases
        .iter()
        .map(|p| p.duration_ms as u64)
        .sum();
    info!(
        "Extracting: {} phases over {} ms",
        config.sequence.phases.len(),
        total_ms
    );

    let (tx, rx) = mpsc::channel();
    let _transitions = sequencer.subscribe(move |snapshot| {
        let _ = tx.send(snapshot.clone());
    });

    sequencer.start();

    let mut status_line: Option<ScrambleText> = None;
    let mut shown = String::new();
    let mut cancel_pending = cancel_after;
    let limit_ms = (total_ms + scramble.total_ms() as u64) as f64 + 1000.0;

    driver.run_until(limit_ms, |scheduler| {
        if let Some(at) = cancel_pending {
            if scheduler.now_ms() >= at as f64 {
                cancel_pending = None;
                sequencer.cancel();
            }
        }

        for snapshot in rx.try_iter() {
            match (snapshot.status, snapshot.label) {
                (SequenceStatus::Running, Some(label)) => {
                    println!("[{}] {}", snapshot.current_index + 1, label);
                    status_line = Some(scramble_text(
                        &handle,
                        &label,
                        scramble.clone(),
                        config.scramble.seed,
                    ));
                }
                (SequenceStatus::Completed, _) => {
                    status_line = None;
                    println!("Extraction complete");
                }
                (SequenceStatus::Cancelled, label) => {
                    status_line = None;
                    println!(
                        "Extraction cancelled during phase {} ({})",
                        snapshot.current_index + 1,
                        label.unwrap_or_default()
                    );
                }
                _ => {}
            }
        }

        if let Some(text) = &status_line {
            let display = text.display();
            if display != shown {
                println!("    {}", display);
                shown = display;
            }
        }

        sequencer.status().is_terminal()
    });

    Ok(())
}

fn cmd_scramble(
    config: &RefractionConfig,
    text: Option<String>,
    seed: Option<u64>,
    instant: bool,
) -> Result<()> {
    let scramble = config.scramble.config()?;
    let text = text.unwrap_or_else(|| config.scramble.text.clone());
    let tick = Duration::from_millis(scramble.tick_ms() as u64);

    let frames = match seed.or(config.scramble.seed) {
        Some(seed) => Scramble::from_state(ScrambleState::with_seed(&text, scramble, seed)),
        None => Scramble::new(&text, scramble),
    };

    for frame in frames {
        println!("{}", frame);
        if !instant {
            thread::sleep(tick);
        }
    }

    Ok(())
}

fn cmd_scroll(
    config: &RefractionConfig,
    driver: &FrameDriver,
    viewport: f32,
    content: f32,
    duration_ms: u32,
) -> Result<()> {
    if !(viewport > 0.0 && content > viewport) {
        anyhow::bail!(
            "Page of {} px does not scroll in a {} px viewport",
            content,
            viewport
        );
    }

    let handle = driver.scheduler().handle();
    let page = ManualScroll::new(viewport, content);
    let document = ScrollProgressSource::new(&handle, &page, ScrollRegion::Document);
    let features =
        ScrollProgressSource::new(&handle, &page, ScrollRegion::element(viewport * 1.5, 600.0));

    let hero = ScrollTransform::new(&handle, &document, Some(config.springs.scroll()?))
        .map("offset_y", hero_offset_y())
        .map("opacity", hero_opacity())
        .map("scale", hero_scale());
    let nav = ScrollTransform::nav_backdrop(&handle, &document);

    info!("Scrolling {} px over {} ms", content - viewport, duration_ms);

    let max_offset = content - viewport;
    let per_frame = max_offset * driver.frame_ms() / duration_ms.max(1) as f32;
    let mut frame = 0u64;

    driver.run_until(duration_ms as f64 + 10_000.0, |_| {
        page.scroll_by(per_frame);
        frame += 1;

        let state = hero.snapshot();
        if frame % 6 == 0 {
            println!(
                "p {:>5.3} ~{:>5.3}  y {:>7.1}  alpha {:>4.2}  scale {:>5.3}  nav {:>4.2}  feat {:>4.2}",
                hero.raw_progress(),
                state.progress,
                state.derived["offset_y"],
                state.derived["opacity"],
                state.derived["scale"],
                nav.value("opacity").unwrap_or_default(),
                features.progress(),
            );
        }

        hero.raw_progress() >= 1.0 && state.progress == hero.raw_progress()
    });

    Ok(())
}

fn cmd_magnet(config: &RefractionConfig, driver: &FrameDriver) -> Result<()> {
    let handle = driver.scheduler().handle();
    let pointer = ManualPointer::new();
    let button = Rect::new(100.0, 100.0, 200.0, 60.0);

    let tracker = PointerOffsetTracker::with_factor(
        &handle,
        &pointer,
        button,
        0.3,
        config.springs.magnetic()?,
    )?;
    let glow = CursorFollower::with_offset(
        &handle,
        &pointer,
        DEFAULT_CURSOR_OFFSET,
        config.springs.cursor()?,
    );

    info!("Sweeping the pointer across a {}x{} button", button.width, button.height);

    // Left of the button to right of it in 60 frames, then out of the window
    let path_frames = 60;
    let mut frame = 0u32;

    driver.run_until(10_000.0, |_| {
        if frame < path_frames {
            let x = 40.0 + 320.0 * frame as f32 / path_frames as f32;
            pointer.move_to(x, 130.0);
        } else if frame == path_frames {
            pointer.leave();
        }
        frame += 1;

        if frame % 3 == 0 {
            let (dx, dy) = tracker.offset();
            let (gx, gy) = glow.position();
            println!(
                "hover {:<5}  offset ({:>6.2}, {:>6.2})  glow ({:>7.1}, {:>7.1})",
                tracker.is_hovering(),
                dx,
                dy,
                gx,
                gy
            );
        }

        frame > path_frames && !tracker.is_animating() && !glow.is_animating()
    });

    Ok(())
}

fn cmd_counter(driver: &FrameDriver) -> Result<()> {
    let handle = driver.scheduler().handle();
    let stats = landing_stats();

    let counters = stats
        .iter()
        .map(|stat| CountUp::new(&handle, stat.value, DEFAULT_COUNT_MS))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let counters = Arc::new(counters);

    // The stats strip sits halfway down a 4800 px page
    let page = ManualScroll::new(800.0, 4800.0);
    let trigger_counters = Arc::clone(&counters);
    let trigger = InViewTrigger::new(&page, 2400.0, 200.0, move || {
        tracing::debug!("stats strip in view");
        for counter in trigger_counters.iter() {
            counter.start();
        }
    });

    info!("Scrolling to the stats strip");
    let mut last = String::new();

    driver.run_until(20_000.0, |_| {
        if !trigger.has_fired() {
            page.scroll_by(40.0);
        }

        let line = stats
            .iter()
            .zip(counters.iter())
            .map(|(stat, counter)| format!("{:>8}", stat.format(counter.current())))
            .collect::<Vec<_>>()
            .join("  ");
        if line != last {
            println!("{}", line);
            last = line;
        }

        counters.iter().all(|c| c.is_complete())
    });

    for stat in &stats {
        println!("{:>8}  {}", stat.format(stat.value), stat.label);
    }

    Ok(())
}

fn cmd_info(config: &RefractionConfig, fps: u32) -> Result<()> {
    println!("Refraction");
    println!("==========");
    println!();
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!("Frame rate: {} fps", fps);
    println!();

    println!("Springs:");
    for (name, spring) in [
        ("magnetic", config.springs.magnetic()?),
        ("cursor", config.springs.cursor()?),
        ("scroll", config.springs.scroll()?),
    ] {
        println!(
            "  - {:<9} stiffness {:>6.1}  damping {:>5.1}  mass {:>4.1}  ({})",
            name,
            spring.stiffness,
            spring.damping,
            spring.mass,
            damping_class(&spring)
        );
    }
    println!();

    println!("Resolved configuration:");
    println!("{}", config.to_toml()?);

    Ok(())
}

fn damping_class(spring: &SpringConfig) -> &'static str {
    if spring.is_underdamped() {
        "underdamped"
    } else if spring.is_overdamped() {
        "overdamped"
    } else {
        "critically damped"
    }
}
