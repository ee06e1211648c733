mod config;
mod osc;
mod sender;
mod volume;

use std::{
    net::SocketAddr,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tao::event::Event;
use tao::event_loop::{ControlFlow, EventLoop};
use tokio::signal;
use tracing::{debug, error, info, trace, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use hotkey_guard::{
    GlobalHotKeyEvent, GlobalHotkeyBackend, HotkeyDispatcher, HotkeyRegistry, TimeoutGuard,
};

use crate::config::Config;
use crate::sender::OscSender;
use crate::volume::{VolumeController, bind_all};

/// How often the event loop wakes to check for a shutdown request
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Parser, Debug)]
#[command(name = "totalmix-vc")]
#[command(about = "Global hotkeys for TotalMix FX volume control", long_about = None)]
struct Args {
    /// Path to RON configuration file
    config: Option<PathBuf>,

    /// OSC endpoint of TotalMix, overriding the config file
    #[arg(long)]
    endpoint: Option<SocketAddr>,

    /// Time allowed for each hotkey action in milliseconds
    #[arg(long)]
    timeout_ms: Option<u32>,

    /// Set the log level
    #[arg(short, long, value_enum)]
    log_level: Option<LogLevel>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Only initialize tracing if RUST_LOG is set or log level is explicitly provided
    if std::env::var("RUST_LOG").is_ok() || args.log_level.is_some() {
        let log_level = match args.log_level.unwrap_or(LogLevel::Info) {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        };

        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .without_time()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            )
            .with(
                EnvFilter::from_default_env()
                    .add_directive(format!("hotkey_guard={log_level}").parse()?)
                    .add_directive(format!("totalmix_vc={log_level}").parse()?),
            )
            .init();
    }

    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from: {:?}", path);
            Config::load(path)?
        }
        None => Config::default(),
    };
    if let Some(endpoint) = args.endpoint {
        config.endpoint = endpoint;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.timeout_ms = timeout_ms;
    }
    config.validate()?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    let sender = runtime
        .block_on(OscSender::bind(config.endpoint))
        .context("Failed to open OSC socket")?;
    info!("Sending OSC to {}", sender.endpoint());
    let controller = Arc::new(VolumeController::new(sender, config.volume));

    // The event loop must exist before hotkeys are registered (main thread on macOS)
    let event_loop = EventLoop::new();

    let backend = GlobalHotkeyBackend::new().context("Failed to create hotkey manager")?;
    let registry = Arc::new(HotkeyRegistry::new(Arc::new(backend)));
    let bound = bind_all(&registry, &config.bindings, &controller);
    if bound == 0 {
        warn!("No hotkeys could be registered");
    } else {
        info!("{} of {} hotkeys registered", bound, config.bindings.len());
    }

    let dispatcher = HotkeyDispatcher::new(registry.clone(), runtime.handle().clone())
        .with_timeout_ms(config.timeout_ms)
        .with_guard(TimeoutGuard::new().with_expiry_policy(config.on_expiry));
    info!(
        "Actions time out after {}ms ({:?} on expiry)",
        dispatcher.timeout_ms(),
        config.on_expiry
    );
    GlobalHotKeyEvent::set_event_handler(Some(move |event: GlobalHotKeyEvent| {
        dispatcher.on_hotkey_event(event)
    }));

    let shutdown_requested = Arc::new(AtomicBool::new(false));
    let shutdown_ctrlc = shutdown_requested.clone();
    runtime.spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, shutting down...");
                shutdown_ctrlc.store(true, Ordering::SeqCst);
            }
            Err(e) => error!("Failed to install Ctrl+C handler: {}", e),
        }
    });

    info!("Listening for hotkeys");
    event_loop.run(move |event, _, control_flow| {
        // Keep the runtime alive for as long as the loop runs
        let _runtime = &runtime;
        *control_flow = ControlFlow::WaitUntil(Instant::now() + SHUTDOWN_POLL);

        if shutdown_requested.load(Ordering::SeqCst) {
            *control_flow = ControlFlow::Exit;
        }

        match event {
            Event::LoopDestroyed => {
                GlobalHotKeyEvent::set_event_handler(None::<fn(GlobalHotKeyEvent)>);
                let released = registry.teardown();
                debug!("Released {} hotkeys on shutdown", released);
            }
            Event::NewEvents(_) | Event::MainEventsCleared | Event::RedrawEventsCleared => {}
            _ => trace!("Event loop received: {:?}", event),
        }
    })
}
