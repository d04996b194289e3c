//! `livetodo` terminal client.
//!
//! Reads commands from stdin, renders the current screen to stdout after
//! every change and logs to stderr.

use clap::Parser;
use livetodo::commands::{self, HELP, Outcome};
use livetodo::view::{FormMode, Screen, Toasts};
use livetodo::{
    AppConfig, AppEnvironment, Backend, DocumentStore, IdentityProvider, LiveTodoStore,
    MemoryDocumentStore, MemoryIdentityProvider, NotificationCenter, SessionAction, firebase,
    livetodo_store,
};
use std::io::Write as _;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Personal todo list kept in sync across sessions",
    long_about = None
)]
struct Cli {
    /// Where accounts and todos live; overrides LIVETODO_BACKEND.
    #[arg(long, value_enum)]
    backend: Option<Backend>,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "livetodo=info,livetodo_runtime=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing();

    let mut config = AppConfig::from_env()?;
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    tracing::info!(backend = ?config.backend, "starting");

    let notifications = NotificationCenter::new()
        .with_auto_close(config.success_auto_close, config.error_auto_close);

    match config.backend {
        Backend::Memory => {
            run(
                MemoryIdentityProvider::new(),
                MemoryDocumentStore::new(),
                notifications,
            )
            .await
        },
        Backend::Firebase => {
            let (identity, documents) = firebase::connect(&config.firebase()?);
            run(identity, documents, notifications).await
        },
    }
}

async fn run<I, D>(identity: I, documents: D, notifications: NotificationCenter) -> anyhow::Result<()>
where
    I: IdentityProvider + Clone + 'static,
    D: DocumentStore + Clone + 'static,
{
    let mut notices = notifications.subscribe();
    let store = livetodo_store(AppEnvironment::new(identity, documents, notifications));
    let mut actions = store.subscribe_actions();
    store.send(SessionAction::Start.into()).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut mode = FormMode::default();
    let mut toasts = Toasts::new();
    redraw(&store, mode, &mut toasts).await;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let state = store.state(Clone::clone).await;
                match commands::parse(&line).and_then(|command| commands::resolve(command, &state)) {
                    Ok(Outcome::Quit) => break,
                    Ok(Outcome::Help) => println!("{HELP}"),
                    Ok(Outcome::Redraw) => redraw(&store, mode, &mut toasts).await,
                    Ok(Outcome::ShowForm(next)) => {
                        mode = next;
                        redraw(&store, mode, &mut toasts).await;
                    },
                    Ok(Outcome::Dispatch(action)) => {
                        store.send(action).await?;
                        redraw(&store, mode, &mut toasts).await;
                    },
                    Err(error) => println!("! {error}"),
                }
            },
            action = actions.recv() => match action {
                Ok(_) | Err(RecvError::Lagged(_)) => redraw(&store, mode, &mut toasts).await,
                Err(RecvError::Closed) => break,
            },
            notice = notices.recv() => {
                if let Ok(notification) = notice {
                    toasts.push(notification, Instant::now());
                    redraw(&store, mode, &mut toasts).await;
                }
            },
        }
    }

    // Releases the live query and the session watch
    if let Err(error) = store.shutdown().await {
        tracing::warn!(%error, "shutdown did not finish cleanly");
    }
    Ok(())
}

async fn redraw<I, D>(store: &LiveTodoStore<I, D>, mode: FormMode, toasts: &mut Toasts)
where
    I: IdentityProvider + Clone + 'static,
    D: DocumentStore + Clone + 'static,
{
    let active = toasts.active(Instant::now());
    let screen = store
        .state(|state| Screen::of(state, mode).render(&active))
        .await;
    println!("\n{screen}");
    print!("> ");
    let _ = std::io::stdout().flush();
}
