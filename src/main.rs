use std::{
    io::{self, Write},
    process,
    sync::Arc,
};

use postwall::{
    application::{
        composer::PostComposer,
        error::AppError,
        gateway::PostsGateway,
        refresh::RefreshSignal,
        store::{CollectionState, CollectionStore, ReloadOutcome},
    },
    config::{self, Command, DeleteArgs, ListArgs, PostArgs, UpdateArgs},
    domain::posts::{PostFields, PostId, normalize_fields, validate_fields},
    infra::{error::InfraError, http::HttpPostsGateway, telemetry},
    presentation::{
        shell::{Flow, Shell},
        views::{render_collection, render_post},
    },
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::watch,
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(error.exit_code());
    }
}

fn report_application_error(error: &AppError) {
    let chain = error.chain().join(": ");
    if dispatcher::has_been_set() {
        error!(error = %chain, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_writer(io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %chain, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;
    telemetry::init(&settings.logging)?;

    let gateway: Arc<dyn PostsGateway> =
        Arc::new(HttpPostsGateway::new(settings.remote.base_url.clone())?);
    info!(collection = %settings.remote.base_url, "Using remote collection");

    match cli_args.command.unwrap_or(Command::Shell) {
        Command::Shell => run_shell(gateway, &settings).await,
        Command::List(args) => run_list(gateway, args).await,
        Command::Create(args) => run_create(gateway, &settings, args).await,
        Command::Update(args) => run_update(gateway, args).await,
        Command::Delete(args) => run_delete(gateway, args).await,
    }
}

fn fields_from_args(args: PostArgs) -> Result<PostFields, AppError> {
    let PostArgs {
        author,
        content,
        image_url,
    } = args;
    let fields = normalize_fields(
        PostFields::new(author, content).with_image_url(image_url.unwrap_or_default()),
    );
    validate_fields(&fields)?;
    Ok(fields)
}

async fn run_list(gateway: Arc<dyn PostsGateway>, args: ListArgs) -> Result<(), AppError> {
    let store = CollectionStore::new(gateway);
    match store.reload().await {
        ReloadOutcome::Applied { .. } => {}
        ReloadOutcome::Failed(err) => return Err(err.into()),
        ReloadOutcome::Superseded => {
            return Err(AppError::unexpected("initial load was superseded"));
        }
    }

    let state = store.state();
    if args.json {
        let body = serde_json::to_string_pretty(&state.items)
            .map_err(|err| AppError::unexpected(format!("failed to encode posts: {err}")))?;
        println!("{body}");
    } else {
        println!("{}", render_collection(&state));
    }
    Ok(())
}

async fn run_create(
    gateway: Arc<dyn PostsGateway>,
    settings: &config::Settings,
    args: PostArgs,
) -> Result<(), AppError> {
    let signal = RefreshSignal::new(settings.refresh.channel_capacity);
    let composer = PostComposer::new(gateway, signal);
    let post = composer.publish(fields_from_args(args)?).await?;
    println!("{}", render_post(&post));
    Ok(())
}

async fn run_update(gateway: Arc<dyn PostsGateway>, args: UpdateArgs) -> Result<(), AppError> {
    let UpdateArgs { id, post } = args;
    let fields = fields_from_args(post)?;
    let post = gateway.update(&PostId::from(id), &fields).await?;
    println!("{}", render_post(&post));
    Ok(())
}

async fn run_delete(gateway: Arc<dyn PostsGateway>, args: DeleteArgs) -> Result<(), AppError> {
    let id = PostId::from(args.id);
    gateway.delete(&id).await?;
    println!("Deleted post #{id}.");
    Ok(())
}

async fn run_shell(
    gateway: Arc<dyn PostsGateway>,
    settings: &config::Settings,
) -> Result<(), AppError> {
    let signal = RefreshSignal::new(settings.refresh.channel_capacity);
    let store = Arc::new(CollectionStore::new(Arc::clone(&gateway)));
    let listener = store.listen(&signal);
    let composer = PostComposer::new(gateway, signal);
    let mut shell = Shell::new(Arc::clone(&store), composer, io::stdout());

    let result = shell_loop(&store, &mut shell).await;
    shell.session().close();
    drop(listener);
    result.map_err(|err| InfraError::from(err).into())
}

async fn shell_loop<W: Write>(
    store: &CollectionStore,
    shell: &mut Shell<W>,
) -> io::Result<()> {
    let mut updates = store.subscribe();
    store.reload().await;
    updates.borrow_and_update();
    shell.render_collection()?;
    shell.handle_line("help").await?;
    shell.prompt()?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if shell.handle_line(&line).await? == Flow::Quit {
                    break;
                }
                if updates.has_changed().unwrap_or(false) {
                    render_if_settled(shell, &mut updates)?;
                }
                shell.prompt()?;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                if render_if_settled(shell, &mut updates)? {
                    shell.prompt()?;
                }
            }
        }
    }
    Ok(())
}

/// Re-render the list unless a reload is still pending; returns whether it rendered.
fn render_if_settled<W: Write>(
    shell: &mut Shell<W>,
    updates: &mut watch::Receiver<CollectionState>,
) -> io::Result<bool> {
    let settled = !updates.borrow_and_update().status.is_loading();
    if settled {
        shell.refresh_view()?;
    }
    Ok(settled)
}
