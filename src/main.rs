use anyhow::{Context, Result};
use dialoguer::Password;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;

use travel_blog_client::api::BlogApi;
use travel_blog_client::auth::{Session, SessionEvent, SqliteStore};
use travel_blog_client::config::{Command, Config, PostArgs};
use travel_blog_client::error::ApiError;
use travel_blog_client::http_client::BlogHttpClient;
use travel_blog_client::models::{ImageUpload, NewPost, RegisterRequest};

#[tokio::main]
async fn main() -> Result<()> {
    let (config, command) = Config::load()?;
    config.validate()?;

    // Initialize logging with a configured level; stdout is reserved for results
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let session = Arc::new(match &config.credentials_db_file {
        Some(path) => {
            tracing::debug!("Using credential database: {}", path.display());
            Session::new(SqliteStore::open(path)?)
        }
        None => Session::in_memory(),
    });

    let mut events = session.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SessionEvent::Expired) => {
                    tracing::warn!("Session expired, credentials were cleared")
                }
                Ok(event) => tracing::debug!(?event, "Session event"),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let http_client = Arc::new(BlogHttpClient::new(
        &config.base_url,
        config.http_request_timeout,
        session,
    )?);
    let api = BlogApi::new(http_client);

    match run(&api, command).await {
        Ok(()) => Ok(()),
        Err(e) if e.requires_login() => {
            eprintln!("Your session has expired. Log in again with `travel-blog login <username>`.");
            std::process::exit(2);
        }
        Err(e) => Err(e.into()),
    }
}

async fn run(api: &BlogApi, command: Command) -> std::result::Result<(), ApiError> {
    match command {
        Command::Login { username, password } => {
            let password = match password {
                Some(p) => p,
                None => prompt_password(false)?,
            };
            let auth = api.login(&username, &password).await?;
            print_json(&auth.user)?;
        }
        Command::Register {
            username,
            email,
            first_name,
            last_name,
            password,
        } => {
            let password = match password {
                Some(p) => p,
                None => prompt_password(true)?,
            };
            let registration = RegisterRequest {
                username,
                email,
                password_confirm: password.clone(),
                password,
                first_name,
                last_name,
            };
            let auth = api.register(&registration).await?;
            print_json(&auth.user)?;
        }
        Command::Profile => print_json(&api.profile().await?)?,
        Command::Whoami => match api.session().user_record()? {
            Some(record) => println!("{}", record),
            None => eprintln!("Not logged in"),
        },
        Command::Logout => {
            api.logout()?;
            eprintln!("Logged out");
        }
        Command::Posts { public } => {
            let posts = if public {
                api.list_public_posts().await?
            } else {
                api.list_posts().await?
            };
            print_json(&posts)?;
        }
        Command::Post { id } => print_json(&api.get_post(id).await?)?,
        Command::CreatePost(args) => {
            let post = new_post(args)?;
            print_json(&api.create_post(&post).await?)?;
        }
        Command::UpdatePost { id, post } => {
            let post = new_post(post)?;
            print_json(&api.update_post(id, &post).await?)?;
        }
        Command::DeletePost { id } => {
            api.delete_post(id).await?;
            eprintln!("Deleted post {}", id);
        }
        Command::Comment { post_id, content } => {
            print_json(&api.create_comment(post_id, &content).await?)?;
        }
    }

    Ok(())
}

fn prompt_password(confirm: bool) -> Result<String> {
    let mut prompt = Password::new().with_prompt("Password");
    if confirm {
        prompt = prompt.with_confirmation("Confirm password", "Passwords do not match");
    }
    prompt.interact().context("Failed to read password")
}

fn new_post(args: PostArgs) -> Result<NewPost> {
    let image = args
        .image
        .as_deref()
        .map(ImageUpload::from_path)
        .transpose()?;
    Ok(NewPost {
        title: args.title,
        content: args.content,
        location: args.location,
        tags: args.tags,
        image,
    })
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to format output")?;
    println!("{}", text);
    Ok(())
}
