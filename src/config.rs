use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Application directory under the platform data dir
const APP_DIR: &str = "travel-blog";

/// Credential database file name
const CREDENTIALS_DB_FILE: &str = "credentials.sqlite3";

/// Travel Blog - command-line client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Backend base URL
    #[arg(short = 'u', long, env = "BACKEND_URL", default_value = "http://localhost:8000")]
    pub base_url: String,

    /// Path to the credential database
    #[arg(short = 'd', long, env = "CREDENTIALS_DB_FILE")]
    pub db_file: Option<String>,

    /// Keep credentials in memory only
    #[arg(long, env = "EPHEMERAL_SESSION", default_value = "false")]
    pub ephemeral: bool,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "10")]
    pub http_timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Log in and store credentials
    Login {
        username: String,
        /// Prompted for when omitted
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Create an account and store credentials
    Register {
        username: String,
        #[arg(short, long)]
        email: String,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
        /// Prompted for (with confirmation) when omitted
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Fetch the profile of the logged-in user
    Profile,

    /// Show the cached user record without calling the backend
    Whoami,

    /// Forget stored credentials
    Logout,

    /// List posts
    Posts {
        /// List public posts only
        #[arg(long)]
        public: bool,
    },

    /// Show one post
    Post { id: i64 },

    /// Create a post
    CreatePost(PostArgs),

    /// Replace a post
    UpdatePost {
        id: i64,
        #[command(flatten)]
        post: PostArgs,
    },

    /// Delete a post
    DeletePost { id: i64 },

    /// Comment on a post
    Comment { post_id: i64, content: String },
}

#[derive(clap::Args, Debug, Clone, PartialEq)]
pub struct PostArgs {
    #[arg(short, long)]
    pub title: String,
    #[arg(short, long)]
    pub content: String,
    #[arg(short, long, default_value = "")]
    pub location: String,
    /// Comma-separated tags
    #[arg(long, default_value = "")]
    pub tags: String,
    /// Image file to upload
    #[arg(short, long)]
    pub image: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct Config {
    // Backend
    pub base_url: String,
    pub http_request_timeout: u64,

    // Credential storage; None keeps the session in memory
    pub credentials_db_file: Option<PathBuf>,

    // Logging
    pub log_level: String,
}

impl Config {
    /// Load configuration with priority: CLI > ENV (.env included) > defaults
    pub fn load() -> Result<(Self, Command)> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let args = CliArgs::parse();
        let command = args.command.clone();
        Ok((Self::from_args(args)?, command))
    }

    /// Build config from parsed arguments
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let credentials_db_file = if args.ephemeral {
            None
        } else {
            Some(match args.db_file {
                Some(path) => expand_tilde(&path),
                None => default_db_path()?,
            })
        };

        Ok(Config {
            base_url: args.base_url,
            http_request_timeout: args.http_timeout,
            credentials_db_file,
            log_level: args.log_level,
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.base_url)
            .with_context(|| format!("BACKEND_URL is not a valid URL: {}", self.base_url))?;

        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("BACKEND_URL must use http or https: {}", self.base_url);
        }

        if self.http_request_timeout == 0 {
            anyhow::bail!("HTTP_REQUEST_TIMEOUT must be greater than zero");
        }

        Ok(())
    }
}

/// Default credential database location
fn default_db_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().context("Could not find data directory")?;
    Ok(data_dir.join(APP_DIR).join(CREDENTIALS_DB_FILE))
}

/// Expand tilde (~) in file paths to user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(args).unwrap()
    }

    fn config(base_url: &str, timeout: u64) -> Config {
        Config {
            base_url: base_url.to_string(),
            http_request_timeout: timeout,
            credentials_db_file: None,
            log_level: "info".to_string(),
        }
    }

    #[test]
    fn test_expand_tilde() {
        let path = expand_tilde("~/test/file.txt");
        assert!(path.to_string_lossy().contains("test/file.txt"));
        assert!(!path.to_string_lossy().starts_with("~"));

        let path = expand_tilde("/absolute/path");
        assert_eq!(path, PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_expand_tilde_just_tilde() {
        // Just "~" without slash should not expand
        let path = expand_tilde("~");
        assert_eq!(path, PathBuf::from("~"));
    }

    #[test]
    fn test_explicit_options() {
        let args = parse(&[
            "travel-blog",
            "--base-url",
            "https://blog.example.com",
            "--db-file",
            "/tmp/creds.sqlite3",
            "--http-timeout",
            "5",
            "posts",
            "--public",
        ]);
        assert_eq!(args.command, Command::Posts { public: true });

        let config = Config::from_args(args).unwrap();
        assert_eq!(config.base_url, "https://blog.example.com");
        assert_eq!(config.http_request_timeout, 5);
        assert_eq!(
            config.credentials_db_file,
            Some(PathBuf::from("/tmp/creds.sqlite3"))
        );
    }

    #[test]
    fn test_ephemeral_has_no_db_file() {
        let args = parse(&["travel-blog", "--ephemeral", "--db-file", "/tmp/x", "logout"]);
        let config = Config::from_args(args).unwrap();
        assert!(config.credentials_db_file.is_none());
    }

    #[test]
    fn test_create_post_args() {
        let args = parse(&[
            "travel-blog",
            "create-post",
            "--title",
            "Porto",
            "--content",
            "Bridges",
            "--tags",
            "portugal,food",
            "--image",
            "ribeira.jpg",
        ]);
        match args.command {
            Command::CreatePost(post) => {
                assert_eq!(post.title, "Porto");
                assert_eq!(post.location, "");
                assert_eq!(post.image, Some(PathBuf::from("ribeira.jpg")));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_validate() {
        assert!(config("http://localhost:8000", 10).validate().is_ok());
        assert!(config("ftp://localhost", 10).validate().is_err());
        assert!(config("localhost:8000/api", 10).validate().is_err());
        assert!(config("http://localhost:8000", 0).validate().is_err());
    }
}
