use std::{sync::Arc, time::Duration};

use inquire::Password;
use tracing::info;

use crate::{
    auth::{AuthProvider, keyring::KeyringAuth},
    comment::CommentMutations,
    errors::AppError,
    fixture::FixtureBackend,
    github::{GithubClient, GithubThread},
    logging,
    thread::ThreadSource,
    ui,
};

pub mod cli;

/// Keyring service the GitHub token is stored under.
pub const KEYRING_SERVICE: &str = "commentary";

enum Backend {
    Github {
        client: GithubClient,
        owner: String,
        repo: String,
        number: u64,
    },
    Fixture(FixtureBackend),
}

pub struct App {
    backend: Backend,
    log_level: cli::LogLevel,
}

impl App {
    pub async fn new(cli: cli::Cli) -> Result<Self, AppError> {
        let args = cli.args;
        let backend = match args.fixture {
            Some(path) => Backend::Fixture(
                FixtureBackend::load(path)
                    .await?
                    .with_latency(Duration::from_millis(args.latency_ms)),
            ),
            None => {
                let owner = args.owner.ok_or(AppError::MissingArgument("owner"))?;
                let repo = args.repo.ok_or(AppError::MissingArgument("repo"))?;
                let number = args.issue.ok_or(AppError::MissingArgument("issue"))?;
                let mut auth = KeyringAuth::new(KEYRING_SERVICE)?;
                let token = match auth.get_token().ok() {
                    Some(token) => token,
                    None => Self::handle_no_token(&mut auth)?,
                };
                Backend::Github {
                    client: GithubClient::new(Some(token))?,
                    owner,
                    repo,
                    number,
                }
            }
        };
        Ok(Self {
            backend,
            log_level: args.log_level,
        })
    }

    pub async fn run(self) -> Result<(), AppError> {
        logging::init(self.log_level)?;
        let (source, mutations): (Arc<dyn ThreadSource>, Arc<dyn CommentMutations>) =
            match self.backend {
                Backend::Github {
                    client,
                    owner,
                    repo,
                    number,
                } => {
                    let viewer = client.current_user().await?;
                    info!(%owner, %repo, number, %viewer, "opening GitHub thread");
                    let thread = Arc::new(GithubThread::new(client, owner, repo, number, viewer));
                    (thread.clone(), thread)
                }
                Backend::Fixture(fixture) => {
                    let fixture = Arc::new(fixture);
                    (fixture.clone(), fixture)
                }
            };
        ui::run(source, mutations).await
    }

    pub fn handle_no_token(auth: &mut impl AuthProvider) -> Result<String, AppError> {
        let prompt = Password::new("No token found. Please enter your github token")
            .with_display_toggle_enabled()
            .without_confirmation()
            .with_display_mode(inquire::PasswordDisplayMode::Masked);
        let token = prompt.prompt()?;
        auth.set_token(&token)?;
        Ok(token)
    }
}
