use clap::Parser;
use commentary::{
    app::{App, KEYRING_SERVICE, cli::Cli},
    auth::{AuthProvider, keyring::KeyringAuth},
    errors::AppError,
    logging,
};

#[tokio::main]
async fn main() -> anyhow::Result<(), AppError> {
    let cli = Cli::parse();
    if cli.args.print_log_dir {
        println!("Log directory: {}", logging::get_data_dir().display());
        return Ok(());
    }
    if let Some(ref token) = cli.args.set_token {
        let auth = KeyringAuth::new(KEYRING_SERVICE)?;
        auth.set_token(token)?;
        return Ok(());
    }

    let app = App::new(cli).await?;
    app.run().await
}
