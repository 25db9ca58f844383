//! apns-push - send APNs notifications read line by line from stdin.

mod config;
mod report;

use clap::Parser as _;
use color_eyre::eyre::WrapErr as _;

#[tokio::main(flavor = "current_thread")]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;

    // Stdout carries the report, logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = config::Cli::parse();
    let settings = config::Settings::resolve(cli).wrap_err("failed to load configuration")?;

    let identity = apns_crypto::load_identity(&settings.certificate_path).wrap_err_with(|| {
        format!(
            "error retrieving certificate `{}`",
            settings.certificate_path.display()
        )
    })?;

    let Some(topic) = settings
        .topic
        .clone()
        .or_else(|| identity.topic().map(str::to_owned))
    else {
        color_eyre::eyre::bail!(
            "no topic given and certificate `{}` does not name one, pass --topic",
            settings.certificate_path.display()
        );
    };

    config::check_topic(&topic).wrap_err("certificate topic is not a valid header value")?;

    let mut client = apns_push::ApnsClient::with_config(identity, settings.client_config());
    client.set_environment(settings.environment);

    tracing::info!(
        environment = %settings.environment,
        topic = %topic,
        "reading notifications from stdin"
    );

    let dispatch = apns_push::DispatchLoop::new(client, topic).with_options(settings.options);
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut reporter = report::LineReporter::stdout();

    let summary = dispatch.run(stdin, &mut reporter).await;
    summary.outcome.into_result()?;

    Ok(())
}
