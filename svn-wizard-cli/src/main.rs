use clap::Parser;
use svn_wizard_core::{CoreCliArgs, execute_svn_wizard_flow, style};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_logging(verbose: bool) {
    let level = if verbose { "svn_wizard_core=debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

#[tokio::main]
async fn main() {
    let cli_args = CoreCliArgs::parse();
    init_logging(cli_args.verbose);

    match execute_svn_wizard_flow(cli_args).await {
        Ok((final_commit_message, committed)) => {
            if !committed && !final_commit_message.is_empty() {
                println!("\n{}", style("✨ not committed ✨").yellow().bold());
                println!("{}", style("to commit it yourself, run:").cyan());
                let svn_command = format!(
                    "svn commit -m \"{}\"",
                    final_commit_message.replace('"', "\\\"")
                );
                println!("{}\n", style(svn_command).yellow().bold());
            }
        }
        Err(e) => {
            eprintln!(
                "{} {} {}",
                style("❌"),
                style("svn-wizard failed:").red().bold(),
                style(format!("{e:#}")).red()
            );
            std::process::exit(1);
        }
    }
}
