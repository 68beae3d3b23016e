use crate::report::{run_report, run_template, ReportArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use kpi_bonus::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "KPI Bonus Engine",
    about = "Evaluate monthly KPI values and aggregate manager bonuses",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Recalculate a month on the reference configuration and print the manager overview
    Report(ReportArgs),
    /// Print the CSV import template
    Template,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Report(args) => run_report(args),
        Command::Template => run_template(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn report_accepts_month_and_csv() {
        let cli = Cli::try_parse_from([
            "kpi-bonus-api",
            "report",
            "--month",
            "2025-11",
            "--csv",
            "values.csv",
        ])
        .expect("arguments parse");

        match cli.command {
            Some(Command::Report(args)) => {
                assert_eq!(args.month.map(|month| month.to_string()).as_deref(), Some("2025-11"));
                assert!(args.csv.is_some());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn report_rejects_malformed_month() {
        let result = Cli::try_parse_from(["kpi-bonus-api", "report", "--month", "2025-13"]);
        assert!(result.is_err());
    }
}
