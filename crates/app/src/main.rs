use anyhow::Context;
use pdf_editor_app::cli::{init_logging, no_window_requested, Cli, StartupPlan};

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = match Cli::parse_args(std::env::args_os()) {
        Ok(cli) => cli,
        Err(err) => err.exit(),
    };
    init_logging();

    let plan = StartupPlan::resolve(&cli);
    if no_window_requested() {
        println!("{}", serde_json::to_string_pretty(&plan).context("failed to encode startup plan")?);
        return Ok(());
    }

    tracing::info!(version = %plan.version, "starting editor");
    pdf_editor_app::run(plan).context("failed to run the editor")
}
