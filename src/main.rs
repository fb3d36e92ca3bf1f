use clap::Parser;
use imgui_explicit::cli::{AppContext, Cli, Commands};
use imgui_explicit::core::error::exit_code_for;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    // Build a context once, pass everywhere
    let ctx = AppContext {
        quiet: cli.quiet,

        no_color: cli.no_color,
    };

    let verbose = match &cli.command {
        Commands::Convert(args) => args.verbose,

        Commands::Rebase(args) => args.verbose,

        _ => false,
    };
    init_tracing(verbose);

    let result = match cli.command {
        Commands::Convert(args) => imgui_explicit::convert_run(args, &ctx),

        Commands::Rebase(args) => imgui_explicit::rebase_run(args, &ctx),

        Commands::Rtransform(args) => imgui_explicit::rtransform_run(args, &ctx),

        Commands::Init(args) => imgui_explicit::infra::config::init(args, &ctx),

        Commands::Completions(args) => imgui_explicit::completion::run(args),
    };

    match result {
        Ok(()) => {}
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(exit_code_for(&e));
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "imgui_explicit=debug"
    } else {
        "imgui_explicit=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
