use anyhow::{Result, bail};
use clap::Parser;
use modeploy::application::{self, NewCodeReport};
use modeploy::context::RunContext;
use modeploy::deploy::{DeploymentTask, TaskStatus};
use modeploy::runtime::RealRuntime;
use std::path::PathBuf;

/// modeploy - deploy installed packages into a modular PHP application tree
///
/// Reads composer.json and vendor/composer/installed.json from the project
/// directory, deploys every mapped package into app/code, consolidates
/// libraries and runs the post-deploy fix-ups.
///
/// Examples:
///   modeploy deploy                      # Deploy everything in the current project
///   modeploy -p /srv/shop plan           # Show order, strategy and target of each package
///   modeploy undeploy acme/module-foo    # Remove a package's deployed files
#[derive(Parser, Debug)]
#[command(author, version = env!("MODEPLOY_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project directory holding composer.json (also via MODEPLOY_PROJECT)
    #[arg(
        long = "project",
        short = 'p',
        env = "MODEPLOY_PROJECT",
        value_name = "DIR",
        default_value = ".",
        global = true
    )]
    pub project: PathBuf,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Deploy all packages and run the post-deploy steps
    Deploy,

    /// Remove the deployed files of a package
    Undeploy(UndeployArgs),

    /// Print the deployment plan without touching the filesystem
    Plan,
}

#[derive(clap::Args, Debug)]
pub struct UndeployArgs {
    /// The package in the format "vendor/name"
    #[arg(value_name = "VENDOR/NAME")]
    pub package: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = RealRuntime;
    let ctx = RunContext::load(&runtime, &cli.project)?;

    match cli.command {
        Commands::Deploy => {
            let report = application::on_new_code(&runtime, &ctx)?;
            print_report(&report);
            let failed = report.deploy.failures().len();
            if failed > 0 {
                bail!("{} package(s) failed to deploy", failed);
            }
        }
        Commands::Undeploy(args) => {
            application::on_package_uninstall(&runtime, &ctx, &args.package)?;
            println!("Undeployed {}", args.package);
        }
        Commands::Plan => {
            for task in application::plan(&runtime, &ctx) {
                println!("{}", plan_line(&task));
            }
        }
    }
    Ok(())
}

fn print_report(report: &NewCodeReport) {
    for task in &report.deploy.tasks {
        match &task.status {
            TaskStatus::Succeeded => println!("  deployed {} ({})", task.package, task.strategy),
            TaskStatus::Skipped => println!("  skipped  {}", task.package),
            TaskStatus::Failed(err) => eprintln!("  failed   {}: {}", task.package, err),
            TaskStatus::Pending => {}
        }
    }
    for warning in report.warnings() {
        eprintln!("warning: {}", warning);
    }
}

fn plan_line(task: &DeploymentTask) -> String {
    let line = format!("{:<8} {} -> {}", task.strategy, task.package, task.target.display());
    match &task.status {
        TaskStatus::Failed(err) => format!("{} [{}]", line, err),
        _ => line,
    }
}
