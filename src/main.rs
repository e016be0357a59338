use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use sitewright::config::SiteConfig;

mod cmd;

#[derive(Parser)]
#[command(name = "sitewright")]
#[command(
    version,
    about = "Describe a website, let AI build it, publish it to GitHub Pages"
)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory holding apps, settings and sitewright.toml
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Plan, review and deploy a new site
    Create {
        /// What the site should be (asked interactively if omitted)
        prompt: Option<String>,

        /// Use this name instead of the generated one
        #[arg(long)]
        name: Option<String>,

        /// Use this description instead of the generated one
        #[arg(long)]
        description: Option<String>,

        /// Accept the plan and deploy without asking
        #[arg(short, long)]
        yes: bool,
    },
    /// Generate and print a plan without deploying
    Plan { prompt: String },
    /// List created sites, newest first
    List,
    /// Show one site
    Show {
        id: String,

        /// Print the content of every file
        #[arg(long)]
        files: bool,

        /// Open the public URL in a browser
        #[arg(long)]
        open: bool,
    },
    /// Ask for a change to a site's page
    Revise { id: String, message: String },
    /// Download a page from a repository with its links made absolute
    Fetch {
        owner: String,
        repo: String,

        #[arg(long, default_value = "index.html")]
        path: String,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// View or change the stored GitHub token
    Settings {
        #[command(subcommand)]
        command: Option<SettingsCommands>,
    },
    /// Delete repositories left by failed or abandoned deploys
    Cleanup {
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
    /// Forget a site locally (the repository is kept)
    Remove {
        id: String,

        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum SettingsCommands {
    /// Show whether a token is stored
    Show,
    /// Store a GitHub personal access token
    SetToken { token: String },
    /// Remove the stored token
    Clear,
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default sitewright.toml file
    Init,
}

fn init_tracing(verbose: bool) {
    let directive = if verbose {
        "sitewright=debug"
    } else {
        "sitewright=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = SiteConfig::new(cli.data_dir.clone(), cli.verbose)?;

    match &cli.command {
        Commands::Create {
            prompt,
            name,
            description,
            yes,
        } => {
            cmd::cmd_create(
                &config,
                prompt.as_deref(),
                name.as_deref(),
                description.as_deref(),
                *yes,
            )
            .await?
        }
        Commands::Plan { prompt } => cmd::cmd_plan(&config, prompt).await?,
        Commands::List => cmd::cmd_list(&config)?,
        Commands::Show { id, files, open } => cmd::cmd_show(&config, id, *files, *open)?,
        Commands::Revise { id, message } => cmd::cmd_revise(&config, id, message).await?,
        Commands::Fetch {
            owner,
            repo,
            path,
            out,
        } => cmd::cmd_fetch(&config, owner, repo, path, out.as_deref()).await?,
        Commands::Settings { command } => cmd::cmd_settings(&config, command.clone())?,
        Commands::Cleanup { force } => cmd::cmd_cleanup(&config, *force).await?,
        Commands::Remove { id, force } => cmd::cmd_remove(&config, id, *force)?,
        Commands::Config { command } => cmd::cmd_config(&config, command.clone())?,
    }

    Ok(())
}
