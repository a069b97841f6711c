//! Quiver - command-line client for S3-compatible object storage

mod commands;
mod config;
mod progress;
mod s3_client;
mod utils;

use clap::{Parser, Subcommand, ValueEnum};
use commands::CommandContext;
use config::Config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "quiver")]
#[command(version)]
#[command(about = "Command-line client for S3-compatible object storage", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration profile
    #[arg(short, long, global = true, env = "QUIVER_PROFILE")]
    profile: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Suppress informational output and confirmations
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "QUIVER_LOG_LEVEL", default_value = "warn")]
    log_level: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum PresignMethod {
    Get,
    Put,
}

#[derive(Subcommand)]
enum Commands {
    /// List buckets, objects or incomplete uploads
    Ls {
        /// s3:// or s3://bucket/prefix
        #[arg(default_value = "s3://")]
        path: String,

        /// List every key below the prefix
        #[arg(short, long)]
        recursive: bool,

        /// Show dates, sizes and storage classes
        #[arg(short, long)]
        long: bool,

        /// Human readable sizes
        #[arg(short = 'H', long)]
        human_readable: bool,

        /// Print totals only
        #[arg(long)]
        summarize: bool,

        /// List incomplete multipart uploads instead of objects
        #[arg(short = 'I', long)]
        incomplete: bool,
    },

    /// Make a bucket
    Mb {
        /// Bucket name or s3://bucket
        bucket: String,

        /// Region to create the bucket in
        #[arg(long)]
        region: Option<String>,
    },

    /// Remove a bucket
    Rb {
        /// Bucket name or s3://bucket
        bucket: String,

        /// Delete all objects first
        #[arg(long)]
        force: bool,
    },

    /// Upload, download or copy objects
    Cp {
        source: String,
        destination: String,

        /// Copy directories and prefixes
        #[arg(short, long)]
        recursive: bool,

        /// Only copy paths matching this glob
        #[arg(long)]
        include: Option<String>,

        /// Skip paths matching this glob
        #[arg(long)]
        exclude: Option<String>,

        /// Content type for uploads; guessed from the file name otherwise
        #[arg(long)]
        content_type: Option<String>,

        /// Disable progress bars
        #[arg(long)]
        no_progress: bool,

        /// Show what would be copied
        #[arg(long)]
        dryrun: bool,
    },

    /// Remove objects or incomplete uploads
    Rm {
        /// s3://bucket/key or s3://bucket/prefix/
        path: String,

        /// Remove every object below the prefix
        #[arg(short, long)]
        recursive: bool,

        /// Abort incomplete multipart uploads instead
        #[arg(short = 'I', long)]
        incomplete: bool,

        /// Do not ask for confirmation
        #[arg(short, long)]
        force: bool,

        #[arg(long)]
        include: Option<String>,

        #[arg(long)]
        exclude: Option<String>,

        #[arg(long)]
        dryrun: bool,
    },

    /// Show object metadata
    Stat {
        /// s3://bucket/key
        path: String,
    },

    /// Stream an object to stdout
    Cat {
        /// s3://bucket/key
        path: String,
    },

    /// Generate a pre-signed URL
    Presign {
        /// s3://bucket/key
        path: String,

        /// Validity in seconds
        #[arg(short, long, default_value = "604800")]
        expires: u64,

        #[arg(short, long, value_enum, default_value = "get")]
        method: PresignMethod,

        /// Content type the download response should carry
        #[arg(long)]
        response_content_type: Option<String>,
    },

    /// Manage bucket policies
    Policy {
        #[command(subcommand)]
        action: PolicyAction,
    },

    /// Print bucket notification events as they happen
    Watch {
        /// s3://bucket or s3://bucket/prefix
        path: String,

        /// Only keys ending with this suffix
        #[arg(long, default_value = "")]
        suffix: String,

        /// Event names; all object events when omitted
        #[arg(short, long)]
        events: Vec<String>,
    },

    /// Manage configuration profiles
    Configure {
        #[command(subcommand)]
        action: Option<ConfigureAction>,
    },
}

#[derive(Subcommand)]
pub enum PolicyAction {
    /// Print the bucket policy
    Get { bucket: String },
    /// Replace the bucket policy with a JSON document (`-` reads stdin)
    Set { bucket: String, file: String },
    /// Delete the bucket policy
    Remove { bucket: String },
}

#[derive(Subcommand)]
pub enum ConfigureAction {
    /// Set a configuration value
    Set { key: String, value: String },
    /// Get a configuration value
    Get { key: String },
    /// List configuration values and profiles
    List,
    /// Create an empty profile
    AddProfile { name: String },
    /// Delete a profile
    RemoveProfile { name: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();

    let ctx = CommandContext {
        config: Config::load(cli.profile.as_deref())?,
        profile: cli.profile.clone(),
        output_format: if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        },
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Ls {
            path,
            recursive,
            long,
            human_readable,
            summarize,
            incomplete,
        } => {
            let opts = commands::ls::LsOptions {
                recursive,
                long,
                human_readable,
                summarize,
                incomplete,
            };
            commands::ls::execute(&ctx, &path, opts).await
        }
        Commands::Mb { bucket, region } => commands::mb::execute(&ctx, &bucket, region).await,
        Commands::Rb { bucket, force } => commands::rb::execute(&ctx, &bucket, force).await,
        Commands::Cp {
            source,
            destination,
            recursive,
            include,
            exclude,
            content_type,
            no_progress,
            dryrun,
        } => {
            let opts = commands::cp::CpOptions {
                recursive,
                include,
                exclude,
                content_type,
                show_progress: !no_progress && !cli.quiet && !cli.json,
                dryrun,
            };
            commands::cp::execute(&ctx, &source, &destination, opts).await
        }
        Commands::Rm {
            path,
            recursive,
            incomplete,
            force,
            include,
            exclude,
            dryrun,
        } => {
            let opts = commands::rm::RmOptions {
                recursive,
                incomplete,
                force,
                include,
                exclude,
                dryrun,
            };
            commands::rm::execute(&ctx, &path, opts).await
        }
        Commands::Stat { path } => commands::stat::execute(&ctx, &path).await,
        Commands::Cat { path } => commands::cat::execute(&ctx, &path).await,
        Commands::Presign {
            path,
            expires,
            method,
            response_content_type,
        } => {
            commands::presign::execute(&ctx, &path, expires, method, response_content_type).await
        }
        Commands::Policy { action } => commands::policy::execute(&ctx, action).await,
        Commands::Watch {
            path,
            suffix,
            events,
        } => commands::watch::execute(&ctx, &path, &suffix, &events).await,
        Commands::Configure { action } => commands::configure::execute(&ctx, action).await,
    }
}
