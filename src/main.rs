//! certforge – command-line front end for the certificate service.
//!
//! Usage:
//!   certforge init-template [path] [--force]
//!   certforge render --name "Jane Doe" --domain "Data Science" \
//!       --start-date "Jan 1, 2024" --end-date "Mar 31, 2024" --gender female \
//!       [--output jane.pdf]
//!   certforge health
//!
//! Results are printed to stdout as JSON; failures go to stderr as a JSON
//! `{"kind", "message"}` object with exit status 1.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use serde::Serialize;

use cert_forge::config::ServiceConfig;
use cert_forge::error::RenderError;
use cert_forge::pipeline::CertificateService;
use cert_forge::record::{CertificateRequest, Gender};
use cert_forge::templates::certificate_template;

#[derive(Parser, Debug)]
#[command(name = "certforge", version, about = "Render internship completion certificates")]
struct Cli {
    #[arg(long, global = true, env = "CERTFORGE_CONFIG", help = "JSON configuration file")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render one certificate.
    Render {
        #[arg(long)]
        name: String,
        #[arg(long)]
        domain: String,
        #[arg(long)]
        start_date: String,
        #[arg(long)]
        end_date: String,
        #[arg(long, help = "male, female or anything else for they/them")]
        gender: Option<String>,
        #[arg(long, help = "Copy the finished PDF here and remove the working copy")]
        output: Option<PathBuf>,
    },
    /// Report template presence and backend availability.
    Health,
    /// Write the built-in certificate template.
    InitTemplate {
        path: Option<PathBuf>,
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

#[derive(Serialize)]
struct TemplateWritten<'a> {
    template: &'a Path,
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        match serde_json::to_string(&e.report()) {
            Ok(json) => eprintln!("{json}"),
            Err(_) => eprintln!("Error: {e}"),
        }
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), RenderError> {
    let config = ServiceConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Render {
            name,
            domain,
            start_date,
            end_date,
            gender,
            output,
        } => {
            let gender = gender
                .as_deref()
                .map(Gender::parse_lossy)
                .unwrap_or(Gender::Unspecified);
            let request = CertificateRequest::new(name, domain, start_date, end_date, gender);
            request.validate()?;

            let service = CertificateService::from_config(&config)?;
            let mut artifact = service.render(&request).await?;
            if let Some(dest) = output {
                deliver(&artifact.path, &dest).await?;
                let working = std::mem::replace(&mut artifact.path, dest);
                cert_forge::lifecycle::release(&working);
            }
            print_json(&artifact)
        }
        Commands::Health => {
            let service = CertificateService::from_config(&config)?;
            print_json(&service.health().await)
        }
        Commands::InitTemplate { path, force } => {
            let path = path.unwrap_or_else(|| config.template_path.clone());
            if !force && tokio::fs::metadata(&path).await.is_ok() {
                return Err(RenderError::Config(format!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                )));
            }
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await.map_err(|e| RenderError::Io {
                    context: format!("creating {}", parent.display()),
                    source: e,
                })?;
            }
            tokio::fs::write(&path, certificate_template())
                .await
                .map_err(|e| RenderError::Io {
                    context: format!("writing {}", path.display()),
                    source: e,
                })?;
            print_json(&TemplateWritten { template: &path })
        }
    }
}

async fn deliver(from: &Path, to: &Path) -> Result<(), RenderError> {
    if let Some(parent) = to.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(|e| RenderError::Io {
            context: format!("creating {}", parent.display()),
            source: e,
        })?;
    }
    tokio::fs::copy(from, to).await.map_err(|e| RenderError::Io {
        context: format!("copying {} to {}", from.display(), to.display()),
        source: e,
    })?;
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), RenderError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| RenderError::Config(format!("serializing output: {e}")))?;
    println!("{json}");
    Ok(())
}
