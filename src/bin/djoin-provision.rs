// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Domain-Join Provisioning Command-Line Tool
//!
//! A CLI for unattended machine-account provisioning against an Active
//! Directory domain, producing the offline-join blob consumed by a later
//! `djoin.exe /requestODJ`-style import.
//!
//! # Usage
//!
//! ```text
//! djoin-provision [OPTIONS] <COMMAND>
//!
//! Commands:
//!   provision  Provision a machine account in the target domain
//!   identity   Display the local machine identity
//!   config     Configuration management
//!
//! Options:
//!   -c, --config <PATH>   Path to configuration file
//!   -v, --verbose         Enable verbose output
//!   -q, --quiet           Suppress non-error output
//!   --dry-run             Show what would happen without making changes
//!   -h, --help            Print help
//!   -V, --version         Print version
//! ```
//!
//! # Examples
//!
//! ```bash
//! # Provision using the deployed configuration file
//! djoin-provision provision
//!
//! # Provision a specific machine, writing the blob to a file
//! djoin-provision provision -d contoso.com -m NODE01 \
//!     -u 'CONTOSO\svc-join' --password-source env:DJOIN_PASSWORD \
//!     --output blob.txt
//!
//! # Show what a provisioning run would do
//! djoin-provision provision --dry-run
//!
//! # Validate the configuration file
//! djoin-provision config validate --config /path/to/config.toml
//!
//! # Generate a starter configuration file
//! djoin-provision config init --output djoin-config.toml
//! ```
//!
//! Progress and diagnostics go to stderr; stdout carries only the
//! provisioning blob (or the JSON envelope), so output can be piped.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use usg_djoin_client::windows::eventlog::{EventData, EventId, EventLog};
use usg_djoin_client::{
    ConfigLoader, CredentialConfig, CredentialSource, JoinConfig, JoinOrchestrator,
    MachineIdentity, OutputFormat, ProvisioningRequest, ProvisioningResult, RequestShape,
    ShapeConfig, StructuredConfig,
};

/// Domain-Join Provisioning Command-Line Tool
#[derive(Parser)]
#[command(name = "djoin-provision")]
#[command(author = "U.S. Federal Government")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Unattended machine-account provisioning for domain join", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Show what would happen without making changes
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision a machine account in the target domain
    Provision(ProvisionArgs),

    /// Display the local machine identity
    Identity,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args)]
struct ProvisionArgs {
    /// Join account, as DOMAIN\account (overrides config)
    #[arg(short, long, value_name = "ACCOUNT")]
    username: Option<String>,

    /// Password source: env:VAR, file:PATH, or a raw value
    #[arg(long, value_name = "SOURCE")]
    password_source: Option<String>,

    /// DNS name of the domain to join (overrides config)
    #[arg(short, long, value_name = "DOMAIN")]
    domain: Option<String>,

    /// Machine name to provision (default: local computer name)
    #[arg(short, long, value_name = "NAME")]
    machine: Option<String>,

    /// OU distinguished name for the machine account
    #[arg(long, value_name = "DN")]
    ou: Option<String>,

    /// Specific domain controller to provision against
    #[arg(long, value_name = "HOST")]
    dc: Option<String>,

    /// Reuse an existing machine account (the default; overrides config)
    #[arg(long, conflicts_with = "no_reuse")]
    reuse: bool,

    /// Fail instead of reusing an existing machine account
    #[arg(long)]
    no_reuse: bool,

    /// Additional provisioning option bits, merged into the bitmask
    #[arg(long, value_name = "BITS")]
    option_flags: Option<u32>,

    /// Wire shape for the provisioning call (simple, structured)
    #[arg(long, value_enum)]
    shape: Option<ShapeArg>,

    /// Alternate NetBIOS name (structured shape)
    #[arg(long, value_name = "NAME")]
    netbios_name: Option<String>,

    /// Directory site name (structured shape)
    #[arg(long, value_name = "SITE")]
    site_name: Option<String>,

    /// Primary DNS domain to register under (structured shape)
    #[arg(long, value_name = "DOMAIN")]
    primary_dns_domain: Option<String>,

    /// Certificate template to include (structured shape, repeatable)
    #[arg(long = "cert-template", value_name = "NAME")]
    cert_templates: Vec<String>,

    /// Machine policy name to include (structured shape, repeatable)
    #[arg(long = "policy-name", value_name = "NAME")]
    policy_names: Vec<String>,

    /// Machine policy registry file to include (structured shape, repeatable)
    #[arg(long = "policy-path", value_name = "PATH")]
    policy_paths: Vec<String>,

    /// Write the provisioning blob to this file instead of stdout
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Output format (text, json)
    #[arg(long, value_enum)]
    format: Option<FormatArg>,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate configuration file
    Validate,

    /// Display effective configuration
    Show {
        /// Show expanded variables
        #[arg(long)]
        expanded: bool,

        /// Output format (text, json, toml)
        #[arg(long, default_value = "toml")]
        format: ConfigFormat,
    },

    /// Generate default configuration file
    Init {
        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum ShapeArg {
    #[default]
    Simple,
    Structured,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum FormatArg {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum ConfigFormat {
    Text,
    Json,
    #[default]
    Toml,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.quiet {
        tracing::Level::ERROR
    } else if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    // Diagnostics go to stderr; stdout is reserved for the blob.
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_command(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match &cli.command {
        Commands::Provision(args) => cmd_provision(&cli, args),
        Commands::Identity => cmd_identity(),
        Commands::Config { action } => cmd_config(&cli, action),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

fn cmd_provision(cli: &Cli, args: &ProvisionArgs) -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration, or start from an empty one when running purely
    // from command-line arguments.
    let mut loader = ConfigLoader::new().with_validate(false);
    if let Some(ref path) = cli.config {
        loader = loader.with_path(path);
    }

    let from_file = cli.config.is_some() || loader.config_exists();
    let mut config = if from_file {
        loader.load()?
    } else {
        JoinConfig::default()
    };

    apply_overrides(&mut config, args);

    // Default the machine name to the local computer name.
    if config.join.machine.is_none() {
        let identity = MachineIdentity::current()?;
        tracing::debug!(
            computer_name = %identity.computer_name,
            "No machine name specified; using the local computer name"
        );
        config.join.machine = Some(identity.computer_name);
    }

    config.validate()?;
    let request = config.to_request()?;

    if cli.dry_run {
        println!("DRY RUN: Would provision a machine account");
        println!("  Domain: {}", request.domain);
        println!("  Machine: {}", request.machine_name);
        if let Some(ref ou) = request.machine_account_ou {
            println!("  OU: {}", ou);
        }
        if let Some(ref dc) = request.dc_name {
            println!("  DC: {}", dc);
        }
        println!("  Options: 0x{:08X}", request.options.flags());
        match request.shape {
            RequestShape::Simple => println!("  Shape: simple"),
            RequestShape::Structured(_) => println!("  Shape: structured"),
        }
        if let Some(ref cred) = config.credential {
            println!("  Username: {}", cred.username);
        }
        return Ok(());
    }

    let credential_config = config.credential.as_ref().ok_or(
        "No join credential configured. \
         Use --username/--password-source or add [credential] to the config file.",
    )?;
    let credential = credential_config.resolve()?;

    let orchestrator = match EventLog::open() {
        Ok(log) => {
            if from_file {
                let _ = log.log_info(
                    EventId::CONFIG_LOADED,
                    "Configuration loaded",
                    Some(&EventData::with_target(&request.domain, &request.machine_name)),
                );
            }
            JoinOrchestrator::with_platform_defaults().with_event_log(log)
        }
        Err(e) => {
            tracing::warn!("Event log unavailable: {e}");
            JoinOrchestrator::with_platform_defaults()
        }
    };

    let result = orchestrator.join_domain(&credential, &request)?;

    write_output(&config, &request, &result, args.format)?;
    Ok(())
}

/// Apply command-line overrides on top of the loaded configuration.
fn apply_overrides(config: &mut JoinConfig, args: &ProvisionArgs) {
    if let Some(ref username) = args.username {
        match config.credential {
            Some(ref mut cred) => cred.username = username.clone(),
            None => {
                config.credential = Some(CredentialConfig {
                    username: username.clone(),
                    // DJOIN_PASSWORD is the conventional deployment variable.
                    password_source: "env:DJOIN_PASSWORD".to_string(),
                });
            }
        }
    }
    if let Some(ref source) = args.password_source {
        match config.credential {
            Some(ref mut cred) => cred.password_source = source.clone(),
            None => {
                config.credential = Some(CredentialConfig {
                    username: String::new(),
                    password_source: source.clone(),
                });
            }
        }
    }

    if let Some(ref domain) = args.domain {
        config.join.domain = domain.clone();
    }
    if let Some(ref machine) = args.machine {
        config.join.machine = Some(machine.clone());
    }
    if let Some(ref ou) = args.ou {
        config.join.ou = Some(ou.clone());
    }
    if let Some(ref dc) = args.dc {
        config.join.dc = Some(dc.clone());
    }
    if args.reuse {
        config.join.reuse_existing_account = true;
    }
    if args.no_reuse {
        config.join.reuse_existing_account = false;
    }
    if let Some(flags) = args.option_flags {
        config.join.extra_option_flags = flags;
    }
    if let Some(shape) = args.shape {
        config.join.shape = match shape {
            ShapeArg::Simple => ShapeConfig::Simple,
            ShapeArg::Structured => ShapeConfig::Structured,
        };
    }

    let has_structured_args = args.netbios_name.is_some()
        || args.site_name.is_some()
        || args.primary_dns_domain.is_some()
        || !args.cert_templates.is_empty()
        || !args.policy_names.is_empty()
        || !args.policy_paths.is_empty();
    if has_structured_args {
        let structured = config.join.structured.get_or_insert_with(StructuredConfig::default);
        if let Some(ref netbios) = args.netbios_name {
            structured.netbios_name = Some(netbios.clone());
        }
        if let Some(ref site) = args.site_name {
            structured.site_name = Some(site.clone());
        }
        if let Some(ref dns) = args.primary_dns_domain {
            structured.primary_dns_domain = Some(dns.clone());
        }
        if !args.cert_templates.is_empty() {
            structured.cert_templates = args.cert_templates.clone();
        }
        if !args.policy_names.is_empty() {
            structured.machine_policy_names = args.policy_names.clone();
        }
        if !args.policy_paths.is_empty() {
            structured.machine_policy_paths = args.policy_paths.clone();
        }
        // Structured arguments imply the structured shape.
        if args.shape.is_none() {
            config.join.shape = ShapeConfig::Structured;
        }
    }

    if let Some(ref output) = args.output {
        config.output.path = Some(output.clone());
    }
    if let Some(format) = args.format {
        config.output.format = match format {
            FormatArg::Text => OutputFormat::Text,
            FormatArg::Json => OutputFormat::Json,
        };
    }
}

/// Deliver the provisioning result per the output configuration.
fn write_output(
    config: &JoinConfig,
    request: &ProvisioningRequest,
    result: &ProvisioningResult,
    format_override: Option<FormatArg>,
) -> Result<(), Box<dyn std::error::Error>> {
    let format = match format_override {
        Some(FormatArg::Text) => OutputFormat::Text,
        Some(FormatArg::Json) => OutputFormat::Json,
        None => config.output.format,
    };

    if let Some(ref path) = config.output.path {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &result.blob)?;
        tracing::info!("Provisioning blob written to {}", path.display());
    }

    match format {
        OutputFormat::Text => {
            if config.output.path.is_none() {
                // The blob alone, so output can be piped to a transport step.
                println!("{}", result.blob);
            } else {
                println!(
                    "Machine account for {} provisioned in {}.",
                    request.machine_name, request.domain
                );
            }
        }
        OutputFormat::Json => {
            let envelope = serde_json::json!({
                "status": result.status,
                "domain": request.domain,
                "machine": request.machine_name,
                "blob": result.blob,
            });
            println!("{}", serde_json::to_string_pretty(&envelope)?);
        }
    }
    Ok(())
}

fn cmd_identity() -> Result<(), Box<dyn std::error::Error>> {
    let identity = MachineIdentity::current()?;

    println!("Computer name: {}", identity.computer_name);
    println!("DNS hostname:  {}", identity.dns_hostname);
    println!(
        "FQDN:          {}",
        identity.fqdn.as_deref().unwrap_or("(none)")
    );
    println!(
        "Domain:        {}",
        identity.domain.as_deref().unwrap_or("(workgroup)")
    );
    println!("Domain joined: {}", identity.is_domain_joined());
    Ok(())
}

fn cmd_config(cli: &Cli, action: &ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Validate => {
            let mut loader = ConfigLoader::new().with_validate(false);
            if let Some(ref path) = cli.config {
                loader = loader.with_path(path);
            }

            println!("Validating configuration...");

            match loader.load() {
                Ok(config) => match config.validate() {
                    Ok(()) => {
                        println!("Configuration is valid.");
                        println!();
                        println!("Summary:");
                        println!("  Domain: {}", config.join.domain);
                        println!(
                            "  Machine: {}",
                            config
                                .join
                                .machine
                                .as_deref()
                                .unwrap_or("(local computer name)")
                        );
                        println!(
                            "  Reuse existing account: {}",
                            config.join.reuse_existing_account
                        );
                        println!("  Shape: {:?}", config.join.shape);
                        if let Some(ref cred) = config.credential {
                            println!("  Username: {}", cred.username);
                        }
                    }
                    Err(e) => {
                        println!("Configuration validation failed:");
                        println!("  {}", e);
                        return Err("Validation failed".into());
                    }
                },
                Err(e) => {
                    println!("Failed to load configuration:");
                    println!("  {}", e);
                    return Err("Failed to load configuration".into());
                }
            }
        }
        ConfigAction::Show { expanded, format } => {
            let mut loader = ConfigLoader::new()
                .with_validate(false)
                .with_expand_variables(false);
            if let Some(ref path) = cli.config {
                loader = loader.with_path(path);
            }

            match loader.load() {
                Ok(mut config) => {
                    if *expanded {
                        config.expand_variables()?;
                    }

                    // A direct password value must never reach the terminal.
                    if let Some(ref mut cred) = config.credential
                        && !CredentialSource::parse(&cred.password_source).is_secure()
                    {
                        cred.password_source = "(redacted direct value)".to_string();
                    }

                    match *format {
                        ConfigFormat::Toml => {
                            let toml_str = config.to_toml()?;
                            println!("{}", toml_str);
                        }
                        ConfigFormat::Json => {
                            let json_str = serde_json::to_string_pretty(&config)?;
                            println!("{}", json_str);
                        }
                        ConfigFormat::Text => {
                            println!("Join:");
                            println!("  Domain: {}", config.join.domain);
                            println!("  Machine: {:?}", config.join.machine);
                            println!("  OU: {:?}", config.join.ou);
                            println!("  DC: {:?}", config.join.dc);
                            println!(
                                "  Reuse existing account: {}",
                                config.join.reuse_existing_account
                            );
                            println!("  Shape: {:?}", config.join.shape);
                            if let Some(ref structured) = config.join.structured {
                                println!("  Site: {:?}", structured.site_name);
                                println!("  NetBIOS name: {:?}", structured.netbios_name);
                                println!(
                                    "  Primary DNS domain: {:?}",
                                    structured.primary_dns_domain
                                );
                            }
                            println!();
                            if let Some(ref cred) = config.credential {
                                println!("Credential:");
                                println!("  Username: {}", cred.username);
                                println!("  Password source: {}", cred.password_source);
                                println!();
                            }
                            println!("Output:");
                            println!("  Path: {:?}", config.output.path);
                            println!("  Format: {:?}", config.output.format);
                        }
                    }
                }
                Err(e) => {
                    println!("Failed to load configuration: {}", e);
                    return Err("Failed to load configuration".into());
                }
            }
        }
        ConfigAction::Init { output, force } => {
            let output_path = output
                .clone()
                .unwrap_or_else(|| PathBuf::from("djoin-config.toml"));

            if output_path.exists() && !*force {
                return Err(format!(
                    "File already exists: {}. Use --force to overwrite.",
                    output_path.display()
                )
                .into());
            }

            if cli.dry_run {
                println!("DRY RUN: Would create configuration file");
                println!("  Path: {}", output_path.display());
                return Ok(());
            }

            usg_djoin_client::loader::write_default_config(&output_path)?;
            println!(
                "Created default configuration file: {}",
                output_path.display()
            );
            println!();
            println!("Edit the file to customize settings, then run:");
            println!(
                "  djoin-provision config validate --config {}",
                output_path.display()
            );
        }
    }
    Ok(())
}
