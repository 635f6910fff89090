//! CPF client CLI
//!
//! Entry point for the `cpf` command-line tool.

use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand};
use cpf_client::config::{default_config_path, env_overrides, ConfigError};
use cpf_client::{CpfClient, CpfError, EffectiveConfig, Parameters, ResultType, SubmissionMode};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cpf")]
#[command(about = "Submit and monitor CPF batch jobs", version)]
struct Cli {
    /// Path to config file (default: ~/.config/cpf/client.toml)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Server URL (overrides config and CPF_URL)
    #[arg(long, global = true)]
    url: Option<String>,

    /// User name (overrides config and CPF_USERNAME)
    #[arg(long, short = 'u', global = true)]
    username: Option<String>,

    /// Password (overrides config and CPF_PASSWORD)
    #[arg(long, global = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List business application names
    Apps {
        #[arg(long)]
        json: bool,
    },

    /// Show a business application specification
    Spec {
        app: String,

        /// Submission mode (single, multiple, instant)
        #[arg(long, default_value = "instant")]
        mode: SubmissionMode,
    },

    /// List jobs
    Jobs {
        /// Only jobs of this application
        #[arg(long)]
        app: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Submit a single-request job
    SubmitSingle {
        app: String,

        /// Job parameter as name=value (repeatable)
        #[arg(long = "param", short = 'p', value_parser = parse_param)]
        params: Vec<(String, String)>,

        /// Result content type (default from config)
        #[arg(long)]
        result_content_type: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Submit a multiple-request job from a file or URL
    SubmitMultiple {
        app: String,

        /// Local file path, http(s) URL or file:// URL
        input: String,

        /// Input data content type (default from config)
        #[arg(long)]
        input_content_type: Option<String>,

        /// Number of requests in the input data
        #[arg(long)]
        num_requests: Option<u64>,

        /// Job parameter as name=value (repeatable)
        #[arg(long = "param", short = 'p', value_parser = parse_param)]
        params: Vec<(String, String)>,

        /// Result content type (default from config)
        #[arg(long)]
        result_content_type: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Show a job's status document
    Status { job_url: String },

    /// Wait for a job to complete
    Wait {
        job_url: String,

        /// Maximum wait in seconds (default from config)
        #[arg(long)]
        max_wait: Option<u64>,
    },

    /// List a job's results
    Results {
        job_url: String,

        /// Only results of this type (structured, opaque, error)
        #[arg(long, short = 't')]
        result_type: Option<ResultType>,

        /// List results before the job completes
        #[arg(long)]
        intermediate: bool,

        /// Maximum wait in seconds (default from config)
        #[arg(long)]
        max_wait: Option<u64>,

        #[arg(long)]
        json: bool,
    },

    /// Download a job's first result of a type
    Fetch {
        job_url: String,

        /// Result type (structured, opaque, error)
        #[arg(long, short = 't', default_value = "structured")]
        result_type: ResultType,

        /// Write to this file instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        #[arg(long)]
        intermediate: bool,

        /// Maximum wait in seconds (default from config)
        #[arg(long)]
        max_wait: Option<u64>,
    },

    /// Cancel a job
    Cancel { job_url: String },

    /// Delete a job
    Delete { job_url: String },

    /// Show the effective configuration (secrets redacted)
    Config,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let effective = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => fail(&CpfError::from(e)),
    };

    let result = match cli.command {
        Commands::Config => run_config(&effective),
        command => run_command(&effective, command),
    };

    if let Err(e) = result {
        fail(&e);
    }
}

fn fail(error: &CpfError) -> ! {
    eprintln!("Error: {}", error);
    process::exit(error.exit_code());
}

fn load_config(cli: &Cli) -> Result<EffectiveConfig, ConfigError> {
    if let Some(ref path) = cli.config {
        if !path.exists() {
            return Err(ConfigError::IoError(format!(
                "config file not found: {}",
                path.display()
            )));
        }
    }
    let config_path = cli.config.clone().or_else(default_config_path);

    let mut overrides = serde_json::Map::new();
    if let Some(ref url) = cli.url {
        overrides.insert("url".to_string(), json!(url));
    }
    if let Some(ref username) = cli.username {
        overrides.insert("username".to_string(), json!(username));
    }
    if let Some(ref password) = cli.password {
        overrides.insert("password".to_string(), json!(password));
    }
    let cli_overrides = (!overrides.is_empty()).then_some(Value::Object(overrides));

    EffectiveConfig::build(
        config_path.as_deref(),
        env_overrides(|var| std::env::var(var).ok()),
        cli_overrides,
    )
}

fn run_config(effective: &EffectiveConfig) -> Result<(), CpfError> {
    println!("{}", effective.to_json()?);
    Ok(())
}

fn run_command(effective: &EffectiveConfig, command: Commands) -> Result<(), CpfError> {
    let config = effective.client_config()?;
    let client = CpfClient::from_config(&config)?;
    let wait = |seconds: Option<u64>| Some(seconds.map(Duration::from_secs).unwrap_or(config.max_wait()));

    match command {
        Commands::Apps { json } => {
            let names = client.app_names()?;
            if json {
                print_json(&json!(names))?;
            } else {
                for name in names {
                    println!("{}", name);
                }
            }
        }
        Commands::Spec { app, mode } => {
            let spec = match mode {
                SubmissionMode::Single => client.app_spec_single(&app)?,
                SubmissionMode::Multiple => client.app_spec_multiple(&app)?,
                SubmissionMode::Instant => client.app_spec_instant(&app)?,
            };
            print_json(&Value::Object(spec))?;
        }
        Commands::Jobs { app, json } => {
            let jobs = client.jobs(app.as_deref())?;
            if json {
                let urls: Vec<&str> = jobs.iter().map(|job| job.url()).collect();
                print_json(&json!(urls))?;
            } else {
                for job in &jobs {
                    println!("{}\t{}", job.id(), job.url());
                }
            }
        }
        Commands::SubmitSingle {
            app,
            params,
            result_content_type,
            json,
        } => {
            let result_content_type = result_content_type.unwrap_or_else(|| config.result_content_type.clone());
            let job = client.create_job_single(&app, &parameters(params), &result_content_type)?;
            print_job(job.url(), &job.id(), json)?;
        }
        Commands::SubmitMultiple {
            app,
            input,
            input_content_type,
            num_requests,
            params,
            result_content_type,
            json,
        } => {
            let input_content_type = input_content_type.unwrap_or_else(|| config.input_data_content_type.clone());
            let result_content_type = result_content_type.unwrap_or_else(|| config.result_content_type.clone());
            let job = client.create_job_multiple(
                &app,
                &input,
                &input_content_type,
                &parameters(params),
                num_requests,
                &result_content_type,
            )?;
            print_job(job.url(), &job.id(), json)?;
        }
        Commands::Status { job_url } => {
            let status = client.job(job_url).status()?;
            print_json(&Value::Object(status.into_object()))?;
        }
        Commands::Wait { job_url, max_wait } => {
            let mut job = client.job(job_url);
            if job.is_completed(wait(max_wait))? {
                println!("{}", job.status_summary().map(|s| s.to_string()).unwrap_or_default());
            } else {
                return Err(CpfError::NotReady {
                    job_url: job.url().to_string(),
                });
            }
        }
        Commands::Results {
            job_url,
            result_type,
            intermediate,
            max_wait,
            json,
        } => {
            let mut job = client.job(job_url);
            let results = job.results(wait(max_wait), intermediate, result_type)?;
            if json {
                let infos: Vec<Value> = results
                    .iter()
                    .map(|result| Value::Object(result.info().as_object().clone()))
                    .collect();
                print_json(&Value::Array(infos))?;
            } else {
                for result in &results {
                    println!(
                        "{}\t{}\t{}",
                        result.result_type().unwrap_or("-"),
                        result.content_type().unwrap_or("-"),
                        result.url()
                    );
                }
            }
        }
        Commands::Fetch {
            job_url,
            result_type,
            output,
            intermediate,
            max_wait,
        } => {
            let mut job = client.job(job_url);
            let result = job
                .results(wait(max_wait), intermediate, Some(result_type))?
                .into_iter()
                .next();
            let Some(result) = result else {
                eprintln!("No {} result for {}", result_type, job);
                process::exit(1);
            };
            let response = result.response()?;
            match output {
                Some(path) => std::fs::write(path, &response.body)?,
                None => std::io::stdout().write_all(&response.body)?,
            }
        }
        Commands::Cancel { job_url } => {
            client.job(job_url).cancel()?;
        }
        Commands::Delete { job_url } => {
            client.job(job_url).delete()?;
        }
        Commands::Config => run_config(effective)?,
    }

    Ok(())
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .filter(|(name, _)| !name.is_empty())
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected name=value, got '{}'", raw))
}

fn parameters(params: Vec<(String, String)>) -> Parameters {
    params
        .into_iter()
        .map(|(name, value)| (name, Value::String(value)))
        .collect()
}

fn print_job(url: &str, id: &str, json_output: bool) -> Result<(), CpfError> {
    if json_output {
        print_json(&json!({"id": id, "url": url}))
    } else {
        println!("{}", url);
        Ok(())
    }
}

fn print_json(value: &Value) -> Result<(), CpfError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
