// src/main.rs
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use magicpod::config::{ClientConfig, ConnectionOptions, FileConfig};
use magicpod::errors::{ClientError, Result};
use magicpod::models::{BatchRunQuery, DownloadType, FileIndexType, FileNameBodyType, ScreenshotOptions};
use magicpod::runner::{self, BatchRunOutcome, WaitOptions};
use magicpod::screenshots::{self, WaitLimit};
use magicpod::settings::resolve_settings;
use magicpod::transport::{HttpTransport, MagicPodApi};

/// Simple and useful wrapper for MagicPod Web API
#[derive(Parser)]
#[command(name = "magicpod-api-client")]
#[command(version, about, long_about = None)]
struct Cli {
    #[arg(long = "url-base", global = true, hide = true)]
    url_base: Option<String>,

    /// TOML profile with default connection settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConnectionArgs {
    /// API token. You can get the value from https://magic-pod.com/accounts/api-token/
    #[arg(short = 't', long, env = "MAGICPOD_API_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Organization name. (Not "organization display name", be careful!)
    #[arg(short = 'o', long, env = "MAGICPOD_ORGANIZATION")]
    organization: Option<String>,

    /// Project name. (Not "project display name", be careful!)
    #[arg(short = 'p', long, env = "MAGICPOD_PROJECT")]
    project: Option<String>,

    /// Additional HTTP headers in JSON string format
    #[arg(short = 'H', long = "http_headers")]
    http_headers: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run batch test
    BatchRun {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// Test settings number defined in the project batch run page
        #[arg(short = 'S', long = "test_settings_number", default_value_t = 0)]
        test_settings_number: u64,

        /// Test setting in JSON format
        #[arg(short = 's', long)]
        setting: Option<String>,

        /// Return immediately without waiting the batch run to be finished
        #[arg(short = 'n', long = "no_wait")]
        no_wait: bool,

        /// Wait limit in seconds. If 0 is specified, the value is test count x 10 minutes
        #[arg(short = 'w', long = "wait_limit", default_value_t = 0)]
        wait_limit: u64,
    },

    /// Wait for an already started batch run to finish
    WaitBatchRun {
        #[command(flatten)]
        connection: ConnectionArgs,

        #[arg(short = 'b', long = "batch_run_number", default_value_t = 0)]
        batch_run_number: u64,

        /// Wait limit in seconds. If 0 is specified, the value is test count x 10 minutes
        #[arg(short = 'w', long = "wait_limit", default_value_t = 0)]
        wait_limit: u64,
    },

    /// Print a batch run as JSON
    GetBatchRun {
        #[command(flatten)]
        connection: ConnectionArgs,

        #[arg(short = 'b', long = "batch_run_number", default_value_t = 0)]
        batch_run_number: u64,
    },

    /// List recent batch runs
    ListBatchRuns {
        #[command(flatten)]
        connection: ConnectionArgs,

        #[arg(short = 'c', long)]
        count: Option<u32>,

        #[arg(long = "max_batch_run_number")]
        max_batch_run_number: Option<u64>,

        #[arg(long = "min_batch_run_number")]
        min_batch_run_number: Option<u64>,
    },

    /// Get the latest batch run number
    LatestBatchRunNo {
        #[command(flatten)]
        connection: ConnectionArgs,
    },

    /// Upload app/ipa/apk file
    UploadApp {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// Path to the app/ipa/apk file to upload
        #[arg(short = 'a', long = "app_path")]
        app_path: Option<PathBuf>,
    },

    /// Delete uploaded app/ipa/apk file
    DeleteApp {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// File number of the uploaded file
        #[arg(short = 'a', long = "app_file_number", default_value_t = 0)]
        app_file_number: u64,
    },

    /// Download screenshots for a batch run
    GetScreenshots {
        #[command(flatten)]
        connection: ConnectionArgs,

        #[arg(short = 'b', long = "batch_run_number", default_value_t = 0)]
        batch_run_number: u64,

        /// Download destination file path. Defaults to ./screenshots.zip
        #[arg(short = 'd', long = "download_path")]
        download_path: Option<PathBuf>,

        #[arg(short = 'i', long = "file_index_type", value_enum)]
        file_index_type: Option<FileIndexArg>,

        #[arg(short = 'B', long = "file_name_body_type", value_enum)]
        file_name_body_type: Option<FileNameBodyArg>,

        /// 'command_only' keeps screenshots of 'Take screenshot' commands only
        #[arg(short = 'D', long = "download_type", value_enum)]
        download_type: Option<DownloadTypeArg>,

        /// Mask dynamically changed areas which can cause unexpected image difference between each test
        #[arg(short = 'm', long = "mask_dynamically_changed_area")]
        mask_dynamically_changed_area: bool,

        /// Wait limit in seconds. The default value is 300
        #[arg(short = 'w', long = "wait_limit", default_value_t = 0)]
        wait_limit: i64,

        /// Not output any logs during download
        #[arg(short = 'q', long)]
        quiet: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FileIndexArg {
    #[value(name = "line_number")]
    LineNumber,
    #[value(name = "auto_increment")]
    AutoIncrement,
}

impl From<FileIndexArg> for FileIndexType {
    fn from(value: FileIndexArg) -> Self {
        match value {
            FileIndexArg::LineNumber => FileIndexType::LineNumber,
            FileIndexArg::AutoIncrement => FileIndexType::AutoIncrement,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FileNameBodyArg {
    #[value(name = "none")]
    None,
    #[value(name = "screenshot_name")]
    ScreenshotName,
}

impl From<FileNameBodyArg> for FileNameBodyType {
    fn from(value: FileNameBodyArg) -> Self {
        match value {
            FileNameBodyArg::None => FileNameBodyType::None,
            FileNameBodyArg::ScreenshotName => FileNameBodyType::ScreenshotName,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DownloadTypeArg {
    #[value(name = "all")]
    All,
    #[value(name = "command_only")]
    CommandOnly,
}

impl From<DownloadTypeArg> for DownloadType {
    fn from(value: DownloadTypeArg) -> Self {
        match value {
            DownloadTypeArg::All => DownloadType::All,
            DownloadTypeArg::CommandOnly => DownloadType::CommandOnly,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env is fine; flags and the environment still apply.
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("warn"));

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let Cli {
        url_base,
        config,
        command,
    } = cli;
    let connect = |connection: ConnectionArgs| -> Result<HttpTransport> {
        let options = ConnectionOptions {
            url_base: url_base.clone(),
            token: connection.token,
            organization: connection.organization,
            project: connection.project,
            http_headers: connection.http_headers,
        };
        let file = FileConfig::load_optional(config.as_deref())?;
        let client_config = ClientConfig::resolve(options, file)?;
        log::debug!(
            "Using {} for {}/{}",
            client_config.url_base,
            client_config.organization,
            client_config.project
        );
        Ok(HttpTransport::new(reqwest::Client::new(), client_config))
    };

    match command {
        Commands::BatchRun {
            connection,
            test_settings_number,
            setting,
            no_wait,
            wait_limit,
        } => {
            let api = connect(connection)?;
            let setting = setting.filter(|s| !s.is_empty());
            if test_settings_number == 0 && setting.is_none() {
                return Err(ClientError::Validation(
                    "Either of --test_settings_number or --setting option is required".to_string(),
                ));
            }
            let settings = resolve_settings(test_settings_number, setting.as_deref())?;
            let options = WaitOptions {
                wait_for_result: !no_wait,
                wait_limit_secs: wait_limit,
                print_result: true,
            };
            let outcome = runner::execute_batch_run(&api, &settings, options).await?;
            Ok(exit_code(outcome))
        }
        Commands::WaitBatchRun {
            connection,
            batch_run_number,
            wait_limit,
        } => {
            let api = connect(connection)?;
            require_batch_run_number(batch_run_number)?;
            let batch_run = api.get_batch_run(batch_run_number).await?;
            let outcome =
                runner::wait_for_batch_run_result(&api, batch_run, wait_limit, true).await;
            Ok(exit_code(outcome))
        }
        Commands::GetBatchRun {
            connection,
            batch_run_number,
        } => {
            let api = connect(connection)?;
            require_batch_run_number(batch_run_number)?;
            let batch_run = api.get_batch_run(batch_run_number).await?;
            println!("{}", serde_json::to_string_pretty(&batch_run)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::ListBatchRuns {
            connection,
            count,
            max_batch_run_number,
            min_batch_run_number,
        } => {
            let api = connect(connection)?;
            let query = BatchRunQuery {
                count,
                max_batch_run_number,
                min_batch_run_number,
            };
            for run in api.list_batch_runs(&query).await? {
                println!(
                    "#{}\t{}\t{}/{}\t{}",
                    run.batch_run_number,
                    run.status,
                    run.test_cases.finished(),
                    run.test_cases.total,
                    run.url
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::LatestBatchRunNo { connection } => {
            let api = connect(connection)?;
            println!("{}", runner::latest_batch_run_number(&api).await?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::UploadApp {
            connection,
            app_path,
        } => {
            let api = connect(connection)?;
            let app_path = app_path
                .filter(|p| !p.as_os_str().is_empty())
                .ok_or_else(|| ClientError::Validation("--app_path option is required".to_string()))?;
            println!("{}", api.upload_file(&app_path).await?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::DeleteApp {
            connection,
            app_file_number,
        } => {
            let api = connect(connection)?;
            if app_file_number == 0 {
                return Err(ClientError::Validation(
                    "--app_file_number option is not specified or 0".to_string(),
                ));
            }
            api.delete_file(app_file_number).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::GetScreenshots {
            connection,
            batch_run_number,
            download_path,
            file_index_type,
            file_name_body_type,
            download_type,
            mask_dynamically_changed_area,
            wait_limit,
            quiet,
        } => {
            let api = connect(connection)?;
            require_batch_run_number(batch_run_number)?;
            let download_path = resolve_download_path(download_path.as_deref())?;
            let options = ScreenshotOptions {
                file_index_type: file_index_type.map(Into::into).unwrap_or_default(),
                file_name_body_type: file_name_body_type.map(Into::into).unwrap_or_default(),
                download_type: download_type.map(Into::into).unwrap_or_default(),
                mask_dynamically_changed_area,
            };
            screenshots::get_screenshots(
                &api,
                batch_run_number,
                &download_path,
                &options,
                WaitLimit::from_flag(wait_limit),
                !quiet,
            )
            .await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn require_batch_run_number(batch_run_number: u64) -> Result<()> {
    if batch_run_number == 0 {
        return Err(ClientError::Validation(
            "--batch_run_number option is not specified or 0".to_string(),
        ));
    }
    Ok(())
}

/// Empty means `./screenshots.zip`; an existing directory is rejected.
fn resolve_download_path(path: Option<&Path>) -> Result<PathBuf> {
    let path = match path.filter(|p| !p.as_os_str().is_empty()) {
        None => PathBuf::from("screenshots.zip"),
        Some(path) if path.is_dir() => {
            return Err(ClientError::Validation(format!(
                "'{}' should be not a directory but a file",
                path.display()
            )));
        }
        Some(path) => path.to_path_buf(),
    };
    Ok(std::path::absolute(path)?)
}

/// 1 for a failed, aborted or unreadable run; 2 when only unresolved cases remain.
fn exit_code(outcome: BatchRunOutcome) -> ExitCode {
    if let Some(e) = outcome.error {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }
    if outcome.exists_error {
        ExitCode::FAILURE
    } else if outcome.exists_unresolved {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    }
}
