use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use upload_validator::{
    bool_from_env_value, categories_from_env_value, list_from_env_value, ContentCategory,
    StagedUploads, UploadConfig, UploadInputSource, UploadValidator, ValidationErrors,
};

/// Field name the staged file is registered under.
const FIELD_NAME: &str = "file";

#[derive(Parser)]
#[command(name = "upload")]
#[command(about = "Validate an uploaded file and move it into its destination directory")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the metadata derived for a file
    Inspect {
        #[command(flatten)]
        staged: StagedFile,
    },
    /// Validate a file against the policy without moving it
    Check {
        #[command(flatten)]
        staged: StagedFile,
        #[command(flatten)]
        policy: PolicyArgs,
    },
    /// Validate a file and move it into the destination directory
    Upload {
        #[command(flatten)]
        staged: StagedFile,
        #[command(flatten)]
        policy: PolicyArgs,
        /// Destination directory (falls back to UPLOAD_DESTINATION_DIR)
        #[arg(long)]
        dest: Option<PathBuf>,
        /// Base name for the stored file (extension is kept)
        #[arg(long)]
        name: Option<String>,
        /// Append a unix timestamp to the base name
        #[arg(long)]
        with_time: bool,
        /// Do not attempt the move if the destination directory cannot be created
        #[arg(long)]
        abort_on_path_error: bool,
    },
}

#[derive(Args)]
struct StagedFile {
    /// File to treat as the uploaded temp file
    file: PathBuf,
    /// Client filename to use instead of the file's own name
    #[arg(long)]
    declared_name: Option<String>,
    /// Client size in bytes to use instead of the file's real size
    #[arg(long)]
    declared_size: Option<u64>,
}

#[derive(Args)]
struct PolicyArgs {
    /// Maximum size, `<integer>[G|M|K]` (falls back to UPLOAD_MAX_SIZE)
    #[arg(long)]
    max_size: Option<String>,
    /// Allowed MIME type, repeatable (falls back to UPLOAD_ALLOWED_MIMES)
    #[arg(long = "mime")]
    mimes: Vec<String>,
    /// Allowed category: image, video, audio, file; repeatable (falls back to UPLOAD_ALLOWED_CATEGORIES)
    #[arg(long = "category")]
    categories: Vec<String>,
}

#[derive(Serialize)]
struct Metadata<'a> {
    field: &'a str,
    exists: bool,
    name: Option<&'a str>,
    name_with_extension: Option<String>,
    extension: Option<&'a str>,
    mime: Option<&'a str>,
    is_image: bool,
    size_bytes: Option<u64>,
    size_kb: Option<f64>,
    size_mb: Option<f64>,
}

impl<'a> Metadata<'a> {
    fn of(validator: &'a UploadValidator) -> Self {
        Self {
            field: validator.field_name(),
            exists: validator.is_exist(),
            name: validator.name(),
            name_with_extension: validator.name_with_extension(),
            extension: validator.extension(),
            mime: validator.mime(),
            is_image: validator.is_image(),
            size_bytes: validator.size_bytes(),
            size_kb: validator.size_in_kb(),
            size_mb: validator.size_in_mb(),
        }
    }
}

#[derive(Serialize)]
struct CheckReport<'a> {
    valid: bool,
    errors: &'a ValidationErrors,
}

#[derive(Serialize)]
struct UploadReport<'a> {
    uploaded: bool,
    destination: Option<PathBuf>,
    errors: &'a ValidationErrors,
}

fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("upload=info".parse()?)
                .add_directive("upload_validator=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let env = |key: &str| std::env::var(key).ok();

    match cli.command {
        Commands::Inspect { staged } => {
            let config = UploadConfig::new(".")?;
            let source = stage(&staged, &config);
            let validator = UploadValidator::new(&source, FIELD_NAME, ".", None, None, None)?;

            print_json(&Metadata::of(&validator))?;
            Ok(exit_code(validator.is_exist()))
        }
        Commands::Check { staged, policy } => {
            let config = resolve_config(Some(PathBuf::from(".")), &policy, false, env)?;
            let source = stage(&staged, &config);
            let mut validator = UploadValidator::from_config(&source, FIELD_NAME, &config)?;

            let valid = validator.is_valid();
            print_json(&CheckReport {
                valid,
                errors: validator.errors(),
            })?;
            Ok(exit_code(valid))
        }
        Commands::Upload {
            staged,
            policy,
            dest,
            name,
            with_time,
            abort_on_path_error,
        } => {
            let config = resolve_config(dest, &policy, abort_on_path_error, env)?;
            let source = stage(&staged, &config);
            let mut validator = UploadValidator::from_config(&source, FIELD_NAME, &config)?;

            if let Some(name) = name {
                validator.set_filename(name);
            }
            if with_time {
                validator.set_filename_with_time();
            }

            let uploaded = validator.upload_with_options(config.upload_options());
            let destination = uploaded
                .then(|| validator.name_with_extension())
                .flatten()
                .map(|file_name| config.destination_dir().join(file_name));

            match &destination {
                Some(path) => {
                    tracing::info!("stored {} at {}", staged.file.display(), path.display())
                }
                None => tracing::warn!(
                    "upload of {} failed: {:?}",
                    staged.file.display(),
                    validator.errors()
                ),
            }

            print_json(&UploadReport {
                uploaded,
                destination,
                errors: validator.errors(),
            })?;
            Ok(exit_code(uploaded))
        }
    }
}

/// Merge command-line policy flags over environment values into an `UploadConfig`.
///
/// Flags win over environment variables; list flags replace (not extend) the environment list.
fn resolve_config(
    dest: Option<PathBuf>,
    policy: &PolicyArgs,
    abort_on_path_error: bool,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<UploadConfig> {
    let Some(destination) = dest.or_else(|| env("UPLOAD_DESTINATION_DIR").map(PathBuf::from))
    else {
        bail!("no destination directory: pass --dest or set UPLOAD_DESTINATION_DIR");
    };

    let max_size = policy.max_size.clone().or_else(|| env("UPLOAD_MAX_SIZE"));

    let mimes = if policy.mimes.is_empty() {
        list_from_env_value(env("UPLOAD_ALLOWED_MIMES"))
    } else {
        policy.mimes.clone()
    };

    let categories = if policy.categories.is_empty() {
        categories_from_env_value(env("UPLOAD_ALLOWED_CATEGORIES"))?
    } else {
        policy
            .categories
            .iter()
            .map(|c| c.parse::<ContentCategory>())
            .collect::<Result<Vec<_>, _>>()?
    };

    let abort_on_path_error =
        abort_on_path_error || bool_from_env_value(env("UPLOAD_ABORT_ON_PATH_ERROR"))?;

    let config = UploadConfig::new(destination)?
        .with_max_size(max_size)
        .context("invalid maximum size")?
        .with_allowed_mimes(mimes)
        .with_categories(categories)
        .with_staging_dir(env("UPLOAD_STAGING_DIR").map(PathBuf::from))
        .with_abort_on_path_error(abort_on_path_error);

    Ok(config)
}

/// Register the file as the upload for `FIELD_NAME`.
///
/// Without a configured staging directory the file's own directory is used, so any existing
/// regular file passes the genuine-upload check. A file that cannot be staged is left
/// unregistered and the validator reports it as not found.
fn stage(staged: &StagedFile, config: &UploadConfig) -> StagedUploads {
    let mut source = match config.staging_dir() {
        Some(_) => config.staged_uploads(),
        None => StagedUploads::with_staging_dir(parent_dir(&staged.file)),
    };

    if let Err(e) = source.stage_file(FIELD_NAME, &staged.file) {
        tracing::warn!("could not stage {}: {}", staged.file.display(), e);
        return source;
    }

    if let Some(mut descriptor) = source.descriptor(FIELD_NAME) {
        if let Some(name) = &staged.declared_name {
            descriptor.declared_name = name.clone();
        }
        if let Some(size) = staged.declared_size {
            descriptor.declared_size_bytes = size;
        }
        source.insert(FIELD_NAME, descriptor);
    }

    source
}

fn parent_dir(file: &Path) -> &Path {
    match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
