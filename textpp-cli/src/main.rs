#![warn(missing_docs)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

//! # textpp CLI
//!
//! A command-line interface for the textpp macro preprocessor library.

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use textpp::PreprocessorConfig;

/// Exit codes for different error conditions
mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const IO_ERROR: i32 = 2;
    pub const PREPROCESS_ERROR: i32 = 3;
}

/// Command-line interface for the textpp macro preprocessor
#[derive(Parser)]
#[command(
    name = "textpp",
    version,
    author,
    about = "A C-preprocessor-style macro engine for plain text",
    long_about = "textpp runs #define/#undef, conditional blocks, stringification and \
token pasting over any text file. Directives it does not recognize pass through \
untouched, so it can sit in front of shaders, configs, or source in any language.",
    after_help = "EXAMPLES:
  # Preprocess a file to stdout
  $ textpp input.glsl

  # Preprocess into a file with predefined macros
  $ textpp input.glsl -o output.glsl -D DEBUG -D MAX_LIGHTS=4

  # Read from stdin and write to stdout
  $ cat input.txt | textpp -

For more information, visit: https://github.com/walker84837/textpp"
)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Input file to preprocess (use '-' for stdin)
    #[arg(help = "Input file to preprocess (use '-' for stdin)")]
    input: PathBuf,

    /// Output file (use '-' for stdout, default: stdout)
    #[arg(
        short = 'o',
        long,
        help = "Output file (use '-' for stdout, default: stdout)"
    )]
    output: Option<PathBuf>,

    /// Predefine a macro
    #[arg(
        short = 'D',
        long = "define",
        value_name = "NAME[=VALUE]",
        help = "Predefine NAME as a macro (VALUE defaults to 1)"
    )]
    defines: Vec<String>,

    /// Value reported by the __FILE__ built-in
    #[arg(
        long,
        value_name = "NAME",
        help = "Value reported by the __FILE__ built-in (default: the input path)"
    )]
    file_name: Option<String>,

    /// Maximum recursion depth for macro expansion
    #[arg(
        long,
        default_value = "128",
        help = "Maximum recursion depth for macro expansion"
    )]
    recursion_limit: usize,

    /// Enable verbose output
    #[arg(
        short = 'v',
        long,
        help = "Enable verbose output with diagnostic information"
    )]
    verbose: bool,

    /// Suppress non-error output
    #[arg(short = 'q', long, help = "Suppress non-error output (quiet mode)")]
    quiet: bool,

    /// Show what would happen without preprocessing
    #[arg(
        short = 'n',
        long,
        help = "Show what would happen without actually preprocessing"
    )]
    dry_run: bool,

    /// Disable colored output
    #[arg(long, help = "Disable colored output")]
    no_color: bool,

    /// Force colored output
    #[arg(long, help = "Force colored output even when not a terminal")]
    force_color: bool,
}

/// Main application entry point
fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => exit_code::SUCCESS,
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            determine_exit_code(&e)
        }
    });
}

/// Determine the appropriate exit code based on the error
fn determine_exit_code(error: &anyhow::Error) -> i32 {
    if error.downcast_ref::<std::io::Error>().is_some() {
        exit_code::IO_ERROR
    } else if error.downcast_ref::<textpp::PreprocessError>().is_some() {
        exit_code::PREPROCESS_ERROR
    } else {
        exit_code::GENERAL_ERROR
    }
}

/// Run the main application logic
fn run() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    } else if cli.force_color {
        colored::control::set_override(true);
    } else if !atty::is(atty::Stream::Stderr) {
        colored::control::set_override(false);
    }

    validate_args(&cli)?;

    if cli.dry_run {
        show_dry_run_info(&cli);
        return Ok(());
    }

    let input_content = read_input(&cli.input)?;
    let config = create_config(&cli)?;

    let start_time = std::time::Instant::now();
    let processed_output = textpp::preprocess_with(&input_content, &config)
        .with_context(|| format!("failed to preprocess {}", format_input(&cli.input)))?;
    let processing_time = start_time.elapsed();

    write_output(&cli, &processed_output)?;

    if cli.verbose && !cli.quiet {
        eprintln!("Recursion limit: {}", cli.recursion_limit);
        eprintln!("Processing time: {processing_time:?}");
        let input_display = format_input(&cli.input);
        let output_display = cli
            .output
            .as_ref()
            .map_or("stdout".to_string(), format_output);
        eprintln!(
            "{} Preprocessed {input_display} -> {output_display}",
            "✓".green()
        );
    }

    Ok(())
}

/// Validate command-line arguments
fn validate_args(cli: &Cli) -> Result<()> {
    if let Some(output) = &cli.output
        && output != &PathBuf::from("-")
        && std::fs::canonicalize(output).ok() == std::fs::canonicalize(&cli.input).ok()
    {
        return Err(anyhow::anyhow!(
            "Input and output files cannot be the same: {}",
            output.display()
        ));
    }

    if cli.recursion_limit == 0 {
        return Err(anyhow::anyhow!("Recursion limit must be greater than 0"));
    }

    Ok(())
}

/// Show dry run information
fn show_dry_run_info(cli: &Cli) {
    let input_display = format_input(&cli.input);
    let output_display = cli
        .output
        .as_ref()
        .map_or("stdout".to_string(), format_output);

    eprintln!("Dry run: would preprocess {input_display} -> {output_display}");
    eprintln!("Recursion limit: {}", cli.recursion_limit);

    if !cli.defines.is_empty() {
        eprintln!("Predefined macros:");
        for define in &cli.defines {
            let (name, value) = split_define(define);
            eprintln!("  {name} = {value}");
        }
    }
}

/// Create preprocessor configuration from CLI arguments
fn create_config(cli: &Cli) -> Result<PreprocessorConfig> {
    let file = cli
        .file_name
        .clone()
        .unwrap_or_else(|| format_input(&cli.input));
    let mut config = PreprocessorConfig::new()
        .with_file(file)
        .with_recursion_limit(cli.recursion_limit);

    for define in &cli.defines {
        let (name, value) = split_define(define);
        if name.is_empty() {
            return Err(anyhow::anyhow!("invalid macro definition: {define:?}"));
        }
        config = config.with_define(name, value);
    }

    Ok(config)
}

/// Split a `-D NAME[=VALUE]` argument; a bare name means `1`.
fn split_define(define: &str) -> (&str, &str) {
    match define.split_once('=') {
        Some((name, value)) => (name, value),
        None => (define, "1"),
    }
}

/// Read input from file or stdin
fn read_input(input_path: &PathBuf) -> Result<String> {
    if input_path == &PathBuf::from("-") {
        use std::io::Read;
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read from stdin")?;
        Ok(buffer)
    } else {
        std::fs::read_to_string(input_path)
            .with_context(|| format!("Failed to read input file: {}", input_path.display()))
    }
}

/// Write output to file or stdout
fn write_output(cli: &Cli, content: &str) -> Result<()> {
    match &cli.output {
        Some(output_path) if output_path != &PathBuf::from("-") => {
            std::fs::write(output_path, content).with_context(|| {
                format!("Failed to write to output file: {}", output_path.display())
            })?;
        }
        _ => {
            print!("{content}");
        }
    }

    Ok(())
}

/// Format input path for display
fn format_input(path: &PathBuf) -> String {
    if path == &PathBuf::from("-") {
        "stdin".to_string()
    } else {
        path.display().to_string()
    }
}

/// Format output path for display
fn format_output(path: &PathBuf) -> String {
    if path == &PathBuf::from("-") {
        "stdout".to_string()
    } else {
        path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_splitting() {
        assert_eq!(split_define("DEBUG"), ("DEBUG", "1"));
        assert_eq!(split_define("MAX=4"), ("MAX", "4"));
        assert_eq!(split_define("MSG=a=b"), ("MSG", "a=b"));
    }
}
