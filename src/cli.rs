use clap::Parser;

/// Command line interface for the application
#[derive(Parser, Debug)]
#[command(name = "stepwise", about = "Chat with a task orchestration engine")]
pub struct Cli {
    /// Path to the engine configuration (YAML, or TOML by extension)
    #[arg(short, long)]
    pub config: String,

    /// External conversation identifier, a new one is generated when omitted
    #[arg(short, long)]
    pub thread: Option<String>,

    /// Job offering the workflows, overrides `parameters.default_job`
    #[arg(long)]
    pub job: Option<String>,

    /// Sets the logging verbosity level for the application
    /// Possible values: "error", "warn", "info", "debug", "trace"
    /// Default: "warn"
    #[arg(long, default_value_t = String::from("warn"))]
    pub logging_level: String,

    /// Also write logs to `logs/stepwise.log`
    #[arg(long)]
    pub log_file: bool,
}
