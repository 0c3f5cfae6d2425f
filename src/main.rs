//! sd: streaming set difference
//!
//! Usage: sd [OPTIONS] <COMMAND>...

use clap::{ArgAction, Parser};
use std::io;
use std::path::PathBuf;
use std::process;

use streamdiff::config::{DEFAULT_TIMEOUT_SECS, PATIENCE_UNSET};
use streamdiff::logging::init_logging;
use streamdiff::streaming::ShellSpawner;
use streamdiff::{DiffCommand, DiffConfig, DiffError};

const EXAMPLES: &str = r#"Examples:

  echo -e "1\n2\n3\n4\n5" | sd 'echo -e "2\n4"'

  while [ 0 ]; do echo $RANDOM; sleep .1; done | sd -h 1 'seq 500'

  mysql schema_1 -Nsr -e "SELECT city FROM users" | sd -h 120 mysql schema_2 -Nsr -e "SELECT city FROM excluded_cities"

  mysql -Nsr -e "SELECT city FROM users" | sd -p 0 -t 10 kafka_consumer --topic excluded_cities > active_cities.txt"#;

#[derive(Parser)]
#[command(name = "sd")]
#[command(version)]
#[command(about = "Streaming set difference: print STDIN lines that COMMAND does not print", long_about = None)]
#[command(disable_help_flag = true)]
#[command(after_help = EXAMPLES)]
struct Cli {
    /// Keep reading from STDIN until SIGINT or its end.
    #[arg(short, long)]
    follow: bool,

    /// Keep reading from COMMAND until it ends rather than timing it out.
    /// If the command never ends, sd blocks forever and prints nothing.
    #[arg(short, long)]
    infinite: bool,

    /// Wait the specified seconds for the first received line. Use 0 to
    /// wait forever. Defaults to the timeout.
    #[arg(short, long, value_name = "SECONDS", default_value_t = PATIENCE_UNSET, allow_negative_numbers = true)]
    patience: i64,

    /// Stop reading a side after the specified seconds without a line.
    /// STDIN and COMMAND have independent timeouts. With -f, the timeout
    /// only applies to COMMAND.
    #[arg(short, long, value_name = "SECONDS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: i64,

    /// Stop both sides after the specified seconds (or earlier). Overrides
    /// all other options.
    #[arg(short = 'h', long, value_name = "SECONDS", default_value_t = 0)]
    hard_timeout: i64,

    /// Print STDIN lines that COMMAND does print instead.
    #[arg(short = 'I', long)]
    intersection: bool,

    /// Number of threads used to classify lines (default: number of CPUs)
    #[arg(long)]
    threads: Option<usize>,

    /// Print diff statistics to stderr
    #[arg(long)]
    stats: bool,

    /// Shell used to run COMMAND
    #[arg(long, value_name = "PATH", default_value = "/bin/bash")]
    shell: PathBuf,

    /// Increase log verbosity on stderr (-v, -vv, -vvv). Also shows
    /// COMMAND's stderr.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Print help
    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,

    /// Command whose output lines are removed from STDIN
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true, num_args = 1..)]
    command: Vec<String>,
}

impl Cli {
    fn config(&self) -> DiffConfig {
        DiffConfig {
            follow: self.follow,
            command_never_times_out: self.infinite,
            patience_secs: self.patience,
            timeout_secs: self.timeout,
            hard_timeout_secs: self.hard_timeout,
            intersection: self.intersection,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), DiffError> {
    // Configure thread pool if --threads specified
    if let Some(n) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .map_err(|e| DiffError::InvalidOption(format!("--threads: {}", e)))?;
    }

    let spawner = ShellSpawner::new()
        .with_shell(&cli.shell)
        .inherit_stderr(cli.verbose > 0);
    let cmd = DiffCommand::from_config(&cli.config())?.with_spawner(spawner);
    let command = shell_command(&cli.command);

    let mut stdout = io::stdout();
    let stats = cmd.run(&command, io::stdin(), &mut stdout)?;
    if cli.stats {
        eprintln!("Diff stats: {}", stats);
    }

    Ok(())
}

/// A single argument is already a shell script. Several arguments are quoted
/// so each one reaches the shell as one word.
fn shell_command(args: &[String]) -> String {
    match args {
        [script] => script.clone(),
        words => shell_words::join(words),
    }
}
