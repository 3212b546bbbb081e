use std::ffi::OsString;
use std::path::PathBuf;

use clap::{App, Arg};
use tracing::Level;

#[derive(Debug, PartialEq, Clone)]
pub struct Config {
    /// source file, stdin when absent
    pub input: Option<PathBuf>,
    pub emit_ast: bool,
    pub emit_ir: bool,
    pub log_level: Level,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input: None,
            emit_ast: false,
            emit_ir: false,
            log_level: Level::WARN,
        }
    }
}

fn app() -> App<'static, 'static> {
    App::new("kaleidoscope")
        .version(env!("CARGO_PKG_VERSION"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::with_name("input")
                .help("source file to compile, reads stdin if omitted")
                .index(1),
        )
        .arg(
            Arg::with_name("emit-ast")
                .long("emit-ast")
                .help("print every parsed statement"),
        )
        .arg(
            Arg::with_name("emit-ir")
                .long("emit-ir")
                .help("print the IR of every lowered function"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .multiple(true)
                .help("log more, repeat for more detail"),
        )
}

fn level_for(verbosity: u64) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

impl Config {
    /// parse the process arguments, exiting with usage on error
    pub fn from_args() -> Self {
        Self::from_matches(&app().get_matches())
    }

    pub fn try_from_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Ok(Self::from_matches(&app().get_matches_from_safe(args)?))
    }

    fn from_matches(matches: &clap::ArgMatches<'_>) -> Self {
        Self {
            input: matches.value_of_os("input").map(PathBuf::from),
            emit_ast: matches.is_present("emit-ast"),
            emit_ir: matches.is_present("emit-ir"),
            log_level: level_for(matches.occurrences_of("verbose")),
        }
    }
}
