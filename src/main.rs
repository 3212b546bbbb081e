use std::fs::File;
use std::io::{self, BufReader};

use anyhow::{anyhow, Context};

use kaleidoscope::config::Config;
use kaleidoscope::driver;
use kaleidoscope::lexer::{Lexer, ReaderSource};
use kaleidoscope::logger;
use kaleidoscope::parser::Parser;

fn main() -> anyhow::Result<()> {
    let config = Config::from_args();
    logger::init(config.log_level)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();

    let summary = match &config.input {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            let source = ReaderSource::new(BufReader::new(file));
            driver::run(Parser::new(Lexer::new(source)), &config, &mut out)?
        }
        None => {
            let stdin = io::stdin();
            let source = ReaderSource::new(stdin.lock());
            driver::run(Parser::new(Lexer::new(source)), &config, &mut out)?
        }
    };

    if config.input.is_some() && !summary.is_clean() {
        return Err(anyhow!(
            "{} parse errors, {} codegen errors, {} evaluation errors",
            summary.parse_errors,
            summary.codegen_errors,
            summary.exec_errors
        ));
    }

    Ok(())
}
