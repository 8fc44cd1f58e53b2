use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::Parser as ClapParser;
use redline::{compiler::Compiler,
              config::{CacheMode, CompilerConfig},
              io_util::my_read_to_string,
              util::getenv,
              warn::set_warnings};

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Compile templates into the cache (only those whose artifact is
    /// stale, unless --force is given).
    Compile {
        #[clap(required(true))]
        templates: Vec<PathBuf>,
    },
    /// Compile a template in memory, reporting the first error.
    Check {
        template: PathBuf,
    },
}

#[derive(clap::Parser, Debug)]
/// Compile Redline templates into views and form validators.
struct Args {
    #[clap(subcommand)]
    command: Command,

    /// Recompile even if the artifacts are up to date
    #[clap(long)]
    force: bool,

    /// Where the artifacts go (default: from REDLINE_CACHE_DIR or the
    /// config file)
    #[clap(long)]
    cache_dir: Option<PathBuf>,

    /// Tag definition directory (default: all built-in tags)
    #[clap(long)]
    tag_dir: Option<PathBuf>,

    /// JSON config file; without it the REDLINE_* env vars are used
    /// if REDLINE_CACHE_DIR is set
    #[clap(long)]
    config: Option<PathBuf>,

    /// Print warnings to stderr
    #[clap(short, long)]
    verbose: bool,
}

fn load_config(args: &Args) -> Result<CompilerConfig> {
    let mut config = match &args.config {
        Some(path) => CompilerConfig::from_file(path)?,
        None => if getenv("REDLINE_CACHE_DIR")?.is_some() {
            CompilerConfig::from_env()?
        } else {
            CompilerConfig::default()
        }
    };
    if let Some(dir) = &args.cache_dir {
        config.cache_dir = dir.clone();
    }
    if let Some(dir) = &args.tag_dir {
        config.tag_dir = Some(dir.clone());
    }
    if args.force {
        config.cache_mode = CacheMode::Force;
    }
    Ok(config)
}

fn run(args: Args) -> Result<()> {
    set_warnings(args.verbose);
    let compiler = Compiler::from_config(load_config(&args)?)
        .with_context(|| anyhow!("loading tag definitions"))?;
    match &args.command {
        Command::Compile { templates } => {
            for template in templates {
                if compiler.ensure_compiled(template)? {
                    println!("{}: compiled", template.to_string_lossy());
                } else {
                    println!("{}: up to date", template.to_string_lossy());
                }
            }
        }
        Command::Check { template } => {
            let source = template.to_string_lossy();
            let text = my_read_to_string(template)?;
            let output = compiler.compile_str(&source, &text)?;
            println!("{source}: ok, {} form(s)", output.forms.len());
        }
    }
    Ok(())
}

fn main() {
    if let Err(e) = run(Args::parse()) {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}
