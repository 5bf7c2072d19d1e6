use cfasm::dump::listing;
use cfasm::{Assembler, Config, Console, Error, MetadataTable, Output, StrSource};
use color_print::cprintln;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

const HELP_TEMPLATE: &str = "\
{before-help}{bin} {version}
  {author}
  {about}

{usage-heading}
{tab}{usage}

{all-args}{after-help}";

#[derive(Debug, clap::Parser)]
#[clap(author, version, about, help_template = HELP_TEMPLATE)]
struct Args {
    /// Input files, one class per file
    #[clap(required = true)]
    input: Vec<String>,

    /// Output directory
    #[clap(short, long, default_value = ".")]
    output: String,

    /// Assembler configuration (YAML)
    #[clap(long)]
    config: Option<String>,

    /// Additional class metadata (YAML)
    #[clap(long)]
    metadata: Vec<String>,

    /// Dump assembled modules
    #[clap(short, long)]
    dump: bool,

    /// Nesting bound for macro expansion
    #[clap(long)]
    max_depth: Option<usize>,

    /// Loop iterations allowed per macro invocation
    #[clap(long)]
    max_iterations: Option<usize>,
}

struct Unit {
    path: String,
    text: String,
    lines: Vec<String>,
}

fn main() {
    use clap::Parser;
    let args = Args::parse();
    println!("cfasm: class module assembler");
    match run(&args) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            cprintln!("<red,bold>error</>: {}", e);
            std::process::exit(2);
        }
    }
}

fn run(args: &Args) -> Result<bool, Error> {
    println!("1. Load Configuration");
    let mut config = match &args.config {
        Some(path) => {
            println!("  < {}", path);
            Config::load(path)?
        }
        None => Config::default(),
    };
    if let Some(depth) = args.max_depth {
        config.max_recursion_depth = depth;
    }
    if let Some(n) = args.max_iterations {
        config.max_iterations = n;
    }
    let mut table = MetadataTable::new();
    for path in &args.metadata {
        println!("  < {}", path);
        table.load(path)?;
    }

    println!("2. Read Files");
    let mut units = Vec::new();
    for path in &args.input {
        println!("  < {}", path);
        let text = std::fs::read_to_string(path).map_err(|e| Error::FileOpen(path.clone(), e))?;
        let lines = text.lines().map(|l| l.to_string()).collect();
        units.push(Unit {
            path: path.clone(),
            text,
            lines,
        });
    }

    println!("3. Assemble");
    let results: Vec<Result<Output, Error>> = std::thread::scope(|s| {
        let handles: Vec<_> = units
            .iter()
            .map(|unit| {
                let config = config.clone();
                let table = &table;
                s.spawn(move || {
                    let name = Path::new(&unit.path)
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_else(|| unit.path.clone());
                    Assembler::new(config, table)
                        .with_source_name(&name)
                        .assemble(&mut StrSource::new(&unit.text))
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect()
    });

    println!("4. Write Modules");
    let mut failed = 0;
    for (unit, result) in units.iter().zip(results) {
        let output = result?;
        output
            .diagnostics
            .emit(&mut Console::new(&unit.path, &unit.lines));
        let Some(module) = output.module else {
            failed += 1;
            continue;
        };
        let short = module
            .class_name()
            .and_then(|n| n.rsplit('/').next())
            .unwrap_or("Module")
            .to_string();
        let out = Path::new(&args.output).join(format!("{short}.class"));
        let out_name = out.display().to_string();
        println!("  > {}", out_name);
        let file = File::create(&out).map_err(|e| Error::FileCreate(out_name.clone(), e))?;
        let mut writer = BufWriter::new(file);
        cfasm::write_to(&module, &mut writer)
            .and_then(|_| writer.flush())
            .map_err(|e| Error::FileWrite(out_name.clone(), e))?;

        if args.dump {
            for line in listing(&module)? {
                println!("{}", line);
            }
        }
    }

    if failed > 0 {
        cprintln!(
            "<red,bold>error</>: {} of {} units failed",
            failed,
            units.len()
        );
    }
    Ok(failed == 0)
}
