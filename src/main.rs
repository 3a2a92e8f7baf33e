use anyhow::Result;
use clap::Parser;
use std::io::Write;

use fordep::cli::{Args, OutputFormat};

fn main() -> Result<()> {
    let args = Args::parse();
    fordep::logging::init(args.verbose);

    let mut ctx = fordep::ContextEnv::new(&args.source);
    let cfg = ctx.load_config(&args)?;

    if args.dump_index {
        let (index, diags) = fordep::driver::build_index(ctx.source_root(), &cfg)?;
        for d in &diags {
            eprintln!("{d}");
        }
        let mut out = String::new();
        for (unit, file) in index.iter() {
            out.push_str(&format!("{unit} -> {file}\n"));
        }
        print!("{out}");
        return Ok(());
    }

    let report = fordep::run(ctx.source_root(), &args.start, &cfg)?;

    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    match args.format {
        OutputFormat::Text => {
            lock.write_all(report.render_text().as_bytes())?;
            for line in report.diagnostic_lines() {
                eprintln!("{line}");
            }
        }
        OutputFormat::Json => lock.write_all(report.render_json()?.as_bytes())?,
    }
    lock.flush()?;

    Ok(())
}
