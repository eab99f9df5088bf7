use std::process::ExitCode;

use clap::Parser;

use parklot_cli::{
    Args, OutputFormat, error_exit_code, exit_code, init_tracing, render_json, run,
};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing();

    let report = match run(&args).await {
        Ok(report) => report,
        Err(e) => {
            let code = error_exit_code(&e);
            let err = anyhow::Error::new(e).context("could not start the batch");
            eprintln!("error: {err:#}");
            return code;
        }
    };

    if args.format == OutputFormat::Json {
        match render_json(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("error: {e:#}"),
        }
    }
    println!("{}", report.banner());
    exit_code(&report)
}
