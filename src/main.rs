// main.rs

use std::io;

use fillbench::{BenchConfig, BenchmarkRunner, Reporter, SystemProbe};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let config = BenchConfig::default();
    let runner = BenchmarkRunner::new(config.clone(), SystemProbe);

    let stdout = io::stdout();
    let mut reporter = Reporter::new(stdout.lock());
    if let Err(e) = runner.run(&mut reporter) {
        log::error!("failed to write results: {}", e);
    }
    drop(reporter);

    println!("Done, Press any key to exit");
    if config.hold_on_exit {
        // EOF releases the hold too
        let mut line = String::new();
        let _ = io::stdin().read_line(&mut line);
    }
}
