use std::{fs, process};

use clap::Parser;
use tracing_subscriber::EnvFilter;
use txprobe_cli::{App, Command};
use txprobe_core::client::Client;
use txprobe_drivers::memory::MemoryStore;
use txprobe_drivers::runner::Runner;
use txprobe_drivers::{ClusterConfig, Conn};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let app = App::parse();
    match &app.command {
        Command::Generate(args) => generate(args),
        Command::Run(args) => run(args),
        Command::Schema(args) => schema(args),
    }
}

fn generate(args: &txprobe_cli::GenerateArgs) {
    fs::create_dir_all(&args.output_dir).unwrap_or_else(|e| {
        eprintln!("Failed to create output directory: {e}");
        process::exit(1);
    });

    let params = txprobe_testgen::WorkloadParams::builder()
        .n_process(args.n_process)
        .n_key(args.n_key)
        .n_txn(args.n_txn)
        .max_txn_len(args.max_txn_len)
        .seed(args.seed)
        .build();
    let workloads = txprobe_testgen::generate_mult_workloads(args.n_work, &params);

    for workload in &workloads {
        let path = args.output_dir.join(format!("{}.json", workload.get_id()));
        let file = fs::File::create(&path).unwrap_or_else(|e| {
            eprintln!("Failed to create {}: {e}", path.display());
            process::exit(1);
        });
        serde_json::to_writer_pretty(file, workload).unwrap_or_else(|e| {
            eprintln!("Failed to write {}: {e}", path.display());
            process::exit(1);
        });
    }

    println!(
        "Generated {} workloads to {}",
        workloads.len(),
        args.output_dir.display()
    );
}

fn run(args: &txprobe_cli::RunArgs) {
    let schema = args.schema.schema_config().unwrap_or_else(|e| {
        eprintln!("Invalid schema layout: {e}");
        process::exit(2);
    });

    let file = fs::File::open(&args.input).unwrap_or_else(|e| {
        eprintln!("Failed to open {}: {e}", args.input.display());
        process::exit(1);
    });
    let workload: txprobe_testgen::Workload = serde_json::from_reader(file).unwrap_or_else(|e| {
        eprintln!("Failed to parse {}: {e}", args.input.display());
        process::exit(1);
    });

    let store = MemoryStore::new();
    let config = ClusterConfig {
        hosts: (1..=args.nodes).map(|i| format!("n{i}")).collect(),
        ..ClusterConfig::default()
    };
    let conn = Conn::open(&config, |host, port| Ok(store.open(host, port))).unwrap_or_else(|e| {
        eprintln!("Failed to connect: {e}");
        process::exit(1);
    });

    let runner = Runner::builder()
        .schema(schema)
        .exec(args.exec_config())
        .build();
    let result = runner.run(&conn, &workload);
    conn.close();
    let history = result.unwrap_or_else(|e| {
        eprintln!("Run aborted: {e}");
        process::exit(1);
    });

    let out = fs::File::create(&args.output).unwrap_or_else(|e| {
        eprintln!("Failed to create {}: {e}", args.output.display());
        process::exit(1);
    });
    serde_json::to_writer_pretty(out, &history).unwrap_or_else(|e| {
        eprintln!("Failed to write {}: {e}", args.output.display());
        process::exit(1);
    });

    let s = history.summary;
    println!(
        "{}: ok {} fail {} info {} ({} stored nodes)",
        args.output.display(),
        s.ok,
        s.fail,
        s.info,
        store.stats().nodes
    );
}

fn schema(args: &txprobe_cli::SchemaArgs) {
    match args.schema_config() {
        Ok(schema) => print!("{}", schema.schema_text()),
        Err(e) => {
            eprintln!("Invalid schema layout: {e}");
            process::exit(2);
        }
    }
}
