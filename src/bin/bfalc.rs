//! Command-line compiler: `bfalc <input.bfal> [-o <out.bf>] [--run]
//! [--mem <cells>] [--unbuffered]`.

use std::io::{self, Write};
use std::process::ExitCode;
use std::{env, fs};

use bfal::{Compiler, Interpreter};

struct Options {
    input: String,
    output: Option<String>,
    run: bool,
    mem: usize,
    buffered: bool,
}

fn usage() -> ! {
    eprintln!("usage: bfalc <input.bfal> [-o <out.bf>] [--run] [--mem <cells>] [--unbuffered]");
    std::process::exit(2);
}

fn parse_args() -> Options {
    let mut opts = Options {
        input: String::new(),
        output: None,
        run: false,
        mem: 30_000,
        buffered: true,
    };

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-o" => opts.output = Some(args.next().unwrap_or_else(|| usage())),
            "--run" => opts.run = true,
            "--mem" => {
                let cells = args.next().unwrap_or_else(|| usage());
                opts.mem = cells.parse().unwrap_or_else(|_| usage());
            }
            "--unbuffered" => opts.buffered = false,
            "-h" | "--help" => usage(),
            _ if opts.input.is_empty() => opts.input = arg,
            _ => usage(),
        }
    }
    if opts.input.is_empty() {
        usage();
    }
    opts
}

fn main() -> ExitCode {
    env_logger::init();
    let opts = parse_args();

    let source = match fs::read_to_string(&opts.input) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("{}: {err}", opts.input);
            return ExitCode::FAILURE;
        }
    };

    let bf = match Compiler::new().compile(&source) {
        Ok(bf) => bf,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    if opts.run {
        let mut interp = Interpreter::new(opts.mem);
        interp.set_buffer_input(opts.buffered);
        if let Err(err) = interp.load(&bf) {
            eprintln!("internal error: emitted program rejected: {err}");
            return ExitCode::FAILURE;
        }
        let stdin = io::stdin();
        let stdout = io::stdout();
        if let Err(err) = interp.run(&mut stdin.lock(), &mut stdout.lock()) {
            eprintln!("runtime fault: {err}");
            return ExitCode::FAILURE;
        }
        return ExitCode::SUCCESS;
    }

    let result = match &opts.output {
        Some(path) => fs::write(path, &bf).map_err(|e| (path.as_str(), e)),
        None => io::stdout()
            .write_all(bf.as_bytes())
            .map_err(|e| ("stdout", e)),
    };
    if let Err((target, err)) = result {
        eprintln!("{target}: {err}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
