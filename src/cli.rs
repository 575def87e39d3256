//! Command-line argument parsing.
//!
//! Everything nvgdb itself understands comes before the first free
//! argument (or an explicit `--`); the rest of the line belongs to gdb
//! verbatim, so invocations like `nvgdb --args ./prog 1 2` need no
//! quoting gymnastics.

/// Command-line options.
#[derive(Debug, Default)]
pub struct Cli {
    /// Editor RPC address override. Defaults to the environment.
    pub listen: Option<String>,

    /// Debugger binary to run instead of `gdb`.
    pub gdb: Option<String>,

    /// Skip the langkit toolkit probe and never open DSL views.
    pub no_dsl: bool,

    /// Arguments handed to the debugger untouched.
    pub gdb_args: Vec<String>,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse() -> Result<Self, Box<dyn std::error::Error>> {
        Self::parse_from(std::env::args().skip(1))
    }

    /// Parse from an explicit argument list.
    pub fn parse_from<I>(args: I) -> Result<Self, Box<dyn std::error::Error>>
    where
        I: IntoIterator<Item = String>,
    {
        let mut cli = Self::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--listen" => {
                    if let Some(addr) = args.next() {
                        cli.listen = Some(addr);
                    } else {
                        return Err("--listen requires a value".into());
                    }
                }
                "--gdb" => {
                    if let Some(path) = args.next() {
                        cli.gdb = Some(path);
                    } else {
                        return Err("--gdb requires a value".into());
                    }
                }
                "--no-dsl" => cli.no_dsl = true,
                "--" => {
                    cli.gdb_args.extend(args);
                    break;
                }
                "-h" | "--help" => {
                    println!("nvgdb - gdb/Neovim source sync");
                    println!();
                    println!("Usage: nvgdb [OPTIONS] [--] [GDB ARGS...]");
                    println!();
                    println!("Runs gdb on the current terminal and mirrors every stop in");
                    println!("the surrounding Neovim instance. Meant to be started inside");
                    println!("an nvim :terminal, where $NVIM is set.");
                    println!();
                    println!("Options:");
                    println!("  -h, --help         Show this help message");
                    println!("      --listen ADDR  Editor RPC socket (default: $NVIM)");
                    println!("      --gdb PATH     Debugger binary to run (default: gdb)");
                    println!("      --no-dsl       Disable the langkit DSL views");
                    std::process::exit(0);
                }
                arg if arg.starts_with('-') => {
                    return Err(format!("Unknown flag: {}. Use --help for usage.", arg).into());
                }
                _ => {
                    // First free argument: it and everything after it
                    // belong to gdb.
                    cli.gdb_args.push(arg);
                    cli.gdb_args.extend(args);
                    break;
                }
            }
        }

        Ok(cli)
    }
}
