//! SSA middle-end playground CLI.
//!
//! Provides the `velo` binary. `fibonacci` builds the canonical four-block
//! loop-and-phi sample function, prints it and optionally runs a pass
//! pipeline over it; `analyze` prints the dominator tree and loop tree of
//! the same function. `RUST_LOG` controls pass logging (e.g.
//! `RUST_LOG=velo_transforms=debug`).

use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use velo_graphs::{DominatorTree, LoopTree};
use velo_ir::{CmpKind, Function, IrError, Opcode, Type};
use velo_transforms::{ConstantFolding, Dce, Pass, Peephole};

/// SSA middle-end playground.
#[derive(Parser)]
#[command(name = "velo", about = "SSA middle-end playground")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the sample fibonacci function and run passes over it.
    Fibonacci {
        /// Passes to run, in order.
        #[arg(long, value_delimiter = ',')]
        passes: Vec<PassName>,

        /// Print only the final form.
        #[arg(long)]
        quiet: bool,
    },
    /// Print dominator and loop trees of the sample function.
    Analyze,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PassName {
    Constfold,
    Peephole,
    Dce,
}

impl PassName {
    fn instantiate(self) -> Box<dyn Pass> {
        match self {
            PassName::Constfold => Box::new(ConstantFolding),
            PassName::Peephole => Box::new(Peephole),
            PassName::Dce => Box::new(Dce),
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Fibonacci { passes, quiet } => run_passes(&passes, quiet),
        Commands::Analyze => analyze(),
    };
    if let Err(err) = result {
        eprintln!("error: {err}");
        process::exit(1);
    }
}

fn run_passes(passes: &[PassName], quiet: bool) -> Result<(), IrError> {
    let mut func = build_fibonacci()?;
    if !quiet {
        println!("{}", func.dump()?);
    }
    for name in passes {
        let mut pass = name.instantiate();
        pass.run(&mut func)?;
        if !quiet {
            println!("; after {}", pass.name());
            println!("{}", func.dump()?);
        }
    }
    if quiet {
        println!("{}", func.dump()?);
    }
    Ok(())
}

fn analyze() -> Result<(), IrError> {
    let func = build_fibonacci()?;
    println!("{}", func.dump()?);

    let dom = DominatorTree::new(&func);
    println!("; immediate dominators");
    for block in func.blocks() {
        match dom.idom(block) {
            Some(idom) => println!(";   %bb{block} <- %bb{idom}"),
            None => println!(";   %bb{block} (entry)"),
        }
    }

    let loops = LoopTree::new(&func);
    println!("; {} top-level loop(s)", loops.loops_count());
    for lp in loops.loops() {
        let body: Vec<String> = lp.vertices().map(|v| format!("%bb{v}")).collect();
        println!(
            ";   header %bb{}: {} ({} inner)",
            lp.header(),
            body.join(", "),
            lp.inner_loops_count()
        );
    }
    Ok(())
}

/// The canonical loop-and-phi sample: entry compare, init block, loop
/// header with three phis, merge block returning a phi.
fn build_fibonacci() -> Result<Function, IrError> {
    let mut f = Function::new("fibonacci", Type::I64, vec![Type::I64]);
    let entry = f.append_block();
    let init = f.append_block();
    let header = f.append_block();
    let merge = f.append_block();

    let n = f.append_arg(entry, 0)?;
    let two = f.append_const(entry, Type::I64, 2)?;
    let is_small = f.append_icmp(entry, CmpKind::Ult, n, two)?;
    f.append_cond_br(entry, is_small, merge, init)?;

    let zero = f.append_const(init, Type::I64, 0)?;
    let one = f.append_const(init, Type::I64, 1)?;
    f.append_br(init, header)?;

    let i = f.append_phi(header, Type::I64)?;
    let prev = f.append_phi(header, Type::I64)?;
    let cur = f.append_phi(header, Type::I64)?;
    let next = f.append_binary(header, Opcode::Add, prev, cur)?;
    let i_next = f.append_binary(header, Opcode::Add, i, one)?;
    let again = f.append_icmp(header, CmpKind::Ule, i_next, n)?;
    f.append_cond_br(header, again, header, merge)?;

    f.phi_add_path(i, init, two)?;
    f.phi_add_path(i, header, i_next)?;
    f.phi_add_path(prev, init, zero)?;
    f.phi_add_path(prev, header, cur)?;
    f.phi_add_path(cur, init, one)?;
    f.phi_add_path(cur, header, next)?;

    let result = f.append_phi(merge, Type::I64)?;
    f.phi_add_path(result, entry, n)?;
    f.phi_add_path(result, header, next)?;
    f.append_ret(merge, Some(result))?;

    Ok(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_function_builds_and_prints() {
        let f = build_fibonacci().unwrap();
        assert_eq!(f.blocks_count(), 4);
        assert!(f.dump().unwrap().starts_with("i64 fibonacci(i64):"));
    }

    #[test]
    fn sample_function_has_one_loop() {
        let f = build_fibonacci().unwrap();
        let loops = LoopTree::new(&f);
        assert_eq!(loops.loops_count(), 1);
    }
}
