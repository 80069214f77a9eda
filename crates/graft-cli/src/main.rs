use clap::Parser;
use clap_verbosity_flag::{Verbosity, WarnLevel};
use graft_intrinsics::{HostProfile, JavaType, MethodKey, Pipeline, Plugins};
use graft_ir::{CallSite, Graph, InvokeKind, JavaKind};
use std::path::PathBuf;
use std::sync::Arc;

mod error;

use error::CliError;

#[derive(Parser, Debug)]
#[command(name = "graft")]
#[command(about = "Inspect the intrinsic rewrite rules a host profile produces", long_about = None)]
struct Args {
    #[command(flatten)]
    verbose: Verbosity<WarnLevel>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct ProfileArgs {
    /// Host profile describing the VM
    #[arg(value_name = "PROFILE")]
    profile: PathBuf,
    /// Compile position-independent code
    #[arg(long)]
    pic: bool,
    /// Collect tiered profiles in position-independent code
    #[arg(long)]
    tiered_aot: bool,
}

#[derive(clap::Args, Debug)]
struct MethodArgs {
    /// Declaring class, fully qualified
    #[arg(value_name = "OWNER")]
    owner: String,
    /// Method name
    #[arg(value_name = "METHOD")]
    method: String,
    /// Parameter types, e.g. `int`, `byte[]`, `java.lang.Object`
    #[arg(value_name = "PARAM")]
    params: Vec<JavaType>,
    /// The method takes a receiver
    #[arg(short, long)]
    receiver: bool,
}

impl MethodArgs {
    fn key(&self) -> MethodKey {
        MethodKey::new(
            self.owner.clone(),
            self.method.clone(),
            self.params.clone(),
            self.receiver,
        )
    }
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Print every installed rule, sorted by key
    Dump {
        #[command(flatten)]
        profile: ProfileArgs,
    },

    /// Show the rule installed for one method
    Lookup {
        #[command(flatten)]
        profile: ProfileArgs,
        #[command(flatten)]
        method: MethodArgs,
    },

    /// Apply the rule for one method to a fresh call site and print the IR it emits
    Explain {
        #[command(flatten)]
        profile: ProfileArgs,
        #[command(flatten)]
        method: MethodArgs,
        /// Kind the call returns
        #[arg(long, value_name = "KIND", default_value = "void")]
        returns: JavaKind,
        /// Treat the call site as compiled out-of-line
        #[arg(long)]
        out_of_line: bool,
    },
}

fn build(args: &ProfileArgs) -> Result<Plugins, CliError> {
    let profile = HostProfile::load(&args.profile)?;
    let caps = Arc::new(profile.snapshot()?);
    let mut options = profile.compiler;
    options.generate_pic |= args.pic;
    options.tiered_aot |= args.tiered_aot;
    Ok(Pipeline::standard(options).run(caps)?)
}

fn dump(profile: &ProfileArgs) -> Result<(), CliError> {
    let plugins = build(profile)?;
    print!("{}", plugins.registry.dump());
    let stats = plugins.stats;
    println!(
        "# {} rules from {} registrations ({} guarded out, {} overwritten)",
        stats.installed, stats.registrations, stats.guarded_out, stats.overwrites
    );
    if stats.unflagged_overwrites > 0 {
        log::warn!(
            "{} registrations replaced a rule without declaring it",
            stats.unflagged_overwrites
        );
    }
    Ok(())
}

fn lookup(profile: &ProfileArgs, method: &MethodArgs) -> Result<(), CliError> {
    let plugins = build(profile)?;
    let key = method.key();
    let entry = plugins
        .registry
        .entry(&key)
        .ok_or_else(|| CliError::NoRule { key: key.clone() })?;
    println!("{key} => {}", entry.rule);
    println!("  registered by {}", entry.origin);
    Ok(())
}

fn explain(
    profile: &ProfileArgs,
    method: &MethodArgs,
    returns: JavaKind,
    out_of_line: bool,
) -> Result<(), CliError> {
    let plugins = build(profile)?;
    let key = method.key();
    let invoke = if key.has_receiver() {
        InvokeKind::Virtual
    } else {
        InvokeKind::Static
    };
    let mut site = CallSite::new(invoke, returns);
    if out_of_line {
        site = site.out_of_line();
    }
    let mut graph = Graph::new(site);
    let args = graph.parameters(&key.argument_kinds());

    if plugins.registry.try_apply(&mut graph, &key, &args)? {
        print!("{graph}");
    } else if plugins.registry.lookup(&key).is_some() {
        println!("rule for `{key}` declined; the generic invoke stays");
    } else {
        return Err(CliError::NoRule { key });
    }
    Ok(())
}

fn main() -> miette::Result<()> {
    let args = Args::parse();
    env_logger::Builder::new()
        .filter_level(args.verbose.log_level_filter())
        .init();

    match &args.command {
        Command::Dump { profile } => dump(profile)?,
        Command::Lookup { profile, method } => lookup(profile, method)?,
        Command::Explain {
            profile,
            method,
            returns,
            out_of_line,
        } => explain(profile, method, *returns, *out_of_line)?,
    }
    Ok(())
}
