// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Flag argument without a value
fn flag(id: &'static str, long: &'static str, help: &'static str) -> Arg {
    Arg::new(id).long(long).action(ArgAction::SetTrue).help(help)
}

fn build_cli() -> Command {
    Command::new("conda-convert")
        .version(env!("CARGO_PKG_VERSION"))
        .author("conda-convert Contributors")
        .about("Convert pure-Python conda packages to other platforms")
        .arg(
            Arg::new("package_files")
                .value_name("PACKAGE")
                .required(true)
                .num_args(1..)
                .help("Package files to convert (.tar.bz2)"),
        )
        .arg(
            Arg::new("platform")
                .short('p')
                .long("platform")
                .value_name("PLATFORM")
                .required(true)
                .action(ArgAction::Append)
                .value_parser(["osx-64", "linux-32", "linux-64", "win-32", "win-64"])
                .help("Destination platform; repeat for several"),
        )
        .arg(
            Arg::new("output_dir")
                .short('o')
                .long("output-dir")
                .value_name("DIR")
                .env("CONDA_CONVERT_OUTPUT_DIR")
                .required(true)
                .help("Directory to write converted packages to"),
        )
        .arg(flag("force", "force", "Convert even if the package contains compiled code or non-Python entry points").short('f'))
        .arg(flag("show_imports", "show-imports", "Print the import names of compiled extension modules"))
        .arg(flag("dry_run", "dry-run", "Show what would be converted without writing anything"))
        .arg(flag("verbose", "verbose", "Print the file map of each conversion").short('v'))
        .arg(flag("debug", "debug", "Enable debug logging"))
        .arg(flag(
            "platform_subdirs",
            "platform-subdirs",
            "Write each platform's packages to its own subdirectory of the output directory",
        ))
        .arg(
            Arg::new("jobs")
                .short('j')
                .long("jobs")
                .value_name("N")
                .default_value("1")
                .help("Number of packages to convert in parallel"),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory - use CARGO_MANIFEST_DIR which is always set by cargo
    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("conda-convert.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
