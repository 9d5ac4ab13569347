//! eiasset CLI - inspect and manipulate `.res` asset archives.

use std::env;
use std::fs;
use std::path::Path;
use std::process::exit;

use tracing_subscriber::EnvFilter;

use eiasset::anm::AnmOptions;
use eiasset::fig::Figure;
use eiasset::model::import_animation;
use eiasset::res::ResFile;
use eiasset::Result;

fn main() {
    let args: Vec<String> = env::args().collect();

    // global verbosity flags; RUST_LOG wins when set
    let mut level = "warn";
    let mut filtered: Vec<&str> = Vec::new();
    for arg in &args[1..] {
        match arg.as_str() {
            "-v" | "--verbose" => level = "debug",
            "-q" | "--quiet" => level = "error",
            _ => filtered.push(arg),
        }
    }
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if filtered.is_empty() {
        print_help();
        return;
    }

    let outcome = match filtered[0] {
        "list" | "l" => with_args(&filtered, 2, "list <file.res>", |a| cmd_list(a[1])),
        "extract" | "x" => with_args(&filtered, 3, "extract <file.res> <entry> [out]", |a| {
            cmd_extract(a[1], a[2], a.get(3).copied())
        }),
        "repack" | "r" => with_args(&filtered, 3, "repack <in.res> <out.res>", |a| {
            cmd_repack(a[1], a[2])
        }),
        "models" | "m" => with_args(&filtered, 2, "models <file.res>", |a| cmd_models(a[1])),
        "animations" | "a" => with_args(&filtered, 3, "animations <file.res> <model>", |a| {
            cmd_animations(a[1], a[2])
        }),
        "fig" | "f" => with_args(&filtered, 3, "fig <file.res> <entry>", |a| {
            cmd_fig(a[1], a[2])
        }),
        "anm" => with_args(&filtered, 4, "anm <file.res> <model> <animation>", |a| {
            cmd_anm(a[1], a[2], a[3])
        }),
        "help" | "h" | "-h" | "--help" => {
            print_help();
            Ok(())
        }
        _ => {
            // a bare archive path is shorthand for 'list'
            if Path::new(filtered[0]).exists() {
                cmd_list(filtered[0])
            } else {
                eprintln!("Unknown command: {}", filtered[0]);
                eprintln!();
                print_help();
                exit(1);
            }
        }
    };

    if let Err(e) = outcome {
        eprintln!("Error: {e}");
        exit(1);
    }
}

fn with_args<'a>(
    args: &'a [&'a str],
    min: usize,
    usage: &str,
    run: impl FnOnce(&'a [&'a str]) -> Result<()>,
) -> Result<()> {
    if args.len() < min {
        eprintln!("Error: missing arguments");
        eprintln!("Usage: eiasset {usage}");
        exit(1);
    }
    run(args)
}

fn print_help() {
    println!("eiasset - Evil Islands asset archive toolkit");
    println!();
    println!("USAGE:");
    println!("    eiasset [OPTIONS] <COMMAND> [ARGS]");
    println!();
    println!("COMMANDS:");
    println!("    l, list       <file>                    List archive entries");
    println!("    x, extract    <file> <entry> [out]     Extract one entry to a file");
    println!("    r, repack     <in> <out>               Rewrite compacted, nested archives included");
    println!("    m, models     <file>                   List model names");
    println!("    a, animations <file> <model>           List a model's animation sets");
    println!("    f, fig        <file> <entry>           Dump a figure's header and counts");
    println!("       anm        <file> <model> <anim>    Dump per-part animation frame counts");
    println!("    h, help                                Show this help");
    println!();
    println!("OPTIONS:");
    println!("    -v, --verbose    Show debug output");
    println!("    -q, --quiet      Errors only");
    println!();
    println!("EXAMPLES:");
    println!("    eiasset list Figures.res");
    println!("    eiasset extract Figures.res unmods.mod");
    println!("    eiasset animations Figures.res unmods");
    println!("    eiasset repack Figures.res Compact.res");
    println!();
    println!("NOTES:");
    println!("    - Passing a .res file directly is equivalent to 'list'");
    println!("    - RUST_LOG overrides the verbosity flags");
}

fn cmd_list(path: &str) -> Result<()> {
    let archive = ResFile::open(path)?;
    println!("Archive: {path}");
    println!("Entries: {}", archive.len());
    println!();
    for entry in archive.iter_entries() {
        match entry.mtime {
            Some(mtime) => println!("{:>10}  {:>12}  {}", entry.size, mtime, entry.name),
            None => println!("{:>10}  {:>12}  {}", entry.size, "-", entry.name),
        }
    }
    Ok(())
}

fn cmd_extract(path: &str, entry: &str, out: Option<&str>) -> Result<()> {
    let mut archive = ResFile::open(path)?;
    let data = archive.read_entry(entry)?;
    let out = out.map(str::to_string).unwrap_or_else(|| entry.replace(['/', '\\'], "_"));
    fs::write(&out, &data)?;
    println!("{entry}: {} bytes -> {out}", data.len());
    Ok(())
}

fn cmd_repack(input: &str, output: &str) -> Result<()> {
    let mut archive = ResFile::open(input)?;
    let bytes = archive.repack()?;
    fs::write(output, &bytes)?;
    println!("{input} -> {output} ({} bytes)", bytes.len());
    Ok(())
}

fn cmd_models(path: &str) -> Result<()> {
    let archive = ResFile::open(path)?;
    for name in archive.model_names() {
        println!("{name}");
    }
    Ok(())
}

fn cmd_animations(path: &str, model: &str) -> Result<()> {
    let mut archive = ResFile::open(path)?;
    for name in archive.animation_names(model)? {
        println!("{name}");
    }
    Ok(())
}

fn cmd_fig(path: &str, entry: &str) -> Result<()> {
    let mut archive = ResFile::open(path)?;
    let data = archive.read_entry(entry)?;
    let fig = Figure::decode(entry, &data, false)?;
    let header = &fig.header;
    println!("Figure: {entry}");
    println!("  morph variants:    {}", fig.morph_count);
    println!("  vertex blocks:     {}", header.vertex_count);
    println!("  normal blocks:     {}", header.normal_count);
    println!("  texture coords:    {}", header.texcoord_count);
    println!("  indices:           {}", header.index_count);
    println!("  vertex components: {}", header.vertex_component_count);
    println!("  morph components:  {}", header.morph_component_count);
    println!("  group / texture:   {} / {}", header.group, header.texture_number);
    Ok(())
}

fn cmd_anm(path: &str, model: &str, animation: &str) -> Result<()> {
    let mut archive = ResFile::open(path)?;
    let set = import_animation(&mut archive, model, animation, AnmOptions::default())?;
    println!("Animation: {model}/{animation}");
    for part in set.iter() {
        println!(
            "  {:<16} {} rotation frames, {} translations, {} morph frames",
            part.name,
            part.rotations.len(),
            part.translations.len(),
            part.morphs.len()
        );
    }
    Ok(())
}
