use std::error::Error;

use clap::Parser;
use log::debug;

use lichen::cli::Cli;
use lichen::config::Config;
use lichen::identifier::{
    IdentifierResults, identify_licenses_in_directory, identify_licenses_in_file,
    identify_licenses_in_string,
};
use lichen::licenses::LicenseLibrary;

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = cli.to_config()?;
    let options = cli.options();

    let library = load_library(&config)?;

    if let Some(file) = &cli.file {
        let results = identify_licenses_in_file(file, &options, &library)?;
        print_results(&cli, &library, std::slice::from_ref(&results))?;
    } else if let Some(dir) = &cli.dir {
        let scan = identify_licenses_in_directory(dir, &options, &library);
        print_results(&cli, &library, &scan.results)?;
        if let Some(err) = scan.error {
            return Err(err.into());
        }
    } else if let Some(text) = &cli.text {
        let results = identify_licenses_in_string(text, &options, &library)?;
        print_results(&cli, &library, std::slice::from_ref(&results))?;
    } else if cli.list {
        print_listing(&library);
    } else {
        return Err("provide --file, --dir, --text, or --list".into());
    }

    Ok(())
}

fn load_library(config: &Config) -> Result<LicenseLibrary, Box<dyn Error>> {
    let library = LicenseLibrary::load(config)?;
    debug!(
        "library ready: {} licenses (SPDX {})",
        library.licenses.len(),
        library.spdx_version
    );
    Ok(library)
}

fn print_results(
    cli: &Cli,
    library: &LicenseLibrary,
    results: &[IdentifierResults],
) -> Result<(), Box<dyn Error>> {
    if cli.json {
        println!("{}", serde_json::to_string_pretty(results)?);
        return Ok(());
    }

    for result in results {
        if !result.file.is_empty() {
            println!("FILE: {}", result.file);
        }

        if result.matches.is_empty() {
            println!("No licenses found");
        }
        for (id, spans) in &result.matches {
            for span in spans {
                println!("{}: {}-{}", id, span.begins, span.ends);
            }
        }
        if cli.quiet {
            continue;
        }

        if cli.hash {
            println!("md5:    {}", result.hash.md5);
            println!("sha256: {}", result.hash.sha256);
            println!("sha512: {}", result.hash.sha512);
        }
        if cli.normalized {
            println!("NORMALIZED:\n{}", result.normalized_text);
            if result.matches.is_empty() {
                log_match_failures(library, result);
            }
        }
        if cli.copyrights {
            for statement in &result.copyright_statements {
                println!("COPYRIGHT {}-{}: {}", statement.begins, statement.ends, statement.text);
            }
        }
        if cli.keywords {
            for keyword in &result.keyword_matches {
                println!("KEYWORD {}-{}: {}", keyword.begins, keyword.ends, keyword.text);
            }
        }
        if cli.blocks {
            for (i, block) in result.blocks.iter().enumerate() {
                println!("BLOCK {} {:?}:\n{}", i, block.matches, block.text);
            }
        }
        if !result.notes.is_empty() {
            println!("NOTES: {}", result.notes);
        }
    }
    Ok(())
}

/// With --normalized and no hits, log where each candidate template
/// diverged; this is the first stop when a template was expected to match.
fn log_match_failures(library: &LicenseLibrary, result: &IdentifierResults) {
    if !log::log_enabled!(log::Level::Debug) {
        return;
    }
    for license in library.licenses.values() {
        match lichen::identifier::debug_license_match_failure(license, &result.normalized_text) {
            Ok(reports) => {
                for report in reports {
                    debug!("{}: {report}", license.id());
                }
            }
            Err(err) => debug!("{}: {err}", license.id()),
        }
    }
}

fn print_listing(library: &LicenseLibrary) {
    let listing = library.listing();

    println!("## Licenses");
    println!("| ID | Name | Family | Templates | OSI Approved | FSF Libre |");
    println!("| :--- | :--- | :--- | ---: | :---: | :---: |");
    for l in &listing.licenses {
        println!(
            "| {} | {} | {} | {} | {} | {} |",
            l.id,
            l.name,
            l.family,
            l.num_templates,
            y(l.is_osi_approved),
            y(l.is_fsf_libre)
        );
    }

    println!("\n## Exceptions");
    println!("| ID | Name | Family | Templates |");
    println!("| :--- | :--- | :--- | ---: |");
    for e in &listing.exceptions {
        println!("| {} | {} | {} | {} |", e.id, e.name, e.family, e.num_templates);
    }

    if !listing.deprecated_licenses.is_empty() {
        println!("\n## Deprecated Licenses");
        println!("| ID | Name | Family | Templates |");
        println!("| :--- | :--- | :--- | ---: |");
        for l in &listing.deprecated_licenses {
            println!("| {} | {} | {} | {} |", l.id, l.name, l.family, l.num_templates);
        }
    }
    if !listing.deprecated_exceptions.is_empty() {
        println!("\n## Deprecated Exceptions");
        println!("| ID | Name | Family | Templates |");
        println!("| :--- | :--- | :--- | ---: |");
        for e in &listing.deprecated_exceptions {
            println!("| {} | {} | {} | {} |", e.id, e.name, e.family, e.num_templates);
        }
    }

    if !listing.spdx_version.is_empty() {
        println!("\nSPDX license list version: {}", listing.spdx_version);
    }
}

/// "Y" for true and a blank for false makes readable table cells.
fn y(is_it: bool) -> &'static str {
    if is_it { "Y" } else { " " }
}
