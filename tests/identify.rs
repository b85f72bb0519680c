//! End-to-end identification tests over the bundled resource set and the
//! fixture sets under `testdata/`.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use lichen::config::Config;
use lichen::error::ScanError;
use lichen::identifier::{
    Enhancements, MatchSpan, Options, identify_licenses_in_directory, identify_licenses_in_file,
    identify_licenses_in_string,
};
use lichen::licenses::LicenseLibrary;
use lichen::scanner::{NOASSERTION, ScanSpec, ScanSpecs};

const MIT_TEXT: &str = "Copyright <YEAR> <COPYRIGHT HOLDER>\n\nPermission is hereby granted, free of charge, to any person obtaining a copy of this software and associated documentation files (the \"Software\"), to deal in the Software without restriction, including without limitation the rights to use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of the Software, and to permit persons to whom the Software is furnished to do so, subject to the following conditions:\n\nThe above copyright notice and this permission notice shall be included in all copies or substantial portions of the Software.\n\nTHE SOFTWARE IS PROVIDED \"AS IS\", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.";

fn default_options() -> Options {
    Options {
        force_result: false,
        omit_blocks: false,
        enhancements: Enhancements {
            add_notes: String::new(),
            add_text_blocks: true,
            flag_acceptable: false,
            flag_copyrights: true,
            flag_keywords: false,
        },
    }
}

fn default_library() -> LicenseLibrary {
    LicenseLibrary::load(&Config::default()).unwrap()
}

fn span(begins: usize, ends: usize) -> MatchSpan {
    MatchSpan { begins, ends }
}

fn block_texts(results: &lichen::identifier::IdentifierResults) -> Vec<&str> {
    results.blocks.iter().map(|b| b.text.as_str()).collect()
}

#[test]
fn test_unknown_text_has_no_matches() {
    let library = default_library();
    let results =
        identify_licenses_in_string("unrecognizable garbage", &default_options(), &library)
            .unwrap();
    assert!(results.matches.is_empty());
    assert_eq!(block_texts(&results), vec!["unrecognizable garbage"]);
}

#[test]
fn test_no_license_found_hashes() {
    let library = default_library();
    let results = identify_licenses_in_string(
        "This does not contain a license pattern.",
        &default_options(),
        &library,
    )
    .unwrap();
    assert!(results.matches.is_empty());
    assert_eq!(results.hash.md5, "197a64f01031cf1fc53edcc2b736f13e");
    assert_eq!(
        results.hash.sha256,
        "53b3136e2da71e3fa4058ddf365d26dc069405ef74283841e5b792cc1cc8a072"
    );
    assert_eq!(
        results.hash.sha512,
        "a58d7ea8a02b188545c594103dc18856bdebd065e7bc2b6c652fe247bd690906cda5a77bba90e141dfc5ae91200247de9862f394559c604fa7843b6bc5dd5a92"
    );
}

#[test]
fn test_mit_license_text_matches_template() {
    let library = default_library();
    let results = identify_licenses_in_string(MIT_TEXT, &default_options(), &library).unwrap();

    assert_eq!(
        results.matches.keys().collect::<Vec<_>>(),
        vec!["MIT"],
        "matches: {:?}",
        results.matches
    );
    assert_eq!(results.matches["MIT"], vec![span(0, MIT_TEXT.len() - 1)]);
    assert_eq!(block_texts(&results), vec![MIT_TEXT]);
    assert_eq!(results.blocks[0].matches, vec!["MIT".to_string()]);
    // The copyright line is part of the matched block, so nothing is
    // flagged separately.
    assert!(results.copyright_statements.is_empty());
}

#[test]
fn test_alias_without_word_boundary_is_rejected() {
    let library = default_library();
    let input = "aPaChE lIcEnSe vErSiOn 2.0This prefix does not have a word boundary.";
    let results = identify_licenses_in_string(input, &default_options(), &library).unwrap();
    assert!(results.matches.is_empty());
    assert_eq!(block_texts(&results), vec![input]);
    assert_eq!(results.hash.md5, "8d13ad17778489feed6f6e75b54f19f1");
}

#[test]
fn test_alias_matches_prefix() {
    let library = default_library();
    let input = "aPaChE lIcEnSe vErSiOn 2.0 This does not contain a license pattern.";
    let results = identify_licenses_in_string(input, &default_options(), &library).unwrap();
    assert_eq!(results.matches["Apache-2.0"], vec![span(0, 26)]);
    assert_eq!(
        block_texts(&results),
        vec![
            "aPaChE lIcEnSe vErSiOn 2.0 ",
            "This does not contain a license pattern."
        ]
    );
    assert_eq!(results.hash.md5, "f9c220c72b1a7e3b6b7741590bf0b25a");
}

#[test]
fn test_alias_matches_suffix() {
    let library = default_library();
    let input = "This does not contain a license pattern aPaChE lIcEnSe vErSiOn 2.0";
    let results = identify_licenses_in_string(input, &default_options(), &library).unwrap();
    assert_eq!(results.matches["Apache-2.0"], vec![span(39, 65)]);
    assert_eq!(
        block_texts(&results),
        vec![
            "This does not contain a license pattern",
            " aPaChE lIcEnSe vErSiOn 2.0"
        ]
    );
    assert_eq!(results.hash.md5, "6b7ebb3e66a277d166bfad4ce167f414");
}

#[test]
fn test_alias_matches_in_middle() {
    let library = default_library();
    let input = "Yada yada aPaChE lIcEnSe vErSiOn 2.0 and so on...";
    let results = identify_licenses_in_string(input, &default_options(), &library).unwrap();
    assert_eq!(results.matches["Apache-2.0"], vec![span(9, 36)]);
    assert_eq!(
        block_texts(&results),
        vec!["Yada yada", " aPaChE lIcEnSe vErSiOn 2.0 ", "and so on..."]
    );
    assert_eq!(results.hash.md5, "973c67458632165e33afadd87f4d360d");
}

#[test]
fn test_name_match_in_middle() {
    let library = default_library();
    let input = "Yada yada aPaChE lIcEnSe 2.0 and so on...";
    let results = identify_licenses_in_string(input, &default_options(), &library).unwrap();
    assert_eq!(results.matches["Apache-2.0"], vec![span(9, 28)]);
    assert_eq!(
        block_texts(&results),
        vec!["Yada yada", " aPaChE lIcEnSe 2.0 ", "and so on..."]
    );
    assert_eq!(results.hash.md5, "cb14e5af98581e2fb982385f746e27f8");
}

#[test]
fn test_id_match_in_middle() {
    let library = default_library();
    let input = "Yada yada aPaChE-2.0 and so on...";
    let results = identify_licenses_in_string(input, &default_options(), &library).unwrap();
    assert_eq!(results.matches["Apache-2.0"], vec![span(9, 20)]);
    assert_eq!(
        block_texts(&results),
        vec!["Yada yada", " aPaChE-2.0 ", "and so on..."]
    );
    assert_eq!(results.hash.md5, "049faf27dd1bf6186f7f40f22c13626b");
}

#[test]
fn test_parenthesized_id_match() {
    let library = default_library();
    let input = "Yada yada (aPaChE-2.0) and so on...";
    let results = identify_licenses_in_string(input, &default_options(), &library).unwrap();
    assert_eq!(results.matches["Apache-2.0"], vec![span(9, 22)]);
    assert_eq!(
        block_texts(&results),
        vec!["Yada yada", " (aPaChE-2.0) ", "and so on..."]
    );
    assert_eq!(results.hash.md5, "4773f569ce06a6fadae3eceaccd7a360");
}

#[test]
fn test_url_match_with_trailing_fragment() {
    let library = default_library();
    let input = "Yada yada http://www.apache.org/licenses/LICENSE-2.0/etc... and so on...";
    let results = identify_licenses_in_string(input, &default_options(), &library).unwrap();
    assert_eq!(results.matches["Apache-2.0"], vec![span(9, 59)]);
    assert_eq!(
        block_texts(&results),
        vec![
            "Yada yada",
            " http://www.apache.org/licenses/LICENSE-2.0/etc... ",
            "and so on..."
        ]
    );
    assert_eq!(results.hash.md5, "df45de0253f3a3467dcb4e0241186ff6");
}

#[test]
fn test_empty_input_is_invalid() {
    let library = default_library();
    match identify_licenses_in_string("", &default_options(), &library) {
        Err(ScanError::InvalidInput(msg)) => assert!(msg.contains("length 0")),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_scan_spec_empty_text_keeps_error_and_empty_licenses() {
    let library = default_library();
    let mut cache = HashMap::new();
    let spec = ScanSpec {
        license_text: String::new(),
        ..ScanSpec::default()
    };
    let result = spec.scan_license_text(&library, &mut cache);
    assert!(matches!(result.error, Some(ScanError::InvalidInput(_))));
    assert!(result.licenses.is_empty());
}

#[test]
fn test_scan_spec_no_match_is_noassertion() {
    let library = default_library();
    let mut cache = HashMap::new();
    let spec = ScanSpec {
        license_text: "unrecognizable garbage".to_string(),
        ..ScanSpec::default()
    };
    let result = spec.scan_license_text(&library, &mut cache);
    assert!(result.error.is_none());
    assert_eq!(
        result.licenses[0].license.as_ref().unwrap().name,
        NOASSERTION
    );
}

#[test]
fn test_mutator_composes_with_base_license() {
    let library = default_library();
    let input = "GPL-2.0-only\nClasspath exception 2.0 applies.";
    let results = identify_licenses_in_string(input, &default_options(), &library).unwrap();

    assert_eq!(results.matches["GPL-2.0-only"], vec![span(0, 12)]);
    assert_eq!(
        results.matches["GPL-2.0-only WITH Classpath-exception-2.0"],
        vec![span(13, 32)]
    );
    let composed_block = results
        .blocks
        .iter()
        .find(|b| {
            b.matches
                .contains(&"GPL-2.0-only WITH Classpath-exception-2.0".to_string())
        })
        .expect("a block carries the composed id");
    assert!(composed_block.matches.contains(&"Classpath-exception-2.0".to_string()));
}

#[test]
fn test_mutator_does_not_bind_to_ineligible_base() {
    let library = default_library();
    let input = "MIT\nClasspath exception 2.0 applies.";
    let results = identify_licenses_in_string(input, &default_options(), &library).unwrap();
    // MIT has no aliases in the library, so only the exception matches and
    // it has no base to bind to.
    assert!(results.matches.contains_key("Classpath-exception-2.0"));
    assert!(
        !results
            .matches
            .keys()
            .any(|id| id.contains(" WITH "))
    );
}

#[test]
fn test_acceptable_blocks_are_flagged() {
    let library = default_library();
    let input = "aPaChE lIcEnSe vErSiOn 2.0 All rights reserved.";
    let options = Options {
        enhancements: Enhancements {
            flag_acceptable: true,
            ..Enhancements::default()
        },
        ..Options::default()
    };
    let results = identify_licenses_in_string(input, &options, &library).unwrap();
    assert_eq!(results.matches["Apache-2.0"], vec![span(0, 26)]);
    let acceptable = results
        .blocks
        .iter()
        .find(|b| b.matches == vec!["ACCEPTABLE".to_string()])
        .expect("an acceptable block");
    assert_eq!(acceptable.text, "All rights reserved.");
}

#[test]
fn test_precheck_fixture_sets() {
    let no_prechecks = Config {
        spdx_path: Some(PathBuf::from("testdata/prechecks/no_prechecks")),
        custom_path: Some(PathBuf::from("testdata/prechecks/no_prechecks")),
        ..Config::default()
    };
    let library = LicenseLibrary::load(&no_prechecks).unwrap();
    let results = identify_licenses_in_string(
        "whatever noprechecktext whatever passes",
        &default_options(),
        &library,
    )
    .unwrap();
    assert_eq!(results.matches["NoPreCheckTest"], vec![span(9, 22)]);
    assert_eq!(
        block_texts(&results),
        vec!["whatever ", "noprechecktext", " whatever passes"]
    );
}

#[test]
fn test_static_precheck_pass_and_fail() {
    let config = Config {
        spdx_path: Some(PathBuf::from("testdata/prechecks/static_prechecks")),
        custom_path: Some(PathBuf::from("testdata/prechecks/static_prechecks")),
        ..Config::default()
    };
    let library = LicenseLibrary::load(&config).unwrap();

    let passing = identify_licenses_in_string(
        "this matches template and it also passes the static body checks",
        &default_options(),
        &library,
    )
    .unwrap();
    assert_eq!(passing.matches["Template"], vec![span(13, 20)]);
    assert_eq!(
        block_texts(&passing),
        vec![
            "this matches ",
            "template",
            " and it also passes the static body checks"
        ]
    );

    let failing = identify_licenses_in_string(
        "this matches template but does NOT pass the static body checks",
        &default_options(),
        &library,
    )
    .unwrap();
    assert!(failing.matches.is_empty());
    assert_eq!(
        block_texts(&failing),
        vec!["this matches template but does NOT pass the static body checks"]
    );
}

#[test]
fn test_duplicate_pattern_matches_are_deduplicated() {
    let config = Config {
        spdx_path: Some(PathBuf::from("testdata/duplicates")),
        custom_path: Some(PathBuf::from("testdata/duplicates")),
        ..Config::default()
    };
    let library = LicenseLibrary::load(&config).unwrap();
    let results = identify_licenses_in_string(
        "whatever noprechecktext whatever passes",
        &default_options(),
        &library,
    )
    .unwrap();
    assert_eq!(results.matches["DuplicateMatchTest"], vec![span(9, 22)]);
    assert_eq!(
        block_texts(&results),
        vec!["whatever ", "noprechecktext", " whatever passes"]
    );
}

#[test]
fn test_identify_file_missing() {
    let library = default_library();
    let missing = PathBuf::from("/not_a_real_path/this_is_not_an_existing_file_we_hope");
    match identify_licenses_in_file(&missing, &default_options(), &library) {
        Err(ScanError::ResourceNotFound { .. }) => {}
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_identify_file_too_large() {
    let library = default_library();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("huge.txt");
    fs::write(&path, vec![b'a'; 1_000_001]).unwrap();
    match identify_licenses_in_file(&path, &default_options(), &library) {
        Err(ScanError::InvalidInput(msg)) => assert!(msg.contains("file too large")),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_identify_directory_collects_results_and_first_error() {
    let library = default_library();
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("mit.txt"), MIT_TEXT).unwrap();
    fs::write(dir.path().join("plain.txt"), "no license in here").unwrap();
    fs::write(dir.path().join("empty.txt"), "").unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    fs::write(
        dir.path().join("sub/binary.bin"),
        [0x00u8, 0x01, 0x02, 0x03],
    )
    .unwrap();

    let scan = identify_licenses_in_directory(dir.path(), &default_options(), &library);
    // The empty file is skipped, the binary one errors, the other two scan.
    assert_eq!(scan.results.len(), 2);
    assert!(matches!(scan.error, Some(ScanError::InvalidInput(_))));
    let mit = scan
        .results
        .iter()
        .find(|r| r.file.ends_with("mit.txt"))
        .expect("mit.txt result");
    assert!(mit.matches.contains_key("MIT"));
}

#[test]
fn test_keywords_and_notes_enhancements() {
    let library = default_library();
    let options = Options {
        enhancements: Enhancements {
            add_notes: "scanned by test".to_string(),
            flag_keywords: true,
            ..Enhancements::default()
        },
        ..Options::default()
    };
    let results = identify_licenses_in_string(
        "This project is dual-licensed; see COPYING for the LGPL text.",
        &options,
        &library,
    )
    .unwrap();
    assert_eq!(results.notes, "scanned by test");
    let keyword_texts: Vec<&str> = results
        .keyword_matches
        .iter()
        .map(|k| k.text.as_str())
        .collect();
    assert_eq!(keyword_texts, vec!["dual-licensed", "LGPL"]);
    assert!(
        results
            .blocks
            .iter()
            .any(|b| b.matches == vec!["KEYWORD".to_string()])
    );
}

#[test]
fn test_omit_blocks_clears_blocks_only() {
    let library = default_library();
    let options = Options {
        omit_blocks: true,
        ..Options::default()
    };
    let results = identify_licenses_in_string(
        "Yada yada aPaChE-2.0 and so on...",
        &options,
        &library,
    )
    .unwrap();
    assert!(results.blocks.is_empty());
    assert_eq!(results.matches["Apache-2.0"], vec![span(9, 20)]);
}

#[test]
fn test_results_serialize_to_json() {
    let library = default_library();
    let results = identify_licenses_in_string(
        "Yada yada aPaChE-2.0 and so on...",
        &default_options(),
        &library,
    )
    .unwrap();
    let json = serde_json::to_value(&results).unwrap();
    assert_eq!(json["matches"]["Apache-2.0"][0]["begins"], 9);
    assert_eq!(json["matches"]["Apache-2.0"][0]["ends"], 20);
    assert_eq!(json["hash"]["md5"], "049faf27dd1bf6186f7f40f22c13626b");
    assert_eq!(json["blocks"][1]["matches"][0], "Apache-2.0");
}

#[test]
fn test_scan_specs_batch_shares_cache() {
    let library = default_library();
    let specs = ScanSpecs {
        package_manager: "npm".to_string(),
        specs: vec![
            ScanSpec {
                name: "a".to_string(),
                license_text: "Yada yada aPaChE-2.0 and so on...".to_string(),
                ..ScanSpec::default()
            },
            // Same canonical form as the first spec.
            ScanSpec {
                name: "b".to_string(),
                license_text: "yada  yada apache-2.0 and so on...".to_string(),
                ..ScanSpec::default()
            },
        ],
        ..ScanSpecs::default()
    };
    let results = specs.scan_license_text(&library);
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].hash, results[1].hash);
    let license = results[0].licenses[0].license.as_ref().unwrap();
    assert_eq!(license.id, "Apache-2.0");
    assert_eq!(license.name, "Apache License 2.0 (Apache)");
    assert_eq!(results[1].licenses, results[0].licenses);
}

#[test]
fn test_library_listing() {
    let library = default_library();
    let listing = library.listing();
    assert_eq!(listing.spdx_version, "3.23");

    let ids: Vec<&str> = listing.licenses.iter().map(|l| l.id.as_str()).collect();
    assert!(ids.contains(&"MIT"));
    assert!(ids.contains(&"Apache-2.0"));
    assert!(ids.contains(&"GPL-2.0-only"));

    let exception_ids: Vec<&str> = listing.exceptions.iter().map(|e| e.id.as_str()).collect();
    assert!(exception_ids.contains(&"Classpath-exception-2.0"));

    let mit = listing.licenses.iter().find(|l| l.id == "MIT").unwrap();
    assert!(mit.is_osi_approved);
    assert_eq!(mit.num_templates, 1);
}
