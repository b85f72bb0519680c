//! Composition of base licenses with exception/replacement mutators.
//!
//! SPDX "exception" and "replacement" entries do not stand alone; they bind
//! to a nearby base license (`GPL-2.0-only WITH Classpath-exception-2.0`).
//! A single pass walks the labeled blocks, carrying at most one pending
//! base license and the mutators seen since, and rewrites the affected
//! block labels once a combination is confirmed compatible.

use std::collections::BTreeMap;

use crate::error::ScanError;
use crate::identifier::enhancer::{ACCEPTABLE_LABEL, COPYRIGHT_LABEL, KEYWORD_LABEL};
use crate::identifier::{Block, IdentifierResults, MatchSpan};
use crate::licenses::{License, LicenseInfo};

/// Walk the blocks of `results`, composing compatible base+mutator runs
/// into composite ids. When any composition applied, the match map is
/// rebuilt from the blocks.
pub fn apply_mutator_licenses(
    licenses: &BTreeMap<String, License>,
    results: &mut IdentifierResults,
) -> Result<(), ScanError> {
    let mut previous_licenses: Vec<License> = Vec::new();
    let mut previous_mutators: Vec<License> = Vec::new();
    let mut affected: Vec<usize> = Vec::new();
    let mut applied = false;

    for i in 0..results.blocks.len() {
        let block_matches = results.blocks[i].matches.clone();

        if block_matches.is_empty() {
            // A plain-text block ends the pending run.
            applied |= commit(
                &mut results.blocks,
                &affected,
                &previous_licenses,
                &previous_mutators,
            )?;
            previous_licenses.clear();
            previous_mutators.clear();
            affected.clear();
            continue;
        }

        let mut current_licenses = previous_licenses.clone();
        let mut current_mutators = previous_mutators.clone();
        let mut new_licenses: Vec<License> = Vec::new();
        let mut new_mutators: Vec<License> = Vec::new();

        for m in &block_matches {
            // Labels that are not in the library (enhancer tags, composite
            // ids) collate as anonymous base licenses and break the run.
            let lic = licenses.get(m).cloned().unwrap_or_default();
            if lic.info.is_mutator {
                if !contains_license_id(&current_mutators, m) {
                    current_mutators.push(lic.clone());
                }
                if !contains_license_id(&new_mutators, m) {
                    new_mutators.push(lic);
                }
            } else {
                if !contains_license_id(&current_licenses, m) {
                    current_licenses.push(lic.clone());
                }
                if !contains_license_id(&new_licenses, m) {
                    new_licenses.push(lic);
                }
            }
        }

        if new_licenses.len() > 1 {
            // Two new base licenses in one block; nothing can bind here.
            applied |= commit(
                &mut results.blocks,
                &affected,
                &previous_licenses,
                &previous_mutators,
            )?;
            previous_licenses.clear();
            previous_mutators.clear();
            affected.clear();
        } else if mutators_are_compatible(&current_licenses, &current_mutators) {
            // Defer; this block becomes the run's target.
            previous_licenses = current_licenses;
            previous_mutators = current_mutators;
            affected = vec![i];
        } else {
            // Incompatible; close out the pending run and start fresh from
            // this block's own contributions.
            applied |= commit(
                &mut results.blocks,
                &affected,
                &previous_licenses,
                &previous_mutators,
            )?;
            previous_licenses = new_licenses;
            previous_mutators = new_mutators;
            affected = vec![i];
        }
    }

    if !affected.is_empty() && mutators_are_compatible(&previous_licenses, &previous_mutators) {
        applied |= commit(
            &mut results.blocks,
            &affected,
            &previous_licenses,
            &previous_mutators,
        )?;
    }

    if applied {
        results.matches = recalculate_matches_from_blocks(&results.blocks);
    }
    Ok(())
}

fn commit(
    blocks: &mut [Block],
    affected: &[usize],
    previous_licenses: &[License],
    previous_mutators: &[License],
) -> Result<bool, ScanError> {
    if previous_licenses.len() > 1 {
        return Err(ScanError::InvalidState(
            "should be only one previous base license".to_string(),
        ));
    }
    let Some(base) = previous_licenses.first() else {
        return Ok(false);
    };
    Ok(apply_mutators_in_affected_blocks(
        blocks,
        affected,
        base,
        previous_mutators,
    ))
}

/// Check a combination for incompatibility: more than one base is always
/// incompatible; with one base every mutator must list it as eligible;
/// with no base, two or more mutators must share an eligible license. At
/// most one replacement (non-exception) mutator is allowed either way.
fn mutators_are_compatible(base_licenses: &[License], mutators: &[License]) -> bool {
    let num_licenses = base_licenses.len();
    if num_licenses > 1 {
        return false;
    }
    if mutators.is_empty() {
        return true;
    }

    if num_licenses == 1 {
        let base = &base_licenses[0];
        let mut replacement_count = 0;
        for mutator in mutators {
            if !mutator.info.spdx_exception {
                replacement_count += 1;
                if replacement_count > 1 {
                    return false;
                }
            }
            if !mutator
                .info
                .eligible_licenses
                .iter()
                .any(|id| id == base.id())
            {
                return false;
            }
        }
    } else if mutators.len() > 1 {
        // Every mutator counts toward the replacement limit, the first one
        // included.
        let mut replacement_count = 0;
        for mutator in mutators {
            if !mutator.info.spdx_exception {
                replacement_count += 1;
                if replacement_count > 1 {
                    return false;
                }
            }
        }

        let mut mutual: Vec<String> = Vec::new();
        for (i, mutator) in mutators.iter().enumerate() {
            if i == 0 {
                mutual = mutator.info.eligible_licenses.clone();
            } else {
                if mutator.info.eligible_licenses.is_empty() {
                    return false;
                }
                mutual.retain(|id| mutator.info.eligible_licenses.contains(id));
            }
            if mutual.is_empty() {
                return false;
            }
        }
    }

    true
}

/// Compose `base` with `mutators` into a single license. A replacement
/// mutator overwrites the identity and standard flag first; each exception
/// then appends ` WITH <exception id>` and the result only stays
/// SPDX-standard if every exception is.
fn compose_mutated_license(base: &License, mutators: &[License]) -> License {
    let mut replacement: Option<&License> = None;
    let mut exceptions: Vec<&License> = Vec::new();
    for mutator in mutators {
        if mutator.info.spdx_exception {
            exceptions.push(mutator);
        } else {
            replacement = Some(mutator);
        }
    }

    let mut composite = License {
        spdx_id: base.spdx_id.clone(),
        info: LicenseInfo {
            name: base.info.name.clone(),
            spdx_standard: base.info.spdx_standard,
            osi_approved: base.info.osi_approved,
            ..LicenseInfo::default()
        },
        ..License::default()
    };

    if let Some(replacement) = replacement {
        composite.spdx_id = replacement.spdx_id.clone();
        composite.info.name = replacement.info.name.clone();
        composite.info.spdx_standard = replacement.info.spdx_standard;
    }
    for exception in &exceptions {
        composite.spdx_id = format!("{} WITH {}", composite.spdx_id, exception.spdx_id);
        composite.info.name = format!("{} with {}", composite.info.name, exception.info.name);
        composite.info.spdx_standard =
            composite.info.spdx_standard && exception.info.spdx_standard;
    }

    composite
}

/// Append the composite license's id to every affected block.
fn apply_mutators_in_affected_blocks(
    blocks: &mut [Block],
    affected: &[usize],
    base: &License,
    mutators: &[License],
) -> bool {
    if mutators.is_empty() || affected.is_empty() {
        return false;
    }

    let composite = compose_mutated_license(base, mutators);
    let composite_id = composite.id().to_string();
    for &i in affected {
        blocks[i].matches.push(composite_id.clone());
    }

    true
}

/// Rebuild the match map by walking the blocks in order; enhancer labels
/// and unlabeled blocks are skipped.
fn recalculate_matches_from_blocks(blocks: &[Block]) -> BTreeMap<String, Vec<MatchSpan>> {
    let mut matches: BTreeMap<String, Vec<MatchSpan>> = BTreeMap::new();

    let mut offset = 0usize;
    for block in blocks {
        let begins = offset;
        let ends = offset + block.text.len().saturating_sub(1);
        offset += block.text.len();

        for license_id in &block.matches {
            match license_id.as_str() {
                "" | COPYRIGHT_LABEL | KEYWORD_LABEL | ACCEPTABLE_LABEL => continue,
                _ => matches
                    .entry(license_id.clone())
                    .or_default()
                    .push(MatchSpan { begins, ends }),
            }
        }
    }
    matches
}

fn contains_license_id(licenses: &[License], id: &str) -> bool {
    if id.is_empty() {
        return false;
    }
    licenses.iter().any(|l| l.id() == id)
}
