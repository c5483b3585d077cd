//! Include-globality oracle.
//!
//! An include is global when it could be hoisted to the top of the
//! translation unit: the included and including files are identifiable by
//! real path, the including file was not itself pulled in at a non-global
//! location, and the directive does not sit inside any declaration.

use std::collections::BTreeSet;

use crate::common::source::{SourceManager, Span};

/// Result of checking one include record.
pub struct IncludeCheck {
    pub valid: bool,
    pub included_file_name: String,
}

/// Check one `#include` record against the §-ordered validity rules.
/// Failed includes poison `local_includes` with the included file's real
/// path so its transitive includes report non-global too.
pub fn is_global_include(
    sm: &SourceManager,
    included_file: Option<u32>,
    hash_loc: Span,
    local_includes: &mut BTreeSet<String>,
    decl_ranges: &[Span],
) -> IncludeCheck {
    // The included file must exist and have a real path.
    let Some(included_fid) = included_file else {
        return fail(local_includes, String::new());
    };
    let Some(included_realpath) = sm.real_path(included_fid).map(|s| s.to_string()) else {
        return fail(local_includes, String::new());
    };
    if included_realpath.is_empty() {
        return fail(local_includes, included_realpath);
    }

    // The hash location and the including file must be identifiable.
    if !hash_loc.is_valid() {
        return fail(local_includes, included_realpath);
    }
    let including_realpath = match sm.real_path(hash_loc.file_id) {
        Some(p) if !p.is_empty() => p.to_string(),
        _ => return fail(local_includes, included_realpath),
    };

    // The including file must not itself have been included locally.
    if local_includes.contains(&including_realpath) {
        return fail(local_includes, included_realpath);
    }

    // The directive must not sit inside any declaration.
    let inside_decl = decl_ranges.iter().any(|range| {
        range.is_valid()
            && range.file_id == hash_loc.file_id
            && range.start <= hash_loc.start
            && hash_loc.start < range.end
    });
    if inside_decl {
        return fail(local_includes, included_realpath);
    }

    IncludeCheck { valid: true, included_file_name: included_realpath }
}

fn fail(local_includes: &mut BTreeSet<String>, included_realpath: String) -> IncludeCheck {
    if !included_realpath.is_empty() {
        local_includes.insert(included_realpath.clone());
    }
    IncludeCheck { valid: false, included_file_name: included_realpath }
}
