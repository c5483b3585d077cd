//! Translation-unit analysis: wires the preprocessor observers, the
//! frontend pipeline, the auxiliary index, and the per-expansion property
//! evaluation into one pass producing the report.

use std::collections::BTreeSet;

use tracing::debug;

use crate::common::error::Result;
use crate::common::source::SourceManager;
use crate::frontend::parser::parse_translation_unit;
use crate::frontend::preprocessor::{FileLoader, PpCallbacks, Preprocessor};
use crate::frontend::sema;

use super::alignment::find_aligned_ast_nodes_for_expansion;
use super::collectors::{DefinitionInfoCollector, IncludeCollector};
use super::forest::MacroForest;
use super::include_check::is_global_include;
use super::index::AuxiliaryIndex;
use super::properties::{evaluate_top_level, EvalContext};
use super::report::{render, ReportLine};

/// The analysis result: report lines in emission order.
#[derive(Debug)]
pub struct AnalysisOutput {
    pub lines: Vec<ReportLine>,
}

impl AnalysisOutput {
    /// Render the report in the documented line-oriented format.
    pub fn render(&self) -> String {
        render(&self.lines)
    }
}

/// Analyze one C source file as a translation unit.
///
/// `real_path` is the path the report uses for locations in the main file;
/// includes are resolved through `loader`; `defines` are `-D` style
/// command-line definitions.
pub fn analyze_source(
    name: &str,
    real_path: Option<&str>,
    content: &str,
    loader: &dyn FileLoader,
    defines: &[String],
) -> Result<AnalysisOutput> {
    let mut sm = SourceManager::new();
    let main_fid = sm.add_file(name.to_string(), real_path.map(|s| s.to_string()), content.to_string());

    let mut forest = MacroForest::new();
    let mut includes = IncludeCollector::new();
    let mut definitions = DefinitionInfoCollector::new();

    let toks = {
        let callbacks: Vec<&mut dyn PpCallbacks> =
            vec![&mut forest, &mut includes, &mut definitions];
        let mut pp = Preprocessor::new(&mut sm, loader, callbacks);
        for d in defines {
            pp.add_command_line_define(d)?;
        }
        pp.run_main(main_fid)?
    };
    if let Some(err) = forest.take_error() {
        return Err(err);
    }
    debug!(tokens = toks.len(), expansions = forest.nodes.len(), "preprocessed");

    let ast = parse_translation_unit(&toks, &sm)?;
    let sema = sema::run(&ast, &toks, &sm);
    let index = AuxiliaryIndex::build(&ast, &toks, &sema);

    // Fill the content-addressing hash of each expansion now that the
    // source manager can render definition locations.
    for node in &mut forest.nodes {
        let loc = sm
            .try_get_full_source_loc(node.definition_loc)
            .unwrap_or_else(|e| e.to_string());
        node.macro_hash = format!("{};{}", node.name, loc);
    }

    let mut lines = Vec::new();

    // Definition information observed by the preprocessor.
    for (name, def_span) in &definitions.macro_names_definitions {
        match sm.try_get_full_source_loc(*def_span) {
            Ok(loc) => lines.push(ReportLine::Definition {
                name: name.clone(),
                valid: true,
                loc_or_error: loc,
            }),
            Err(e) => lines.push(ReportLine::Definition {
                name: name.clone(),
                valid: false,
                loc_or_error: e.to_string(),
            }),
        }
    }

    // Names of macros inspected by the preprocessor.
    for name in &definitions.inspected_macro_names {
        lines.push(ReportLine::InspectedByCpp { name: name.clone() });
    }

    // Include-directive information.
    {
        let decl_ranges: Vec<_> = index.decl_ranges.iter().map(|(_, span)| *span).collect();
        let mut local_includes = BTreeSet::new();
        for &(file_id, hash_loc) in &includes.include_entries_locs {
            let check =
                is_global_include(&sm, file_id, hash_loc, &mut local_includes, &decl_ranges);
            lines.push(ReportLine::Include {
                valid: check.valid,
                name: check.included_file_name,
            });
        }
    }

    // Macro expansion information.
    let ctx = EvalContext {
        ast: &ast,
        toks: &toks,
        sema: &sema,
        sm: &sm,
        index: &index,
        inspected: &definitions.inspected_macro_names,
    };
    for idx in 0..forest.nodes.len() {
        let node = &forest.nodes[idx];
        // Nested macro invocations and macro arguments stop here.
        if node.depth != 0 || node.in_macro_arg {
            lines.push(if node.depth != 0 {
                ReportLine::NestedInvocation { name: node.name.clone() }
            } else {
                ReportLine::InvokedInMacroArgument { name: node.name.clone() }
            });
            continue;
        }

        find_aligned_ast_nodes_for_expansion(&mut forest.nodes[idx], &ast, &toks);
        let record = evaluate_top_level(&forest, idx, &ctx);
        lines.push(ReportLine::TopLevel(Box::new(record)));
    }

    Ok(AnalysisOutput { lines })
}
