//! End-to-end analysis scenarios: each test preprocesses, parses, and
//! analyzes a small C translation unit, then checks the derived properties
//! of the interesting top-level expansions.

use macrolens::analysis::{analyze_source, InvocationRecord, ReportLine};
use macrolens::VirtualLoader;

fn analyze_with_headers(src: &str, headers: &[(&str, &str)]) -> Vec<ReportLine> {
    let mut loader = VirtualLoader::new();
    for (name, content) in headers {
        loader.add(name, content);
    }
    analyze_source("main.c", Some("/virtual/main.c"), src, &loader, &[])
        .expect("analysis failed")
        .lines
}

fn analyze(src: &str) -> Vec<ReportLine> {
    analyze_with_headers(src, &[])
}

fn top_level<'a>(lines: &'a [ReportLine], name: &str) -> &'a InvocationRecord {
    lines
        .iter()
        .find_map(|l| match l {
            ReportLine::TopLevel(r) if r.name == name => Some(&**r),
            _ => None,
        })
        .unwrap_or_else(|| panic!("no top-level record for {}", name))
}

#[test]
fn simple_function_like_macro_aligns_as_expression() {
    let lines = analyze(
        "#define ADD(a,b) ((a)+(b))\n\
         int x = ADD(1, 2);\n",
    );
    let rec = top_level(&lines, "ADD");
    assert_eq!(rec.ast_kind, "Expr");
    assert_eq!(rec.num_ast_roots, 1);
    assert_eq!(rec.num_arguments, 2);
    assert!(!rec.is_object_like);
    assert!(rec.has_aligned_arguments);
    assert!(rec.is_hygienic);
    assert!(!rec.does_any_argument_have_side_effects);
    assert_eq!(rec.type_signature, "int(int, int)");
    assert!(rec.is_definition_location_valid);
    assert_eq!(rec.definition_location, "/virtual/main.c:1:9");
    assert!(rec.is_invocation_location_valid);
    assert_eq!(rec.invocation_location, "/virtual/main.c:2:9");
    assert!(rec.is_expansion_ice);
}

#[test]
fn callee_side_increment_requires_modifiable_argument() {
    let lines = analyze(
        "#define INC(x) (x)++\n\
         void f(void) { int y; INC(y); }\n",
    );
    let rec = top_level(&lines, "INC");
    assert_eq!(rec.ast_kind, "Expr");
    assert!(rec.has_aligned_arguments);
    assert!(rec.is_any_argument_expanded_where_modifiable_value_required);
    assert!(!rec.does_any_argument_have_side_effects);
    assert!(!rec.does_body_contain_decl_ref_expr);
    assert!(!rec.is_invoked_where_modifiable_value_required);
}

#[test]
fn callee_side_address_of_requires_addressable_argument() {
    let lines = analyze(
        "#define PTR(p) &(p)\n\
         void f(void) { int v; int *q = PTR(v); }\n",
    );
    let rec = top_level(&lines, "PTR");
    assert!(rec.is_any_argument_expanded_where_addressable_value_required);
    assert!(!rec.is_any_argument_expanded_where_modifiable_value_required);
    assert_eq!(rec.type_signature, "int *(int)");
}

#[test]
fn short_circuit_conditionally_evaluates_arguments() {
    let lines = analyze(
        "#define AND(a,b) ((a) && (b))\n\
         int f(void);\n\
         int g(void);\n\
         int use(void) { int ok = AND(f(), g()); return ok; }\n",
    );
    let rec = top_level(&lines, "AND");
    assert!(rec.has_aligned_arguments);
    assert!(rec.is_any_argument_conditionally_evaluated);
    assert!(rec.does_any_argument_contain_decl_ref_expr);
    assert_eq!(rec.type_signature, "int(int, int)");
}

#[test]
fn object_like_constant_in_array_size_is_ice_context() {
    let lines = analyze(
        "#define ZERO 0\n\
         int a[ZERO];\n",
    );
    let rec = top_level(&lines, "ZERO");
    assert_eq!(rec.ast_kind, "Expr");
    assert!(rec.is_object_like);
    assert_eq!(rec.num_arguments, 0);
    assert!(rec.is_expansion_ice);
    assert!(rec.is_invoked_where_ice_required);
}

#[test]
fn capturing_a_local_is_unhygienic() {
    let lines = analyze(
        "#define USE_LOCAL (lv + 1)\n\
         void f(void) { int lv; int r = USE_LOCAL; }\n",
    );
    let rec = top_level(&lines, "USE_LOCAL");
    assert_eq!(rec.ast_kind, "Expr");
    assert!(!rec.is_hygienic);
    assert!(rec.does_body_contain_decl_ref_expr);
}

#[test]
fn parens_around_parameter_still_align() {
    let lines = analyze(
        "#define PAREN(x) (x)\n\
         int q = PAREN(3);\n",
    );
    let rec = top_level(&lines, "PAREN");
    assert_eq!(rec.ast_kind, "Expr");
    assert_eq!(rec.num_ast_roots, 1);
    assert!(rec.has_aligned_arguments);
}

#[test]
fn goto_in_expansion_is_control_flow() {
    let lines = analyze(
        "#define JUMP goto done;\n\
         void f(void) { JUMP done: ; }\n",
    );
    let rec = top_level(&lines, "JUMP");
    assert_eq!(rec.ast_kind, "Stmt");
    assert!(rec.does_expansion_have_control_flow_stmt);
}

#[test]
fn stringification_breaks_alignment() {
    let lines = analyze(
        "#define STR(x) #x\n\
         const char *s = STR(hello);\n",
    );
    let rec = top_level(&lines, "STR");
    assert!(rec.has_stringification);
    assert!(!rec.has_token_pasting);
    assert_eq!(rec.num_ast_roots, 0);
    assert_eq!(rec.ast_kind, "");
    // The only use of the argument is stringified, so it is never expanded,
    // and zero aligned roots match zero expansions.
    assert!(rec.has_aligned_arguments);
    assert!(rec.is_any_argument_never_expanded);
}

#[test]
fn type_specifier_macro_aligns_as_type_loc() {
    let lines = analyze(
        "#define UINT unsigned int\n\
         UINT v;\n",
    );
    let rec = top_level(&lines, "UINT");
    assert_eq!(rec.ast_kind, "TypeLoc");
    assert_eq!(rec.num_ast_roots, 1);
    assert!(!rec.is_expansion_type_null);
}

#[test]
fn void_call_expansion_has_void_type() {
    let lines = analyze(
        "#define NOP f()\n\
         void f(void);\n\
         void g(void) { NOP; }\n",
    );
    let rec = top_level(&lines, "NOP");
    assert_eq!(rec.ast_kind, "Expr");
    assert!(rec.is_expansion_type_void);
    assert!(!rec.is_expansion_type_null);
    assert_eq!(rec.type_signature, "void");
}

#[test]
fn body_subexpression_with_local_struct_type() {
    let lines = analyze(
        "#define FIRST(p) ((p).x)\n\
         void h(void) { struct pt { int x; } v; int k = FIRST(v); }\n",
    );
    let rec = top_level(&lines, "FIRST");
    assert_eq!(rec.ast_kind, "Expr");
    assert!(rec.does_subexpression_expanded_from_body_have_local_type);
    // The expansion itself is the int member, not the local struct.
    assert!(!rec.is_expansion_type_local_type);
    assert!(rec.is_any_argument_type_local_type);
}

#[test]
fn body_reference_to_decl_declared_after_macro() {
    let lines = analyze(
        "#define CALL_LATER later_fn()\n\
         int later_fn(void);\n\
         void u(void) { int r = CALL_LATER; }\n",
    );
    let rec = top_level(&lines, "CALL_LATER");
    assert!(rec.does_body_contain_decl_ref_expr);
    assert!(rec.does_body_reference_decl_declared_after_macro);
    assert!(rec.is_hygienic);
}

#[test]
fn expansion_type_defined_after_macro_through_typedef() {
    let lines = analyze(
        "#define GETI (mk())\n\
         typedef int myint;\n\
         myint mk(void);\n\
         void w(void) { myint q = GETI; }\n",
    );
    let rec = top_level(&lines, "GETI");
    assert_eq!(rec.ast_kind, "Expr");
    assert!(rec.is_expansion_type_defined_after_macro);
    // Canonical rendering desugars the typedef.
    assert_eq!(rec.type_signature, "int");
}

#[test]
fn macro_invoked_inside_argument_reports_separately() {
    let lines = analyze(
        "#define ZERO 0\n\
         #define ADD(a,b) ((a)+(b))\n\
         int y = ADD(ZERO, 1);\n",
    );
    assert!(lines
        .iter()
        .any(|l| matches!(l, ReportLine::InvokedInMacroArgument { name } if name == "ZERO")));
    let rec = top_level(&lines, "ADD");
    assert!(rec.has_aligned_arguments);
    assert_eq!(rec.num_ast_roots, 1);
}

#[test]
fn nested_invocations_report_name_only() {
    let lines = analyze(
        "#define ONE 1\n\
         #define TWO (ONE + ONE)\n\
         int z = TWO;\n",
    );
    let nested: Vec<_> = lines
        .iter()
        .filter(|l| matches!(l, ReportLine::NestedInvocation { name } if name == "ONE"))
        .collect();
    assert_eq!(nested.len(), 2);
    let rec = top_level(&lines, "TWO");
    // ONE was defined before TWO.
    assert!(!rec.does_body_reference_macro_defined_after_macro);
    assert_eq!(rec.num_ast_roots, 1);
}

#[test]
fn body_reference_to_macro_defined_after() {
    let lines = analyze(
        "#define TWO (ONE + ONE)\n\
         #define ONE 1\n\
         int z = TWO;\n",
    );
    let rec = top_level(&lines, "TWO");
    assert!(rec.does_body_reference_macro_defined_after_macro);
}

#[test]
fn conditional_inspection_is_reported() {
    let lines = analyze(
        "#define LIMIT 10\n\
         #ifdef LIMIT\n\
         int a = LIMIT;\n\
         #endif\n",
    );
    assert!(lines
        .iter()
        .any(|l| matches!(l, ReportLine::InspectedByCpp { name } if name == "LIMIT")));
    let rec = top_level(&lines, "LIMIT");
    assert!(rec.is_name_present_in_cpp_conditional);
}

#[test]
fn same_name_as_declaration_is_detected() {
    let lines = analyze(
        "#define count 4\n\
         void f(void) { int count2 = count; }\n\
         int count3;\n",
    );
    let rec = top_level(&lines, "count");
    assert!(!rec.has_same_name_as_other_declaration);

    // The declaration must precede the #define, otherwise the preprocessor
    // would rewrite its name.
    let lines = analyze(
        "float other;\n\
         #define other 4\n\
         int other2 = other;\n",
    );
    let rec = top_level(&lines, "other");
    assert!(rec.has_same_name_as_other_declaration);
}

#[test]
fn includes_and_globality() {
    let lines = analyze_with_headers(
        "#include \"defs.h\"\n\
         int value = MAGIC;\n",
        &[("defs.h", "#define MAGIC 42\n")],
    );
    assert!(lines
        .iter()
        .any(|l| matches!(l, ReportLine::Include { valid: true, name } if name == "/virtual/defs.h")));
    let rec = top_level(&lines, "MAGIC");
    assert_eq!(rec.definition_location, "/virtual/defs.h:1:9");
    assert_eq!(rec.invocation_location, "/virtual/main.c:2:13");
    assert!(rec.is_expansion_ice);
}

#[test]
fn include_inside_a_declaration_is_not_global() {
    let lines = analyze_with_headers(
        "int arr[\n\
         #include \"size.h\"\n\
         ];\n",
        &[("size.h", "3\n")],
    );
    assert!(lines
        .iter()
        .any(|l| matches!(l, ReportLine::Include { valid: false, .. })));
}

#[test]
fn definition_lines_cover_builtins_and_user_macros() {
    let lines = analyze("#define FOO 1\nint x = FOO;\n");
    let defs: Vec<(&str, bool, &str)> = lines
        .iter()
        .filter_map(|l| match l {
            ReportLine::Definition { name, valid, loc_or_error } => {
                Some((name.as_str(), *valid, loc_or_error.as_str()))
            }
            _ => None,
        })
        .collect();
    assert!(defs.contains(&("FOO", true, "/virtual/main.c:1:9")));
    // Builtin macros live in a pseudo-file without a file entry.
    assert!(defs.contains(&("__LINE__", false, "File without FileEntry")));
    assert!(defs.contains(&("__FILE__", false, "File without FileEntry")));
}

#[test]
fn universal_invariants_hold_for_every_record() {
    let lines = analyze(
        "#define ADD(a,b) ((a)+(b))\n\
         #define STR(x) #x\n\
         #define ZERO 0\n\
         const char *s = STR(zzz);\n\
         int x = ADD(1, ZERO);\n\
         int a[ZERO];\n",
    );
    for line in &lines {
        let ReportLine::TopLevel(rec) = line else { continue };
        assert_eq!(rec.invocation_depth, 0);
        assert!(!rec.is_invoked_in_macro_argument);
        if rec.num_ast_roots != 1 {
            assert_eq!(rec.ast_kind, "");
            assert!(!rec.does_body_contain_decl_ref_expr);
            assert!(!rec.does_body_reference_decl_declared_after_macro);
            assert!(!rec.is_invoked_where_modifiable_value_required);
            assert!(!rec.is_invoked_where_addressable_value_required);
            assert!(!rec.is_invoked_where_ice_required);
        }
        if !rec.has_aligned_arguments {
            assert!(!rec.does_any_argument_have_side_effects);
            assert!(!rec.does_any_argument_contain_decl_ref_expr);
            assert!(!rec.is_any_argument_conditionally_evaluated);
        }
        if rec.is_object_like {
            assert_eq!(rec.num_arguments, 0);
        }
    }
}

#[test]
fn argument_with_side_effects_is_detected() {
    let lines = analyze(
        "#define TWICE(x) ((x) + (x))\n\
         void f(void) { int n = 0; int m = TWICE(n++); }\n",
    );
    let rec = top_level(&lines, "TWICE");
    assert!(rec.has_aligned_arguments);
    assert!(rec.does_any_argument_have_side_effects);
}

#[test]
fn repeated_substitution_needs_all_copies_aligned() {
    let lines = analyze(
        "#define TWICE(x) ((x) + (x))\n\
         int r = TWICE(5);\n",
    );
    let rec = top_level(&lines, "TWICE");
    // Two substitutions, two aligned literal nodes.
    assert!(rec.has_aligned_arguments);
    assert_eq!(rec.type_signature, "int(int)");
}

#[test]
fn analysis_is_deterministic() {
    let src = "#define ADD(a,b) ((a)+(b))\n\
               #define ZERO 0\n\
               #ifdef ZERO\n\
               int x = ADD(ZERO, 2);\n\
               #endif\n\
               int a[ADD(1, 2)];\n";
    let first = analyze_source("main.c", Some("/virtual/main.c"), src, &VirtualLoader::new(), &[])
        .unwrap()
        .render();
    let second = analyze_source("main.c", Some("/virtual/main.c"), src, &VirtualLoader::new(), &[])
        .unwrap()
        .render();
    assert_eq!(first, second);
}
